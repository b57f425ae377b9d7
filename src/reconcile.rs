use std::fmt;

use crate::config::{Field, ReleaseConfig};
use crate::error::{ReleaseError, ReleaseResult};
use crate::hosting::{HostingClient, Lookup};

/// Name shared by the tag and the release of one artifact version.
pub fn tag_name(config: &ReleaseConfig) -> String {
    format!("{}-{}", config.artifact_name, config.artifact_version)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Created,
    AlreadyPresent,
    /// Dry run: the object is missing but was not created.
    Skipped,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepOutcome::Created => "created",
            StepOutcome::AlreadyPresent => "exists",
            StepOutcome::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub tag_name: String,
    pub tag: StepOutcome,
    pub release: StepOutcome,
}

/// One reconciliation pass of an artifact version against the hosting platform.
pub struct Reconciler<'a, C> {
    config: &'a ReleaseConfig,
    client: &'a C,
    dry_run: bool,
    message: Option<String>,
}

impl<'a, C: HostingClient> Reconciler<'a, C> {
    pub fn new(config: &'a ReleaseConfig, client: &'a C) -> ReleaseResult<Self> {
        config.require(Field::ArtifactName)?;
        config.require(Field::ArtifactVersion)?;
        Ok(Reconciler {
            config,
            client,
            dry_run: false,
            message: None,
        })
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn tag_name(&self) -> String {
        tag_name(self.config)
    }

    /// Explicit commit message if set, otherwise the message of the configured
    /// commit. Fetched at most once per pass.
    pub async fn resolve_commit_message(&mut self) -> ReleaseResult<String> {
        if let Some(message) = &self.message {
            return Ok(message.clone());
        }
        let config = self.config;
        let message = match config.commit_message.as_deref().filter(|m| !m.is_empty()) {
            Some(message) => message.to_string(),
            None => {
                let sha = config.require(Field::CommitSha)?;
                tracing::debug!("reconcile: fetching message of commit {}", sha);
                self.client.commit_message(sha).await?
            }
        };
        self.message = Some(message.clone());
        Ok(message)
    }

    pub async fn tag_exists(&self) -> ReleaseResult<bool> {
        let lookup = self.client.get_tag(&self.tag_name()).await?;
        Ok(lookup.is_found())
    }

    pub async fn release_exists(&self) -> ReleaseResult<bool> {
        match self.client.get_release(&self.tag_name()).await? {
            Lookup::Found(release) => {
                tracing::debug!(
                    "reconcile: found release {:?} for {} ({:?})",
                    release.name,
                    release.tag_name,
                    release.html_url
                );
                Ok(true)
            }
            Lookup::NotFound => Ok(false),
        }
    }

    pub async fn ensure_tag(&mut self) -> ReleaseResult<StepOutcome> {
        let name = self.tag_name();
        if self.tag_exists().await? {
            tracing::info!("tag {} already exists, skipping", name);
            return Ok(StepOutcome::AlreadyPresent);
        }
        let config = self.config;
        let commit_sha = config.require(Field::CommitSha)?;
        let message = self.resolve_commit_message().await?;
        if self.dry_run {
            tracing::info!("dry-run: would create tag {} at {}", name, commit_sha);
            return Ok(StepOutcome::Skipped);
        }

        tracing::info!("creating tag {} at {}", name, commit_sha);
        match self.client.create_tag(&name, &message, commit_sha).await {
            Ok(tag) => {
                tracing::debug!("reconcile: tag {} points at {}", tag.name, tag.sha);
                Ok(StepOutcome::Created)
            }
            Err(ReleaseError::AlreadyExists(what)) => {
                tracing::info!("{} was created concurrently, skipping", what);
                Ok(StepOutcome::AlreadyPresent)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn ensure_release(&mut self) -> ReleaseResult<StepOutcome> {
        let name = self.tag_name();
        if self.release_exists().await? {
            tracing::info!("release {} already exists, skipping", name);
            return Ok(StepOutcome::AlreadyPresent);
        }
        let message = self.resolve_commit_message().await?;
        if self.dry_run {
            tracing::info!("dry-run: would create release {}", name);
            return Ok(StepOutcome::Skipped);
        }

        tracing::info!("creating release {}", name);
        match self
            .client
            .create_release(&name, &name, &message, false, false)
            .await
        {
            Ok(release) => {
                tracing::debug!("reconcile: release created {:?}", release.html_url);
                Ok(StepOutcome::Created)
            }
            Err(ReleaseError::AlreadyExists(what)) => {
                tracing::info!("{} was created concurrently, skipping", what);
                Ok(StepOutcome::AlreadyPresent)
            }
            Err(err) => Err(err),
        }
    }

    /// Tag first, then release.
    pub async fn publish(&mut self) -> ReleaseResult<PublishOutcome> {
        let tag = self.ensure_tag().await?;
        let release = self.ensure_release().await?;
        Ok(PublishOutcome {
            tag_name: self.tag_name(),
            tag,
            release,
        })
    }
}

pub async fn publish<C: HostingClient>(
    config: &ReleaseConfig,
    client: &C,
    dry_run: bool,
) -> ReleaseResult<PublishOutcome> {
    Reconciler::new(config, client)?
        .dry_run(dry_run)
        .publish()
        .await
}
