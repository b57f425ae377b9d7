use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::error::{ReleaseError, ReleaseResult};

pub const DEFAULT_CONFIG_FILE: &str = ".chartship.toml";

/// Logical configuration fields and the environment variables that may carry them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Owner,
    Repo,
    Branch,
    CommitSha,
    Token,
    CommitMessage,
    ArtifactName,
    ArtifactVersion,
}

impl Field {
    pub fn key(self) -> &'static str {
        match self {
            Field::Owner => "owner",
            Field::Repo => "repo",
            Field::Branch => "branch",
            Field::CommitSha => "commit_sha",
            Field::Token => "token",
            Field::CommitMessage => "commit_message",
            Field::ArtifactName => "artifact_name",
            Field::ArtifactVersion => "artifact_version",
        }
    }

    /// Candidate variable names, highest priority first.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            Field::Owner => &["GITHUB_REPOSITORY_OWNER"],
            Field::Repo => &["GITHUB_REPOSITORY"],
            Field::Branch => &["GITHUB_REF_NAME"],
            Field::CommitSha => &["GITHUB_SHA"],
            Field::Token => &["GITHUB_TOKEN", "GH_TOKEN"],
            Field::CommitMessage => &["COMMIT_MESSAGE"],
            Field::ArtifactName => &["CHART_NAME", "ARTIFACT_NAME"],
            Field::ArtifactVersion => &["CHART_VERSION", "ARTIFACT_VERSION"],
        }
    }

    fn candidate_list(self) -> String {
        self.candidates().join(" and/or ")
    }
}

/// Release settings resolved once per process from the environment.
#[derive(Clone, Default)]
pub struct ReleaseConfig {
    pub repository_owner: Option<String>,
    pub repository_name: String,
    pub branch: Option<String>,
    pub commit_sha: String,
    pub auth_token: String,
    pub commit_message: Option<String>,
    pub artifact_name: String,
    pub artifact_version: String,
}

impl ReleaseConfig {
    pub fn from_env() -> Self {
        Self::resolve(|name| std::env::var(name).ok())
    }

    /// Resolve every field through `lookup`. Never fails: fields without a
    /// value are logged and left empty, and [`ReleaseConfig::require`]
    /// rejects them when they are actually needed.
    pub fn resolve<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |field: Field| lookup_field(field, &lookup);

        let raw_repo = value(Field::Repo).unwrap_or_default();
        let repository_owner = value(Field::Owner).or_else(|| owner_prefix(&raw_repo));
        let artifact_version = value(Field::ArtifactVersion).unwrap_or_default();
        if !artifact_version.is_empty() && semver::Version::parse(&artifact_version).is_err() {
            tracing::warn!(
                "artifact version {} is not a valid semantic version",
                artifact_version
            );
        }

        let config = ReleaseConfig {
            repository_owner,
            repository_name: parse_repository(&raw_repo).to_string(),
            branch: value(Field::Branch),
            commit_sha: value(Field::CommitSha).unwrap_or_default(),
            auth_token: value(Field::Token).unwrap_or_default(),
            commit_message: value(Field::CommitMessage),
            artifact_name: value(Field::ArtifactName).unwrap_or_default(),
            artifact_version,
        };
        tracing::debug!("config: resolved {:?}", config);
        config
    }

    /// Return the value of `field`, or `ConfigMissing` when it is empty.
    pub fn require(&self, field: Field) -> ReleaseResult<&str> {
        let value: &str = match field {
            Field::Owner => self.repository_owner.as_deref().unwrap_or_default(),
            Field::Repo => &self.repository_name,
            Field::Branch => self.branch.as_deref().unwrap_or_default(),
            Field::CommitSha => &self.commit_sha,
            Field::Token => &self.auth_token,
            Field::CommitMessage => self.commit_message.as_deref().unwrap_or_default(),
            Field::ArtifactName => &self.artifact_name,
            Field::ArtifactVersion => &self.artifact_version,
        };
        if value.is_empty() {
            return Err(ReleaseError::ConfigMissing {
                field: field.key(),
                candidates: field.candidate_list(),
            });
        }
        Ok(value)
    }
}

impl fmt::Debug for ReleaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.auth_token.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("ReleaseConfig")
            .field("repository_owner", &self.repository_owner)
            .field("repository_name", &self.repository_name)
            .field("branch", &self.branch)
            .field("commit_sha", &self.commit_sha)
            .field("auth_token", &token)
            .field("commit_message", &self.commit_message)
            .field("artifact_name", &self.artifact_name)
            .field("artifact_version", &self.artifact_version)
            .finish()
    }
}

fn lookup_field<F>(field: Field, lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for &name in field.candidates() {
        if let Some(value) = lookup(name).filter(|v| !v.is_empty()) {
            return Some(value);
        }
    }
    tracing::warn!("missing {} variable/s", field.candidate_list());
    None
}

/// Strip an `owner/` prefix, splitting on the first slash only.
pub fn parse_repository(raw: &str) -> &str {
    match raw.split_once('/') {
        Some((_, name)) => name,
        None => raw,
    }
}

fn owner_prefix(raw: &str) -> Option<String> {
    raw.split_once('/')
        .map(|(owner, _)| owner)
        .filter(|owner| !owner.is_empty())
        .map(str::to_string)
}

/// Tunables read from `.chartship.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub retries: usize,
    pub retry_backoff_ms: u64,
    pub output_key: String,
    pub descriptor: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        FileConfig {
            retries: 3,
            retry_backoff_ms: 200,
            output_key: String::from("charts"),
            descriptor: String::from("Chart.yaml"),
        }
    }
}

/// Load the file config. An explicit path must exist; the default file is optional.
pub async fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            path.to_path_buf()
        }
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE).to_path_buf();
            if !path.exists() {
                return Ok(FileConfig::default());
            }
            path
        }
    };
    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cfg: FileConfig =
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn resolve(pairs: &[(&str, &str)]) -> ReleaseConfig {
        let vars = env(pairs);
        ReleaseConfig::resolve(|name| vars.get(name).cloned())
    }

    #[test]
    fn parse_repository_splits_on_first_slash() {
        assert_eq!(parse_repository("owner/repo"), "repo");
        assert_eq!(parse_repository("repo"), "repo");
        assert_eq!(parse_repository(""), "");
        assert_eq!(parse_repository("a/b/c"), "b/c");
    }

    #[test]
    fn resolve_reads_github_variables() {
        let cfg = resolve(&[
            ("GITHUB_REPOSITORY_OWNER", "acme"),
            ("GITHUB_REPOSITORY", "acme/charts"),
            ("GITHUB_REF_NAME", "main"),
            ("GITHUB_SHA", "deadbeef"),
            ("GITHUB_TOKEN", "t0ken"),
            ("COMMIT_MESSAGE", "release notes"),
            ("CHART_NAME", "mychart"),
            ("CHART_VERSION", "1.2.0"),
        ]);
        assert_eq!(cfg.repository_owner.as_deref(), Some("acme"));
        assert_eq!(cfg.repository_name, "charts");
        assert_eq!(cfg.branch.as_deref(), Some("main"));
        assert_eq!(cfg.commit_sha, "deadbeef");
        assert_eq!(cfg.auth_token, "t0ken");
        assert_eq!(cfg.commit_message.as_deref(), Some("release notes"));
        assert_eq!(cfg.artifact_name, "mychart");
        assert_eq!(cfg.artifact_version, "1.2.0");
    }

    #[test]
    fn earlier_candidates_win_and_empty_values_are_skipped() {
        let cfg = resolve(&[
            ("GITHUB_TOKEN", ""),
            ("GH_TOKEN", "fallback"),
            ("CHART_NAME", "chart"),
            ("ARTIFACT_NAME", "artifact"),
        ]);
        assert_eq!(cfg.auth_token, "fallback");
        assert_eq!(cfg.artifact_name, "chart");
    }

    #[test]
    fn owner_falls_back_to_repository_prefix() {
        let cfg = resolve(&[("GITHUB_REPOSITORY", "acme/charts")]);
        assert_eq!(cfg.repository_owner.as_deref(), Some("acme"));

        let cfg = resolve(&[("GITHUB_REPOSITORY", "charts")]);
        assert_eq!(cfg.repository_owner, None);
    }

    #[test]
    fn missing_fields_resolve_empty_without_failing() {
        let cfg = resolve(&[]);
        assert!(cfg.auth_token.is_empty());
        assert!(cfg.commit_message.is_none());

        let err = cfg.require(Field::Token).unwrap_err();
        match err {
            ReleaseError::ConfigMissing { field, candidates } => {
                assert_eq!(field, "token");
                assert_eq!(candidates, "GITHUB_TOKEN and/or GH_TOKEN");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn require_returns_present_values() {
        let cfg = resolve(&[("GITHUB_SHA", "abc123")]);
        assert_eq!(cfg.require(Field::CommitSha).unwrap(), "abc123");
    }

    #[test]
    fn debug_output_redacts_token() {
        let cfg = resolve(&[("GITHUB_TOKEN", "supersecret")]);
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("supersecret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[tokio::test]
    async fn file_config_overrides_defaults() -> Result<()> {
        let td = tempfile::tempdir()?;
        let path = td.path().join("chartship.toml");
        std::fs::write(&path, "retries = 5\noutput_key = \"changed\"\n")?;
        let cfg = load_file_config(Some(&path)).await?;
        assert_eq!(cfg.retries, 5);
        assert_eq!(cfg.output_key, "changed");
        assert_eq!(cfg.retry_backoff_ms, 200);
        assert_eq!(cfg.descriptor, "Chart.yaml");
        Ok(())
    }

    #[tokio::test]
    async fn explicit_missing_file_config_is_an_error() {
        let td = tempfile::tempdir().unwrap();
        let err = load_file_config(Some(&td.path().join("nope.toml")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn malformed_file_config_names_the_file() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("bad.toml");
        std::fs::write(&path, "retries = \"many\"\n").unwrap();
        let err = load_file_config(Some(&path)).await.unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }
}
