use std::future::Future;
use std::time::Duration;

use octocrab::Octocrab;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use urlencoding::encode as url_encode;

use crate::config::{Field, ReleaseConfig};
use crate::error::{ReleaseError, ReleaseResult};
use crate::hosting::{HostingClient, Lookup, Release, Tag};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or the
/// policy runs out of attempts. Backoff grows linearly with the attempt.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> ReleaseResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ReleaseResult<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Err(err) if err.is_transient() && attempt < attempts => {
                tracing::warn!(
                    "github: {} failed: {} (attempt {}/{})",
                    what,
                    err,
                    attempt,
                    attempts
                );
                sleep(policy.backoff * attempt as u32).await;
            }
            result => return result,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Serialize)]
struct CreateTagPayload<'a> {
    tag: &'a str,
    message: &'a str,
    object: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Debug, Deserialize)]
struct TagObject {
    sha: String,
}

#[derive(Debug, Serialize)]
struct CreateRefPayload<'a> {
    #[serde(rename = "ref")]
    reference: &'a str,
    sha: &'a str,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
}

/// [`HostingClient`] over the GitHub REST API for one repository.
pub struct GitHubClient {
    gh: Octocrab,
    owner: String,
    repo: String,
    retry: RetryPolicy,
}

impl GitHubClient {
    /// Build an authenticated client and confirm the token can see the repository.
    pub async fn connect(config: &ReleaseConfig, retry: RetryPolicy) -> ReleaseResult<Self> {
        let token = config
            .require(Field::Token)
            .map_err(|err| ReleaseError::AuthFailure(err.to_string()))?;
        let owner = config.require(Field::Owner)?.to_string();
        let repo = config.require(Field::Repo)?.to_string();

        let gh = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .map_err(|err| {
                ReleaseError::AuthFailure(format!("failed to build GitHub client: {}", err))
            })?;
        let client = GitHubClient {
            gh,
            owner,
            repo,
            retry,
        };
        client.verify_repository().await?;
        tracing::debug!(
            "github: connected to {}/{}",
            client.owner,
            client.repo
        );
        Ok(client)
    }

    async fn verify_repository(&self) -> ReleaseResult<()> {
        let (gh, owner, repo) = (&self.gh, self.owner.as_str(), self.repo.as_str());
        let what = format!("repository {}/{}", owner, repo);
        let what = what.as_str();
        with_retry(self.retry, "repository lookup", || async move {
            gh.repos(owner, repo)
                .get()
                .await
                .map(|_| ())
                .map_err(|err| classify(err, what))
        })
        .await
    }

    fn route(&self, tail: &str) -> String {
        format!("repos/{}/{}/{}", self.owner, self.repo, tail)
    }
}

impl HostingClient for GitHubClient {
    async fn get_tag(&self, name: &str) -> ReleaseResult<Lookup<Tag>> {
        let gh = &self.gh;
        let route = self.route(&format!("git/ref/tags/{}", url_encode(name)));
        let route = route.as_str();
        let what = format!("tag {}", name);
        let what = what.as_str();
        with_retry(self.retry, "tag lookup", || async move {
            let result: Result<GitRef, _> = gh.get(route, None::<&()>).await;
            into_lookup(result, what)
        })
        .await
        .map(|lookup| match lookup {
            Lookup::Found(git_ref) => Lookup::Found(Tag {
                name: name.to_string(),
                sha: git_ref.object.sha,
            }),
            Lookup::NotFound => Lookup::NotFound,
        })
    }

    async fn create_tag(&self, name: &str, message: &str, commit_sha: &str) -> ReleaseResult<Tag> {
        let gh = &self.gh;
        let what = format!("tag {}", name);
        let what = what.as_str();

        let tags_route = self.route("git/tags");
        let tags_route = tags_route.as_str();
        let payload = CreateTagPayload {
            tag: name,
            message,
            object: commit_sha,
            kind: "commit",
        };
        let payload = &payload;
        let object = with_retry(self.retry, "tag object creation", || async move {
            let result: Result<TagObject, _> = gh.post(tags_route, Some(payload)).await;
            result.map_err(|err| classify(err, what))
        })
        .await?;
        tracing::debug!("github: tag object {} created for {}", object.sha, name);

        let refs_route = self.route("git/refs");
        let refs_route = refs_route.as_str();
        let reference = format!("refs/tags/{}", name);
        let payload = CreateRefPayload {
            reference: &reference,
            sha: &object.sha,
        };
        let payload = &payload;
        let git_ref = with_retry(self.retry, "tag ref creation", || async move {
            let result: Result<GitRef, _> = gh.post(refs_route, Some(payload)).await;
            result.map_err(|err| classify(err, what))
        })
        .await?;

        Ok(Tag {
            name: name.to_string(),
            sha: git_ref.object.sha,
        })
    }

    async fn get_release(&self, tag: &str) -> ReleaseResult<Lookup<Release>> {
        let (gh, owner, repo) = (&self.gh, self.owner.as_str(), self.repo.as_str());
        let what = format!("release {}", tag);
        let what = what.as_str();
        with_retry(self.retry, "release lookup", || async move {
            let result = gh.repos(owner, repo).releases().get_by_tag(tag).await;
            into_lookup(result, what)
        })
        .await
        .map(|lookup| match lookup {
            Lookup::Found(release) => Lookup::Found(to_release(release)),
            Lookup::NotFound => Lookup::NotFound,
        })
    }

    async fn create_release(
        &self,
        tag: &str,
        title: &str,
        body: &str,
        draft: bool,
        prerelease: bool,
    ) -> ReleaseResult<Release> {
        let (gh, owner, repo) = (&self.gh, self.owner.as_str(), self.repo.as_str());
        let what = format!("release {}", tag);
        let what = what.as_str();
        let release = with_retry(self.retry, "release creation", || async move {
            gh.repos(owner, repo)
                .releases()
                .create(tag)
                .name(title)
                .body(body)
                .draft(draft)
                .prerelease(prerelease)
                .send()
                .await
                .map_err(|err| classify(err, what))
        })
        .await?;
        Ok(to_release(release))
    }

    async fn commit_message(&self, sha: &str) -> ReleaseResult<String> {
        let gh = &self.gh;
        let route = self.route(&format!("commits/{}", url_encode(sha)));
        let route = route.as_str();
        let what = format!("commit {}", sha);
        let what = what.as_str();
        let lookup = with_retry(self.retry, "commit lookup", || async move {
            let result: Result<CommitResponse, _> = gh.get(route, None::<&()>).await;
            match result {
                Err(err) if status_of(&err) == Some(StatusCode::UNPROCESSABLE_ENTITY) => {
                    Ok(Lookup::NotFound)
                }
                other => into_lookup(other, what),
            }
        })
        .await?;
        match lookup {
            Lookup::Found(commit) => Ok(commit.commit.message),
            Lookup::NotFound => Err(ReleaseError::CommitNotFound {
                sha: sha.to_string(),
            }),
        }
    }
}

fn to_release(release: octocrab::models::repos::Release) -> Release {
    Release {
        tag_name: release.tag_name,
        name: release.name,
        html_url: Some(release.html_url.to_string()),
    }
}

fn into_lookup<T>(result: Result<T, octocrab::Error>, what: &str) -> ReleaseResult<Lookup<T>> {
    match result {
        Ok(value) => Ok(Lookup::Found(value)),
        Err(err) if is_not_found(&err) => Ok(Lookup::NotFound),
        Err(err) => Err(classify(err, what)),
    }
}

fn status_of(err: &octocrab::Error) -> Option<StatusCode> {
    if let octocrab::Error::GitHub { source, .. } = err {
        return Some(source.status_code);
    }
    None
}

fn is_not_found(err: &octocrab::Error) -> bool {
    status_of(err) == Some(StatusCode::NOT_FOUND)
}

/// Map an octocrab failure on `what` to the workflow's error kinds.
fn classify(err: octocrab::Error, what: &str) -> ReleaseError {
    let octocrab::Error::GitHub { source, .. } = &err else {
        if is_transport_failure(&err) {
            return ReleaseError::Network(format!("{}: {}", what, err));
        }
        return ReleaseError::Client(format!("{}: {}", what, err));
    };
    let status = source.status_code;
    let details = format!("{} {:?}", source.message, source.errors);
    classify_status(status, &details, what)
}

/// Connection-level failures; decode and request-building errors are definitive.
fn is_transport_failure(err: &octocrab::Error) -> bool {
    matches!(
        err,
        octocrab::Error::Hyper { .. } | octocrab::Error::Service { .. } | octocrab::Error::Http { .. }
    )
}

fn classify_status(status: StatusCode, details: &str, what: &str) -> ReleaseError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ReleaseError::AuthFailure(format!("{} ({}): {}", what, status, details))
        }
        StatusCode::UNPROCESSABLE_ENTITY if mentions_already_exists(details) => {
            ReleaseError::AlreadyExists(what.to_string())
        }
        StatusCode::TOO_MANY_REQUESTS => {
            ReleaseError::Network(format!("{} rate limited: {}", what, details))
        }
        s if s.is_server_error() => ReleaseError::Network(format!("{} ({}): {}", what, s, details)),
        s => ReleaseError::Api {
            status: s.as_u16(),
            message: format!("{}: {}", what, details),
        },
    }
}

fn mentions_already_exists(details: &str) -> bool {
    let lower = details.to_ascii_lowercase();
    lower.contains("already exists") || lower.contains("already_exists")
}
