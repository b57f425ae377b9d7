use crate::error::ReleaseResult;

/// Outcome of a lookup where absence is an expected answer, not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    /// Object the tag ref points at.
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub tag_name: String,
    pub name: Option<String>,
    pub html_url: Option<String>,
}

/// What the publish workflow needs from a source hosting platform.
///
/// Calls are awaited one at a time; implementations own any retry policy.
pub trait HostingClient {
    async fn get_tag(&self, name: &str) -> ReleaseResult<Lookup<Tag>>;

    /// Create an annotated tag object for `commit_sha` and the ref pointing at it.
    async fn create_tag(&self, name: &str, message: &str, commit_sha: &str) -> ReleaseResult<Tag>;

    async fn get_release(&self, tag: &str) -> ReleaseResult<Lookup<Release>>;

    async fn create_release(
        &self,
        tag: &str,
        title: &str,
        body: &str,
        draft: bool,
        prerelease: bool,
    ) -> ReleaseResult<Release>;

    /// Message of commit `sha`; `CommitNotFound` when the platform does not know it.
    async fn commit_message(&self, sha: &str) -> ReleaseResult<String>;
}
