use thiserror::Error;

pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Failures of the publish workflow and the hosting platform behind it.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// A required field resolved empty and is now needed.
    #[error("missing {field}: set {candidates}")]
    ConfigMissing {
        field: &'static str,
        candidates: String,
    },

    /// The platform rejected (or never received) credentials.
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// The commit named by the config could not be looked up.
    #[error("commit {sha} not found")]
    CommitNotFound { sha: String },

    /// Transport-level or server-side failure worth retrying.
    #[error("network error: {0}")]
    Network(String),

    /// A create call raced with another run that created the same object.
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Request could not be built or the response could not be decoded.
    #[error("GitHub client error: {0}")]
    Client(String),
}

impl ReleaseError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ReleaseError::Network(_))
    }
}
