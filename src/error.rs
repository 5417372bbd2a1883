use crate::github::GitHubError;
use crate::providers::RouterError;

/// Failure taxonomy above the router boundary. Anything reaching a binary as
/// one of these aborts the run with a logged error and a non-zero exit; no
/// partial GitHub mutation is left behind.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A payload failed schema validation (missing fields, empty file set).
    /// No GitHub mutation is attempted for these.
    #[error("validation failure: {0}")]
    Validation(String),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    GitHub(#[from] GitHubError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
