//! Core error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Home directory could not be resolved.
    #[error("Path error: {0}")]
    Path(String),

    /// The user pressed Ctrl-C while a poll loop was sleeping.
    #[error("Interrupted")]
    Interrupted,

    /// A poll loop ran past its configured deadline.
    #[error("Timed out after {0} seconds")]
    Timeout(u64),
}

pub type CoreResult<T> = Result<T, CoreError>;
