use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolPulseError {
    #[error("cannot locate home directory")]
    NoHomeDir,

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid hook payload: {0}")]
    InvalidPayload(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("summarizer error: {0}")]
    Summarizer(String),
}

impl ToolPulseError {
    /// Build a closure that tags an `io::Error` with the path it concerns.
    pub fn io(path: &Path) -> impl FnOnce(std::io::Error) -> ToolPulseError + '_ {
        move |source| ToolPulseError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ToolPulseError>;
