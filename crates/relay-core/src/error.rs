//! Error types for relay.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// A non-success, non-miss response. Displays as the response body text.
    #[error("{body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Invalid artifact duration: {0}")]
    InvalidDuration(String),

    // Verification errors
    #[error(
        "artifact verification failed: downloaded artifact is missing required x-artifact-tag header"
    )]
    ArtifactTagMissing,

    #[error("invalid artifact verification tag")]
    InvalidTag,

    #[error("Signing artifact failed: {0}")]
    Signature(String),

    // Archive errors
    #[error("Malformed archive: {0}")]
    ArchiveFormat(String),

    #[error("Unsupported file type {kind} for {path}")]
    UnsupportedFileType { path: String, kind: String },

    #[error("File {path} changed while archiving: header declares {declared} bytes, read {actual}")]
    EntrySizeMismatch {
        path: String,
        declared: u64,
        actual: u64,
    },

    #[error("Invalid tar, link target does not exist on header for {0}")]
    LinkTargetNotOnHeader(String),

    // Path errors
    #[error("Cannot untar file to {0}: path escapes the restore root")]
    PathEscapesRoot(String),

    #[error("Invalid file path: {0}")]
    InvalidPath(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl Error {
    /// Whether this error came from integrity verification of a fetched artifact.
    pub fn is_verification_failure(&self) -> bool {
        matches!(self, Error::ArtifactTagMissing | Error::InvalidTag)
    }
}
