//! Filesystem and workspace errors.

#![allow(missing_docs)]

use thiserror::Error;

/// Broad classification of a failed filesystem or workspace operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrorKind {
    /// Resolved path escapes the active base directory.
    AccessDenied,
    /// Source path does not exist.
    NotFound,
    /// Create target is already present.
    AlreadyExists,
    /// Request is malformed (missing field, directory where a file is expected).
    InvalidInput,
    /// Workspace target is missing or not a directory.
    NotADirectory,
    /// AI backend failed or is not configured.
    Upstream,
    /// Any other I/O failure.
    Internal,
}

impl FsErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccessDenied => "access_denied",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::InvalidInput => "invalid_input",
            Self::NotADirectory => "not_a_directory",
            Self::Upstream => "upstream",
            Self::Internal => "internal",
        }
    }
}

/// Error returned by every operation in this crate.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct FsError {
    kind: FsErrorKind,
    message: String,
}

impl FsError {
    pub fn new(kind: FsErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn access_denied() -> Self {
        Self::new(FsErrorKind::AccessDenied, "Access denied")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FsErrorKind::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(FsErrorKind::AlreadyExists, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(FsErrorKind::InvalidInput, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FsErrorKind::Internal, message)
    }

    #[must_use]
    pub fn kind(&self) -> FsErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status the web layer answers with for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self.kind {
            FsErrorKind::AccessDenied => 403,
            FsErrorKind::NotFound | FsErrorKind::AlreadyExists | FsErrorKind::InvalidInput => 400,
            FsErrorKind::NotADirectory | FsErrorKind::Upstream | FsErrorKind::Internal => 500,
        }
    }
}
