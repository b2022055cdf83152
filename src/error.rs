// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for podsmith
//!
//! Every orchestration failure is one variant of the closed [`Error`] enum.
//! Each variant carries a stable machine-readable code, a human message and
//! an optional structured detail map, so callers can match exhaustively or
//! treat any [`Error`] as "some orchestration failure".

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::driver::DriverError;

/// Result type alias for podsmith operations
pub type Result<T> = std::result::Result<T, Error>;

/// Structured diagnostic payload attached to an error
pub type Details = Map<String, Value>;

/// Main error type for podsmith
#[derive(Error, Debug)]
pub enum Error {
    /// No driver handle, context or page could be produced, or the session
    /// was used before `init()`
    #[error("Initialization error: {message}")]
    Initialization { message: String, details: Details },

    /// Login could not be driven (QR code unavailable, session lost)
    #[error("Login error: {message}")]
    Login { message: String, details: Details },

    /// Local document does not exist
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf, details: Details },

    /// The site did not acknowledge the upload with a usable task id
    #[error("Task creation error: {message}")]
    TaskCreation { message: String, details: Details },

    /// Artifact bytes could not be acquired or stored
    #[error("Download error: {message}")]
    Download { message: String, details: Details },

    /// A bounded wait elapsed
    #[error("Timeout after {timeout_ms}ms: {message}")]
    Timeout {
        message: String,
        timeout_ms: u64,
        details: Details,
    },
}

/// Discriminant of [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Initialization,
    Login,
    FileNotFound,
    TaskCreation,
    Download,
    Timeout,
}

impl ErrorKind {
    /// Stable machine-readable code
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Initialization => "INITIALIZATION_ERROR",
            ErrorKind::Login => "LOGIN_ERROR",
            ErrorKind::FileNotFound => "FILE_NOT_FOUND",
            ErrorKind::TaskCreation => "TASK_CREATION_ERROR",
            ErrorKind::Download => "DOWNLOAD_ERROR",
            ErrorKind::Timeout => "TIMEOUT_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Serializable view of an error for logs and CLI output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub details: Details,
}

impl Error {
    /// Create an initialization error
    pub fn initialization(message: impl Into<String>) -> Self {
        Error::Initialization {
            message: message.into(),
            details: Details::new(),
        }
    }

    /// Create a login error
    pub fn login(message: impl Into<String>) -> Self {
        Error::Login {
            message: message.into(),
            details: Details::new(),
        }
    }

    /// Create a file-not-found error for `path`
    pub fn file_not_found(path: impl AsRef<Path>) -> Self {
        Error::FileNotFound {
            path: path.as_ref().to_path_buf(),
            details: Details::new(),
        }
    }

    /// Create a task creation error
    pub fn task_creation(message: impl Into<String>) -> Self {
        Error::TaskCreation {
            message: message.into(),
            details: Details::new(),
        }
    }

    /// Create a download error
    pub fn download(message: impl Into<String>) -> Self {
        Error::Download {
            message: message.into(),
            details: Details::new(),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>, timeout_ms: u64) -> Self {
        Error::Timeout {
            message: message.into(),
            timeout_ms,
            details: Details::new(),
        }
    }

    /// Attach a detail entry
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details_mut().insert(key.into(), value.into());
        self
    }

    /// Attach the underlying driver failure as the `cause` detail
    pub fn with_cause(self, cause: &DriverError) -> Self {
        self.with_detail("cause", cause.to_string())
    }

    fn details_mut(&mut self) -> &mut Details {
        match self {
            Error::Initialization { details, .. }
            | Error::Login { details, .. }
            | Error::FileNotFound { details, .. }
            | Error::TaskCreation { details, .. }
            | Error::Download { details, .. }
            | Error::Timeout { details, .. } => details,
        }
    }

    /// Get the error discriminant
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Initialization { .. } => ErrorKind::Initialization,
            Error::Login { .. } => ErrorKind::Login,
            Error::FileNotFound { .. } => ErrorKind::FileNotFound,
            Error::TaskCreation { .. } => ErrorKind::TaskCreation,
            Error::Download { .. } => ErrorKind::Download,
            Error::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Human readable message without the kind prefix
    pub fn message(&self) -> String {
        match self {
            Error::Initialization { message, .. }
            | Error::Login { message, .. }
            | Error::TaskCreation { message, .. }
            | Error::Download { message, .. }
            | Error::Timeout { message, .. } => message.clone(),
            Error::FileNotFound { path, .. } => format!("file does not exist: {}", path.display()),
        }
    }

    /// Structured details, including the fields every variant always carries
    /// (`timeout_ms` for timeouts, `path` for missing files)
    pub fn details(&self) -> Details {
        match self {
            Error::Timeout {
                timeout_ms,
                details,
                ..
            } => {
                let mut out = details.clone();
                out.insert("timeout_ms".to_string(), Value::from(*timeout_ms));
                out
            }
            Error::FileNotFound { path, details } => {
                let mut out = details.clone();
                out.insert(
                    "path".to_string(),
                    Value::from(path.to_string_lossy().into_owned()),
                );
                out
            }
            Error::Initialization { details, .. }
            | Error::Login { details, .. }
            | Error::TaskCreation { details, .. }
            | Error::Download { details, .. } => details.clone(),
        }
    }

    /// Look up a single detail value
    pub fn detail(&self, key: &str) -> Option<Value> {
        self.details().remove(key)
    }

    /// Timeout in milliseconds, for timeout errors
    pub fn timeout_ms(&self) -> Option<u64> {
        match self {
            Error::Timeout { timeout_ms, .. } => Some(*timeout_ms),
            _ => None,
        }
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Check if retrying the whole higher-level operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::Download { .. })
    }

    /// Check if the condition needs outside action (a file, a login) first
    pub fn requires_intervention(&self) -> bool {
        matches!(self, Error::FileNotFound { .. } | Error::Login { .. })
    }

    /// Build a serializable report
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            code: self.code().to_string(),
            message: self.message(),
            details: self.details(),
        }
    }
}
