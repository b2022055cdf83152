// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Low-level driver failures
//!
//! These never leave a workflow component as-is; each component converts
//! them into the nearest [`crate::Error`] variant.

use thiserror::Error;

/// Result type alias for driver operations
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Error reported by a [`super::PageDriver`] implementation
#[derive(Error, Debug)]
pub enum DriverError {
    /// Could not launch or connect to a browser
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A bounded wait elapsed
    #[error("Timed out after {timeout_ms}ms waiting for {target}")]
    Timeout { target: String, timeout_ms: u64 },

    /// Selector matched nothing
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Navigation did not complete
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Page, context or connection already closed
    #[error("Target closed")]
    Closed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl DriverError {
    /// Create a timeout error
    pub fn timeout(target: impl Into<String>, timeout_ms: u64) -> Self {
        DriverError::Timeout {
            target: target.into(),
            timeout_ms,
        }
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout { .. })
    }
}
