// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Value types exchanged with a page driver

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use regex::Regex;

/// Streamed download body
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// How to obtain a browser
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Connect to an already running browser at this endpoint instead of launching one
    pub remote_endpoint: Option<String>,
    /// Launch without a visible window
    pub headless: bool,
}

impl LaunchOptions {
    /// Whether this connects to a pre-existing remote browser
    pub fn is_remote(&self) -> bool {
        self.remote_endpoint.is_some()
    }
}

/// Options for waiting on an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Require the element to be visible, not merely attached
    pub visible: bool,
    /// Upper bound for the wait
    pub timeout: Duration,
}

impl WaitOptions {
    /// Wait for a visible element
    pub fn visible(timeout: Duration) -> Self {
        Self {
            visible: true,
            timeout,
        }
    }
}

/// Options for a click
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClickOptions {
    /// Click at this offset from the element's top-left corner
    pub position: Option<(f64, f64)>,
}

impl ClickOptions {
    /// Click at an offset inside the element
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            position: Some((x, y)),
        }
    }
}

/// URL matcher used by `wait_for_url`
#[derive(Debug, Clone)]
pub enum UrlPattern {
    /// The whole URL must be equal
    Exact(String),
    /// The URL must contain a match
    Regex(Regex),
}

impl UrlPattern {
    /// Check a URL against this pattern
    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlPattern::Exact(expected) => expected == url,
            UrlPattern::Regex(re) => re.is_match(url),
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPattern::Exact(url) => f.write_str(url),
            UrlPattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// A file download captured by the driver
///
/// Local browsers usually leave the file in a temporary location, remote
/// browsers can only stream it back. Either source may be absent.
pub struct Download {
    /// Temporary file written by the browser
    pub temp_path: Option<PathBuf>,
    /// Body streamed from the browser
    pub byte_stream: Option<ByteStream>,
    /// Filename proposed by the site
    pub suggested_filename: String,
}

impl Download {
    /// Download available as a temporary file
    pub fn from_temp_file(path: impl Into<PathBuf>, suggested_filename: impl Into<String>) -> Self {
        Self {
            temp_path: Some(path.into()),
            byte_stream: None,
            suggested_filename: suggested_filename.into(),
        }
    }

    /// Download available as a byte stream
    pub fn from_stream(stream: ByteStream, suggested_filename: impl Into<String>) -> Self {
        Self {
            temp_path: None,
            byte_stream: Some(stream),
            suggested_filename: suggested_filename.into(),
        }
    }
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("temp_path", &self.temp_path)
            .field("byte_stream", &self.byte_stream.as_ref().map(|_| "<stream>"))
            .field("suggested_filename", &self.suggested_filename)
            .finish()
    }
}
