// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Page driver abstraction
//!
//! The orchestration core never talks to a browser directly. It consumes the
//! capability surface below: connect or launch, open a context restoring an
//! [`AuthState`], navigate, wait, click, read, upload and capture downloads.
//! Any browser-automation backend can sit behind these traits.
//!
//! [`MockDriver`] is an in-memory simulated site implementing the whole
//! surface, used for offline runs and tests.

mod error;
pub mod mock;
mod types;

use std::path::Path;

use async_trait::async_trait;

use crate::session::AuthState;

pub use error::{DriverError, DriverResult};
pub use mock::{DownloadMode, MockDriver, MockSite};
pub use types::{ByteStream, ClickOptions, Download, LaunchOptions, UrlPattern, WaitOptions};

/// Entry point of a browser-automation backend
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Launch a local browser, or connect to `options.remote_endpoint`
    async fn connect_or_launch(&self, options: &LaunchOptions)
        -> DriverResult<Box<dyn DriverConnection>>;
}

/// A live browser connection
#[async_trait]
pub trait DriverConnection: Send + Sync {
    /// Open an isolated context, restoring `auth_state` when given
    async fn new_context(
        &self,
        auth_state: Option<&AuthState>,
    ) -> DriverResult<Box<dyn DriverContext>>;

    /// Close the connection (and a launched browser with it)
    async fn close(&self) -> DriverResult<()>;
}

/// A browser context holding one identity's cookies and storage
#[async_trait]
pub trait DriverContext: Send + Sync {
    /// Open a page in this context
    async fn new_page(&self) -> DriverResult<Box<dyn DriverPage>>;

    /// Export the context's current authentication state
    async fn export_auth_state(&self) -> DriverResult<AuthState>;
}

/// A single page
///
/// All waiting methods are bounded: they either resolve or fail with
/// [`DriverError::Timeout`].
#[async_trait]
pub trait DriverPage: Send + Sync {
    /// Navigate to `url` and wait for the load to settle
    async fn navigate(&self, url: &str) -> DriverResult<()>;

    /// Reload the current location and wait for the network to go idle
    async fn reload(&self) -> DriverResult<()>;

    /// Wait until the page URL matches `pattern`
    async fn wait_for_url(&self, pattern: &UrlPattern) -> DriverResult<()>;

    /// Current page URL
    async fn current_url(&self) -> DriverResult<String>;

    /// Wait for an element; fails on timeout
    async fn wait_for_element(&self, selector: &str, options: WaitOptions) -> DriverResult<()>;

    /// Click an element
    async fn click(&self, selector: &str, options: ClickOptions) -> DriverResult<()>;

    /// Read an attribute, `None` when the attribute is absent
    async fn read_attribute(&self, selector: &str, name: &str) -> DriverResult<Option<String>>;

    /// Read an element's rendered text
    async fn read_text(&self, selector: &str, timeout: std::time::Duration)
        -> DriverResult<String>;

    /// Click `trigger_selector` and answer the resulting file chooser with `file`
    async fn present_file(&self, trigger_selector: &str, file: &Path) -> DriverResult<()>;

    /// Click `trigger_selector` and wait for the download it starts
    async fn await_download(&self, trigger_selector: &str) -> DriverResult<Download>;

    /// Close the page
    async fn close(&self) -> DriverResult<()>;
}
