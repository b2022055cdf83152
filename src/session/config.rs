// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Session configuration

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use super::AuthState;
use crate::driver::LaunchOptions;
use crate::site::SiteProfile;
use crate::workflow::PollConfig;

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Working directory; artifacts land in `<workspace>/downloads`
    pub workspace: PathBuf,
    /// Launch the local browser without a window
    pub headless: bool,
    /// Connect to this remote browser instead of launching one
    pub remote_endpoint: Option<String>,
    /// Authentication state restored on `init()`
    pub auth_state: Option<AuthState>,
    /// Site URLs and selectors
    pub site: SiteProfile,
    /// Bound of the "already logged in?" check
    pub login_check_timeout: Duration,
    /// Bound for the QR code image to appear
    pub qr_code_timeout: Duration,
    /// How long to wait for a QR scan by default
    pub login_timeout: Duration,
    /// Polling parameters
    pub poll: PollConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("workspace"),
            headless: false,
            remote_endpoint: None,
            auth_state: None,
            site: SiteProfile::default(),
            login_check_timeout: Duration::from_secs(5),
            qr_code_timeout: Duration::from_secs(10),
            login_timeout: Duration::from_secs(300),
            poll: PollConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Create a config rooted at `workspace`
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            ..Default::default()
        }
    }

    /// Read `PODSMITH_WORKSPACE`, `PODSMITH_REMOTE_ENDPOINT` and `PODSMITH_HEADLESS`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(workspace) = env::var("PODSMITH_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }
        if let Ok(endpoint) = env::var("PODSMITH_REMOTE_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                config.remote_endpoint = Some(endpoint);
            }
        }
        if let Ok(headless) = env::var("PODSMITH_HEADLESS") {
            config.headless = parse_flag(&headless);
        }

        config
    }

    /// Set headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Connect to a remote browser
    pub fn remote_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.remote_endpoint = Some(endpoint.into());
        self
    }

    /// Restore this authentication state on `init()`
    pub fn auth_state(mut self, auth_state: AuthState) -> Self {
        self.auth_state = Some(auth_state);
        self
    }

    /// Set the site profile
    pub fn site(mut self, site: SiteProfile) -> Self {
        self.site = site;
        self
    }

    /// Set the default QR login timeout
    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Set the logged-in check bound
    pub fn login_check_timeout(mut self, timeout: Duration) -> Self {
        self.login_check_timeout = timeout;
        self
    }

    /// Set polling parameters
    pub fn poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Driver launch options derived from this config
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            remote_endpoint: self.remote_endpoint.clone(),
            headless: self.headless,
        }
    }

    /// Directory holding stored artifacts
    pub fn downloads_dir(&self) -> PathBuf {
        self.workspace.join("downloads")
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
