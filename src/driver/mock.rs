// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Simulated site for offline runs and tests
//!
//! [`MockSite`] models the application behind a [`SiteProfile`]: a
//! logged-in marker driven by issued session tokens, the QR login dialog,
//! task creation on send, a download control that becomes enabled after a
//! configurable number of task page loads, and downloads delivered as a
//! temporary file or a byte stream. Clones share state, so a test can keep
//! a handle and inspect [`MockStats`] after the workflow ran.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::{
    ByteStream, ClickOptions, Download, DriverConnection, DriverContext, DriverError, DriverPage,
    DriverResult, LaunchOptions, PageDriver, UrlPattern, WaitOptions,
};
use crate::session::AuthState;
use crate::site::SiteProfile;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

const SESSION_COOKIE: &str = "sessionid";
const NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// How the simulated site hands out downloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMode {
    /// Write a temporary file, like a local browser
    TempFile,
    /// Stream the body, like a remote browser
    Stream,
    /// Stream that breaks after the first chunk
    BrokenStream,
    /// Neither a file nor a stream
    Unavailable,
}

/// What the simulated site observed
#[derive(Debug, Clone, Default)]
pub struct MockStats {
    pub connections: u32,
    pub connections_closed: u32,
    pub last_launch: Option<LaunchOptions>,
    pub navigations: u32,
    pub reloads: u32,
    /// Navigations and reloads that landed on a task page
    pub task_page_loads: u32,
    /// Selectors clicked, in order
    pub clicks: Vec<String>,
    pub qr_codes_shown: u32,
    pub uploads: Vec<PathBuf>,
    pub tasks_created: u32,
    pub downloads: u32,
    pub auth_exports: u32,
    pub pages_closed: u32,
}

struct SiteState {
    profile: SiteProfile,
    logged_in_by_default: bool,
    qr_scan_completes: bool,
    valid_tokens: HashSet<String>,
    tokens_issued: u64,
    task_location: String,
    ready_after: u32,
    title: Option<String>,
    qr_src: Option<String>,
    download_bytes: Vec<u8>,
    download_filename: String,
    download_mode: DownloadMode,
    fail_connect: bool,
    stats: MockStats,
}

impl SiteState {
    fn issue_token(&mut self) -> String {
        self.tokens_issued += 1;
        let token = format!("mock-session-{}", self.tokens_issued);
        self.valid_tokens.insert(token.clone());
        token
    }

    fn is_valid(&self, token: &Option<String>) -> bool {
        token
            .as_ref()
            .map(|t| self.valid_tokens.contains(t))
            .unwrap_or(false)
    }

    fn on_task_page(&self, url: &str) -> bool {
        self.profile.task_url_pattern.is_match(url)
    }

    fn download_ready(&self) -> bool {
        self.stats.task_page_loads >= self.ready_after
    }
}

/// Shared handle on a simulated site
#[derive(Clone)]
pub struct MockSite {
    state: Arc<Mutex<SiteState>>,
}

impl Default for MockSite {
    fn default() -> Self {
        Self::new(SiteProfile::default())
    }
}

impl MockSite {
    /// Simulate the site described by `profile`
    pub fn new(profile: SiteProfile) -> Self {
        let qr_payload =
            base64::engine::general_purpose::STANDARD.encode(b"\x89PNG\r\n\x1a\nmock-qr-code");
        let task_location = profile
            .task_url("4242")
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}4242", profile.base_url));
        let qr_src = format!("{}{}", profile.qr_data_prefix, qr_payload);

        Self {
            state: Arc::new(Mutex::new(SiteState {
                profile,
                logged_in_by_default: false,
                qr_scan_completes: true,
                valid_tokens: HashSet::new(),
                tokens_issued: 0,
                task_location,
                ready_after: 1,
                title: Some("Mock Episode".to_string()),
                qr_src: Some(qr_src),
                download_bytes: b"mock podcast audio".to_vec(),
                download_filename: "Mock Episode.mp3".to_string(),
                download_mode: DownloadMode::TempFile,
                fail_connect: false,
                stats: MockStats::default(),
            })),
        }
    }

    /// New contexts start logged in
    pub fn logged_in(self, logged_in: bool) -> Self {
        self.state.lock().logged_in_by_default = logged_in;
        self
    }

    /// Whether showing the QR code leads to a login
    pub fn qr_scan_completes(self, completes: bool) -> Self {
        self.state.lock().qr_scan_completes = completes;
        self
    }

    /// Task id assigned on send
    pub fn task_id(self, task_id: &str) -> Self {
        {
            let mut state = self.state.lock();
            let location = state
                .profile
                .task_url(task_id)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| format!("{}{}", state.profile.base_url, task_id));
            state.task_location = location;
        }
        self
    }

    /// Exact location opened on send
    pub fn task_location(self, location: &str) -> Self {
        self.state.lock().task_location = location.to_string();
        self
    }

    /// Task page loads needed before the download control is enabled
    pub fn ready_after(self, loads: u32) -> Self {
        self.state.lock().ready_after = loads;
        self
    }

    /// Title shown on the result card; `None` makes it unreadable
    pub fn title(self, title: Option<&str>) -> Self {
        self.state.lock().title = title.map(str::to_string);
        self
    }

    /// `src` of the QR image; `None` removes the attribute
    pub fn qr_src(self, src: Option<&str>) -> Self {
        self.state.lock().qr_src = src.map(str::to_string);
        self
    }

    /// Content and suggested filename of the download
    pub fn download(self, bytes: Vec<u8>, filename: &str) -> Self {
        {
            let mut state = self.state.lock();
            state.download_bytes = bytes;
            state.download_filename = filename.to_string();
        }
        self
    }

    /// How the download is delivered
    pub fn download_mode(self, mode: DownloadMode) -> Self {
        self.state.lock().download_mode = mode;
        self
    }

    /// Refuse connections
    pub fn fail_connect(self, fail: bool) -> Self {
        self.state.lock().fail_connect = fail;
        self
    }

    /// Invalidate every issued session, as if the site logged everyone out
    pub fn revoke_sessions(&self) {
        let mut state = self.state.lock();
        state.valid_tokens.clear();
        state.logged_in_by_default = false;
    }

    /// QR payload without the data-URI prefix
    pub fn qr_payload(&self) -> String {
        let state = self.state.lock();
        state
            .qr_src
            .as_deref()
            .map(|src| state.profile.qr_payload(src).to_string())
            .unwrap_or_default()
    }

    /// Snapshot of what the site observed so far
    pub fn stats(&self) -> MockStats {
        self.state.lock().stats.clone()
    }

    /// Driver connected to this site
    pub fn driver(&self) -> Arc<dyn PageDriver> {
        Arc::new(MockDriver::new(self.clone()))
    }
}

/// [`PageDriver`] backed by a [`MockSite`]
#[derive(Clone)]
pub struct MockDriver {
    site: MockSite,
}

impl MockDriver {
    pub fn new(site: MockSite) -> Self {
        Self { site }
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn connect_or_launch(
        &self,
        options: &LaunchOptions,
    ) -> DriverResult<Box<dyn DriverConnection>> {
        let mut state = self.site.state.lock();
        if state.fail_connect {
            return Err(DriverError::Connection(
                options
                    .remote_endpoint
                    .clone()
                    .unwrap_or_else(|| "local browser".to_string()),
            ));
        }
        state.stats.connections += 1;
        state.stats.last_launch = Some(options.clone());

        Ok(Box::new(MockConnection {
            site: self.site.clone(),
        }))
    }
}

struct MockConnection {
    site: MockSite,
}

#[async_trait]
impl DriverConnection for MockConnection {
    async fn new_context(
        &self,
        auth_state: Option<&AuthState>,
    ) -> DriverResult<Box<dyn DriverContext>> {
        let mut state = self.site.state.lock();
        let restored = auth_state.and_then(session_token);

        let token = match restored {
            Some(token) if state.valid_tokens.contains(&token) => Some(token),
            _ if state.logged_in_by_default => Some(state.issue_token()),
            _ => None,
        };

        Ok(Box::new(MockContext {
            site: self.site.clone(),
            token: Arc::new(Mutex::new(token)),
        }))
    }

    async fn close(&self) -> DriverResult<()> {
        self.site.state.lock().stats.connections_closed += 1;
        Ok(())
    }
}

struct MockContext {
    site: MockSite,
    token: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl DriverContext for MockContext {
    async fn new_page(&self) -> DriverResult<Box<dyn DriverPage>> {
        Ok(Box::new(MockPage {
            site: self.site.clone(),
            token: self.token.clone(),
            state: Mutex::new(PageState {
                url: "about:blank".to_string(),
                login_dialog: false,
                qr_visible: false,
                pending_upload: None,
            }),
        }))
    }

    async fn export_auth_state(&self) -> DriverResult<AuthState> {
        let mut state = self.site.state.lock();
        state.stats.auth_exports += 1;

        let token = self.token.lock().clone();
        let cookies: Vec<Value> = match token {
            Some(token) if state.valid_tokens.contains(&token) => vec![json!({
                "name": SESSION_COOKIE,
                "value": token,
                "domain": state.profile.base_url.host_str().unwrap_or_default(),
            })],
            _ => Vec::new(),
        };

        Ok(AuthState::new(json!({ "cookies": cookies, "origins": [] })))
    }
}

struct PageState {
    url: String,
    login_dialog: bool,
    qr_visible: bool,
    pending_upload: Option<PathBuf>,
}

struct MockPage {
    site: MockSite,
    token: Arc<Mutex<Option<String>>>,
    state: Mutex<PageState>,
}

impl MockPage {
    fn load(&self, url: String, reload: bool) {
        let mut page = self.state.lock();
        let mut site = self.site.state.lock();
        if reload {
            site.stats.reloads += 1;
        } else {
            site.stats.navigations += 1;
        }
        if site.on_task_page(&url) {
            site.stats.task_page_loads += 1;
        }
        page.url = url;
    }
}

#[async_trait]
impl DriverPage for MockPage {
    async fn navigate(&self, url: &str) -> DriverResult<()> {
        self.load(url.to_string(), false);
        Ok(())
    }

    async fn reload(&self) -> DriverResult<()> {
        let url = self.state.lock().url.clone();
        self.load(url, true);
        Ok(())
    }

    async fn wait_for_url(&self, pattern: &UrlPattern) -> DriverResult<()> {
        let url = self.state.lock().url.clone();
        if pattern.matches(&url) {
            Ok(())
        } else {
            Err(DriverError::timeout(format!("url {}", pattern), NAVIGATION_TIMEOUT_MS))
        }
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.state.lock().url.clone())
    }

    async fn wait_for_element(&self, selector: &str, options: WaitOptions) -> DriverResult<()> {
        let timeout_ms = u64::try_from(options.timeout.as_millis()).unwrap_or(u64::MAX);
        let mut page = self.state.lock();
        let mut site = self.site.state.lock();

        if selector == site.profile.logged_in_marker {
            let mut token = self.token.lock();
            if site.is_valid(&token) {
                return Ok(());
            }
            if page.qr_visible && site.qr_scan_completes {
                *token = Some(site.issue_token());
                page.qr_visible = false;
                page.login_dialog = false;
                return Ok(());
            }
            return Err(DriverError::timeout(selector, timeout_ms));
        }

        if selector == site.profile.qr_image && !page.qr_visible {
            return Err(DriverError::timeout(selector, timeout_ms));
        }

        Ok(())
    }

    async fn click(&self, selector: &str, _options: ClickOptions) -> DriverResult<()> {
        let mut page = self.state.lock();
        let mut site = self.site.state.lock();
        site.stats.clicks.push(selector.to_string());

        if selector == site.profile.login_button {
            page.login_dialog = true;
        } else if selector == site.profile.qr_switcher {
            if !page.login_dialog {
                return Err(DriverError::ElementNotFound(selector.to_string()));
            }
            page.qr_visible = true;
            site.stats.qr_codes_shown += 1;
        } else if selector == site.profile.new_conversation_button {
            page.url = site.profile.base_url.to_string();
        } else if selector == site.profile.send_button && page.pending_upload.take().is_some() {
            page.url = site.task_location.clone();
            site.stats.tasks_created += 1;
        }

        Ok(())
    }

    async fn read_attribute(&self, selector: &str, name: &str) -> DriverResult<Option<String>> {
        let page = self.state.lock();
        let site = self.site.state.lock();

        if selector == site.profile.qr_image && name == "src" {
            if !page.qr_visible {
                return Err(DriverError::ElementNotFound(selector.to_string()));
            }
            return Ok(site.qr_src.clone());
        }

        if selector == site.profile.download_button && name == "class" {
            if !site.on_task_page(&page.url) {
                return Err(DriverError::ElementNotFound(selector.to_string()));
            }
            let class = if site.download_ready() {
                "actionBtn-3f9a"
            } else {
                "actionBtn-3f9a disabled-7c2e"
            };
            return Ok(Some(class.to_string()));
        }

        Ok(None)
    }

    async fn read_text(&self, selector: &str, timeout: Duration) -> DriverResult<String> {
        let page = self.state.lock();
        let site = self.site.state.lock();

        if selector == site.profile.result_title && site.on_task_page(&page.url) {
            if let Some(title) = &site.title {
                return Ok(title.clone());
            }
        }

        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        Err(DriverError::timeout(selector, timeout_ms))
    }

    async fn present_file(&self, _trigger_selector: &str, file: &Path) -> DriverResult<()> {
        let mut page = self.state.lock();
        self.site.state.lock().stats.uploads.push(file.to_path_buf());
        page.pending_upload = Some(file.to_path_buf());
        Ok(())
    }

    async fn await_download(&self, trigger_selector: &str) -> DriverResult<Download> {
        let (mode, bytes, filename) = {
            let page = self.state.lock();
            let mut site = self.site.state.lock();
            if !site.on_task_page(&page.url) || !site.download_ready() {
                return Err(DriverError::timeout(
                    format!("download from {}", trigger_selector),
                    NAVIGATION_TIMEOUT_MS,
                ));
            }
            site.stats.clicks.push(trigger_selector.to_string());
            site.stats.downloads += 1;
            (
                site.download_mode,
                site.download_bytes.clone(),
                site.download_filename.clone(),
            )
        };

        match mode {
            DownloadMode::TempFile => {
                let path = std::env::temp_dir().join(format!(
                    "podsmith-mock-{}-{}.part",
                    std::process::id(),
                    TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
                ));
                tokio::fs::write(&path, &bytes).await?;
                Ok(Download::from_temp_file(path, filename))
            }
            DownloadMode::Stream => {
                let chunks: Vec<std::io::Result<Bytes>> = bytes
                    .chunks(4)
                    .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
                    .collect();
                let stream: ByteStream = Box::pin(futures::stream::iter(chunks));
                Ok(Download::from_stream(stream, filename))
            }
            DownloadMode::BrokenStream => {
                let head = bytes.iter().take(4).copied().collect::<Vec<u8>>();
                let chunks: Vec<std::io::Result<Bytes>> = vec![
                    Ok(Bytes::from(head)),
                    Err(std::io::Error::new(
                        std::io::ErrorKind::ConnectionAborted,
                        "browser disconnected during download",
                    )),
                ];
                let stream: ByteStream = Box::pin(futures::stream::iter(chunks));
                Ok(Download::from_stream(stream, filename))
            }
            DownloadMode::Unavailable => Ok(Download {
                temp_path: None,
                byte_stream: None,
                suggested_filename: filename,
            }),
        }
    }

    async fn close(&self) -> DriverResult<()> {
        self.site.state.lock().stats.pages_closed += 1;
        Ok(())
    }
}

fn session_token(auth_state: &AuthState) -> Option<String> {
    auth_state
        .as_value()
        .get("cookies")?
        .as_array()?
        .iter()
        .find(|cookie| cookie.get("name").and_then(Value::as_str) == Some(SESSION_COOKIE))?
        .get("value")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tokens_survive_across_connections() {
        let site = MockSite::default().logged_in(true);
        let driver = site.driver();

        let conn = driver.connect_or_launch(&LaunchOptions::default()).await.unwrap();
        let ctx = conn.new_context(None).await.unwrap();
        let exported = ctx.export_auth_state().await.unwrap();
        assert_eq!(session_token(&exported).as_deref(), Some("mock-session-1"));

        let site = site.logged_in(false);
        let ctx = conn.new_context(Some(&exported)).await.unwrap();
        let page = ctx.new_page().await.unwrap();
        let marker = SiteProfile::default().logged_in_marker;
        page.wait_for_element(&marker, WaitOptions::visible(Duration::from_secs(5)))
            .await
            .unwrap();

        site.revoke_sessions();
        let err = page
            .wait_for_element(&marker, WaitOptions::visible(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_download_readiness_follows_task_page_loads() {
        let site = MockSite::default().ready_after(2);
        let profile = SiteProfile::default();
        let driver = site.driver();
        let conn = driver.connect_or_launch(&LaunchOptions::default()).await.unwrap();
        let page = conn.new_context(None).await.unwrap().new_page().await.unwrap();

        page.navigate("https://www.doubao.com/chat/4242").await.unwrap();
        let class = page.read_attribute(&profile.download_button, "class").await.unwrap();
        assert!(!profile.is_download_enabled(class.as_deref()));
        assert!(page.await_download(&profile.download_button).await.is_err());

        page.reload().await.unwrap();
        let class = page.read_attribute(&profile.download_button, "class").await.unwrap();
        assert!(profile.is_download_enabled(class.as_deref()));

        let download = page.await_download(&profile.download_button).await.unwrap();
        let temp = download.temp_path.unwrap();
        assert_eq!(tokio::fs::read(&temp).await.unwrap(), b"mock podcast audio");
        tokio::fs::remove_file(temp).await.unwrap();
    }
}
