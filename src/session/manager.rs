// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Session manager
//!
//! Owns one driver connection, one context and one page, plus the
//! authentication state. It is the only writer of that state; workflow stages
//! ask it to refresh after every driver interaction. Public workflow methods
//! take `&mut self`, so stages never overlap on the page.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use super::{AuthState, SessionConfig};
use crate::driver::{
    DriverConnection, DriverContext, DriverError, DriverPage, DriverResult, PageDriver,
};
use crate::error::{Error, Result};
use crate::site::SiteProfile;
use crate::store::{Artifact, ArtifactStore};
use crate::workflow::{
    AuthenticationFlow, LoginOutcome, PollConfig, PollingEngine, QrCodeHandler, Sleeper, Task,
    TaskSubmission, TokioSleeper,
};

/// Read-only view of a session's authentication state
///
/// Clones share the same state; useful for persisting the latest state
/// from another task while a long poll runs.
#[derive(Debug, Clone)]
pub struct AuthStateHandle {
    inner: Arc<RwLock<Option<AuthState>>>,
}

impl AuthStateHandle {
    /// Latest exported state
    pub fn get(&self) -> Option<AuthState> {
        self.inner.read().clone()
    }
}

struct ActiveSession {
    connection: Box<dyn DriverConnection>,
    context: Box<dyn DriverContext>,
    page: Box<dyn DriverPage>,
}

/// Orchestrates `init → login → submit → poll/download → destroy`
pub struct SessionManager {
    driver: Arc<dyn PageDriver>,
    config: SessionConfig,
    store: ArtifactStore,
    auth_state: Arc<RwLock<Option<AuthState>>>,
    sleeper: Arc<dyn Sleeper>,
    active: Option<ActiveSession>,
}

impl SessionManager {
    /// Create a manager; nothing is launched until [`SessionManager::init`]
    pub fn new(driver: Arc<dyn PageDriver>, config: SessionConfig) -> Self {
        let store = ArtifactStore::for_workspace(&config.workspace);
        let auth_state = Arc::new(RwLock::new(config.auth_state.clone()));

        Self {
            driver,
            config,
            store,
            auth_state,
            sleeper: Arc::new(TokioSleeper),
            active: None,
        }
    }

    /// Replace the sleeper used between poll attempts and retries
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Site profile
    pub fn site(&self) -> &SiteProfile {
        &self.config.site
    }

    /// Artifact store of this session's workspace
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub(crate) fn sleeper(&self) -> Arc<dyn Sleeper> {
        self.sleeper.clone()
    }

    /// Whether `init()` has completed and `destroy()` has not run since
    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    /// Latest authentication state: the exported one after `init()`, the
    /// configured one before, `None` if neither exists
    pub fn auth_state(&self) -> Option<AuthState> {
        self.auth_state.read().clone()
    }

    /// Shareable read handle on the authentication state
    pub fn auth_state_handle(&self) -> AuthStateHandle {
        AuthStateHandle {
            inner: self.auth_state.clone(),
        }
    }

    /// The page, or an initialization error before `init()`
    pub fn page(&self) -> Result<&dyn DriverPage> {
        self.active
            .as_ref()
            .map(|active| active.page.as_ref())
            .ok_or_else(|| Error::initialization("session is not initialized, call init() first"))
    }

    /// Export the context's state and store it as the current one
    pub(crate) async fn refresh_auth_state(&self) -> DriverResult<AuthState> {
        let active = self.active.as_ref().ok_or(DriverError::Closed)?;
        let state = active.context.export_auth_state().await?;
        *self.auth_state.write() = Some(state.clone());
        Ok(state)
    }

    /// Connect or launch, restore the authentication state and open the entry page
    pub async fn init(&mut self) -> Result<()> {
        if self.active.is_some() {
            tracing::debug!("session already initialized");
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.config.workspace)
            .await
            .map_err(|e| {
                Error::initialization("could not create workspace")
                    .with_detail("workspace", self.config.workspace.to_string_lossy().into_owned())
                    .with_detail("cause", e.to_string())
            })?;

        let options = self.config.launch_options();
        match &options.remote_endpoint {
            Some(endpoint) => tracing::info!(endpoint = %endpoint, "connecting to remote browser"),
            None => tracing::info!(headless = options.headless, "launching local browser"),
        }

        let connection = self
            .driver
            .connect_or_launch(&options)
            .await
            .map_err(|e| Error::initialization("no browser connection could be established").with_cause(&e))?;

        match self.open(connection.as_ref()).await {
            Ok((context, page)) => {
                self.active = Some(ActiveSession {
                    connection,
                    context,
                    page,
                });
                tracing::info!(url = %self.config.site.base_url, "session initialized");
                Ok(())
            }
            Err(e) => {
                if let Err(close_err) = connection.close().await {
                    tracing::warn!(error = %close_err, "could not close connection after failed init");
                }
                Err(e)
            }
        }
    }

    async fn open(
        &self,
        connection: &dyn DriverConnection,
    ) -> Result<(Box<dyn DriverContext>, Box<dyn DriverPage>)> {
        let restored = self.auth_state();
        if restored.is_some() {
            tracing::debug!("restoring saved authentication state");
        }

        let context = connection
            .new_context(restored.as_ref())
            .await
            .map_err(|e| Error::initialization("could not create browser context").with_cause(&e))?;
        let page = context
            .new_page()
            .await
            .map_err(|e| Error::initialization("could not open page").with_cause(&e))?;

        let entry = self.config.site.base_url_str();
        let ready = async {
            page.navigate(entry).await?;
            context.export_auth_state().await
        };
        let exported = ready.await;
        match exported {
            Ok(state) => {
                *self.auth_state.write() = Some(state);
                Ok((context, page))
            }
            Err(e) => {
                if let Err(close_err) = page.close().await {
                    tracing::warn!(error = %close_err, "could not close page after failed init");
                }
                Err(Error::initialization("could not open the application entry page")
                    .with_detail("url", entry)
                    .with_cause(&e))
            }
        }
    }

    /// Log in with the configured timeout
    pub async fn login(&mut self, handler: &dyn QrCodeHandler) -> Result<LoginOutcome> {
        let timeout = self.config.login_timeout;
        self.login_with_timeout(handler, timeout).await
    }

    /// Log in, waiting up to `timeout` for a QR scan
    pub async fn login_with_timeout(
        &mut self,
        handler: &dyn QrCodeHandler,
        timeout: Duration,
    ) -> Result<LoginOutcome> {
        AuthenticationFlow::new(self).run(handler, timeout).await
    }

    /// Upload a document and create a task
    pub async fn submit(&mut self, document: impl AsRef<Path>) -> Result<Task> {
        TaskSubmission::new(self).submit(document.as_ref()).await
    }

    /// Poll a task with the configured parameters
    pub async fn poll_until_ready(&mut self, task_id: &str) -> Result<Artifact> {
        PollingEngine::new(self).poll_until_ready(task_id).await
    }

    /// Poll a task with explicit parameters
    pub async fn poll_with(&mut self, task_id: &str, config: PollConfig) -> Result<Artifact> {
        PollingEngine::new(self)
            .with_config(config)
            .poll_until_ready(task_id)
            .await
    }

    /// Submit a document and poll until its artifact is stored
    pub async fn generate(&mut self, document: impl AsRef<Path>) -> Result<Artifact> {
        let task = self.submit(document).await?;
        self.poll_until_ready(task.id()).await
    }

    /// Run [`SessionManager::generate`] up to `attempts` times, retrying
    /// only retryable failures after `delay`
    pub async fn generate_with_retry(
        &mut self,
        document: impl AsRef<Path>,
        attempts: u32,
        delay: Duration,
    ) -> Result<Artifact> {
        let document = document.as_ref();
        let attempts = attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.generate(document).await {
                Ok(artifact) => return Ok(artifact),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    tracing::warn!(attempt, attempts, code = e.code(), error = %e, "generation failed, retrying");
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Close the page and the connection; safe to call repeatedly or before `init()`
    pub async fn destroy(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        if let Err(e) = active.page.close().await {
            tracing::warn!(error = %e, "could not close page");
        }
        drop(active.context);
        tracing::info!("closing browser connection");
        if let Err(e) = active.connection.close().await {
            tracing::warn!(error = %e, "could not close browser connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::driver::{DownloadMode, MockSite};
    use crate::error::ErrorKind;
    use crate::workflow::{qr_handler, LoginMethod, QrCode};

    #[derive(Default)]
    struct CountingSleeper {
        sleeps: AtomicU32,
    }

    #[async_trait]
    impl Sleeper for CountingSleeper {
        async fn sleep(&self, _duration: Duration) {
            self.sleeps.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_handler(calls: Arc<AtomicU32>) -> impl QrCodeHandler {
        qr_handler(move |_qr: QrCode| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    fn fast_config(dir: &tempfile::TempDir) -> SessionConfig {
        SessionConfig::new(dir.path()).poll(PollConfig::new(3, Duration::ZERO))
    }

    #[tokio::test]
    async fn test_init_and_destroy() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default();
        let mut session = SessionManager::new(site.driver(), fast_config(&dir));

        assert!(session.auth_state().is_none());
        assert_ok!(session.init().await);
        assert!(session.is_initialized());
        assert!(session.auth_state().is_some());

        session.destroy().await;
        session.destroy().await;
        assert!(!session.is_initialized());

        let stats = site.stats();
        assert_eq!(stats.connections, 1);
        assert_eq!(stats.pages_closed, 1);
        assert_eq!(stats.connections_closed, 1);
    }

    #[tokio::test]
    async fn test_destroy_before_init() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default();
        let mut session = SessionManager::new(site.driver(), fast_config(&dir));

        session.destroy().await;
        assert_eq!(site.stats().connections_closed, 0);
    }

    #[tokio::test]
    async fn test_init_failure_is_initialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default().fail_connect(true);
        let mut session = SessionManager::new(site.driver(), fast_config(&dir));

        let err = assert_err!(session.init().await);
        assert_eq!(err.kind(), ErrorKind::Initialization);
        assert!(!session.is_initialized());
    }

    #[tokio::test]
    async fn test_remote_endpoint_is_passed_to_driver() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default();
        let config = fast_config(&dir).remote_endpoint("ws://10.0.0.5:3000");
        let mut session = SessionManager::new(site.driver(), config);

        session.init().await.unwrap();

        let launch = site.stats().last_launch.unwrap();
        assert_eq!(launch.remote_endpoint.as_deref(), Some("ws://10.0.0.5:3000"));
    }

    #[tokio::test]
    async fn test_restored_auth_state_skips_qr_login() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default().logged_in(false).qr_scan_completes(true);
        let calls = Arc::new(AtomicU32::new(0));

        let mut first = SessionManager::new(site.driver(), fast_config(&dir));
        first.init().await.unwrap();
        let outcome = first.login(&counting_handler(calls.clone())).await.unwrap();
        assert_eq!(outcome.method, LoginMethod::QrCode);
        let exported = first.auth_state().unwrap();
        first.destroy().await;

        let mut second =
            SessionManager::new(site.driver(), fast_config(&dir).auth_state(exported.clone()));
        assert_eq!(second.auth_state(), Some(exported));
        second.init().await.unwrap();
        let outcome = second.login(&counting_handler(calls.clone())).await.unwrap();

        assert_eq!(outcome.method, LoginMethod::AlreadyLoggedIn);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(site.stats().qr_codes_shown, 1);
    }

    #[tokio::test]
    async fn test_generate_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("paper.pdf");
        tokio::fs::write(&document, b"%PDF-1.7").await.unwrap();
        let site = MockSite::default()
            .logged_in(true)
            .ready_after(2)
            .download_mode(DownloadMode::Stream)
            .download(b"audio".to_vec(), "episode.mp3");
        let mut session = SessionManager::new(site.driver(), fast_config(&dir));
        let handle = session.auth_state_handle();

        session.init().await.unwrap();
        let artifact = session.generate(&document).await.unwrap();
        session.destroy().await;

        assert_eq!(artifact.content_hash, crate::store::hash_bytes(b"audio"));
        assert_eq!(tokio::fs::read(&artifact.stored_path).await.unwrap(), b"audio");
        assert_eq!(handle.get(), session.auth_state());
    }

    #[tokio::test]
    async fn test_generate_with_retry_retries_timeouts_only() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("paper.pdf");
        tokio::fs::write(&document, b"%PDF-1.7").await.unwrap();
        let site = MockSite::default().logged_in(true).ready_after(u32::MAX);
        let sleeper = Arc::new(CountingSleeper::default());
        let mut session =
            SessionManager::new(site.driver(), fast_config(&dir)).with_sleeper(sleeper.clone());
        session.init().await.unwrap();

        let err = session
            .generate_with_retry(&document, 2, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(site.stats().uploads.len(), 2);
        // 2 sleeps inside each poll, 1 between the two generations
        assert_eq!(sleeper.sleeps.load(Ordering::SeqCst), 5);

        let err = session
            .generate_with_retry(dir.path().join("missing.pdf"), 3, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert_eq!(sleeper.sleeps.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_independent_sessions() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let site_a = MockSite::default().logged_in(true);
        let site_b = MockSite::default().logged_in(false);
        let mut a = SessionManager::new(site_a.driver(), fast_config(&dir_a));
        let mut b = SessionManager::new(site_b.driver(), fast_config(&dir_b));

        let (ra, rb) = tokio::join!(a.init(), b.init());
        ra.unwrap();
        rb.unwrap();

        assert_ne!(a.auth_state(), b.auth_state());
        assert_ne!(a.store().root(), b.store().root());
    }
}
