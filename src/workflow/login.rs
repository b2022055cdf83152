// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! QR code login flow
//!
//! ```text
//! Unknown ──marker present──▶ CheckedLoggedIn ──▶ LoggedIn
//!    │
//!    └──marker absent──▶ AwaitingQrCode ──scan──▶ LoggedIn
//!                              │
//!                              └──timeout──▶ LoginTimedOut
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;

use crate::driver::{ClickOptions, DriverPage, WaitOptions};
use crate::error::{Error, Result};
use crate::session::SessionManager;

/// Error type returned by QR code handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Login state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Unknown,
    CheckedLoggedIn,
    AwaitingQrCode,
    LoggedIn,
    LoginTimedOut,
}

/// How the session ended up logged in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMethod {
    /// The restored session was already authenticated
    AlreadyLoggedIn,
    /// A QR code was shown and scanned
    QrCode,
}

/// Successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub method: LoginMethod,
    /// States visited, in order
    pub transitions: Vec<LoginState>,
}

impl LoginOutcome {
    /// Final state, always [`LoginState::LoggedIn`]
    pub fn state(&self) -> LoginState {
        LoginState::LoggedIn
    }
}

/// QR code payload extracted from the login dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrCode {
    /// Base64 image data without the data-URI prefix
    pub payload: String,
}

impl QrCode {
    /// Decode the payload into PNG bytes
    pub fn decode_png(&self) -> std::result::Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(self.payload.trim())
    }
}

/// Receives the QR code so it can be shown to the user
///
/// A failing handler does not abort the login; the flow keeps waiting for
/// the scan.
#[async_trait]
pub trait QrCodeHandler: Send + Sync {
    async fn on_qr_code(&self, qr: &QrCode) -> std::result::Result<(), HandlerError>;
}

/// [`QrCodeHandler`] wrapping an async closure
pub struct FnQrHandler<F>(pub F);

/// Wrap an async closure as a [`QrCodeHandler`]
pub fn qr_handler<F, Fut>(f: F) -> FnQrHandler<F>
where
    F: Fn(QrCode) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<(), HandlerError>> + Send,
{
    FnQrHandler(f)
}

#[async_trait]
impl<F, Fut> QrCodeHandler for FnQrHandler<F>
where
    F: Fn(QrCode) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<(), HandlerError>> + Send,
{
    async fn on_qr_code(&self, qr: &QrCode) -> std::result::Result<(), HandlerError> {
        (self.0)(qr.clone()).await
    }
}

/// Writes the QR code as a PNG file
#[derive(Debug, Clone)]
pub struct SaveQrCodeToFile {
    path: PathBuf,
}

impl SaveQrCodeToFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the written image once it is no longer needed
    pub async fn cleanup(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "could not remove QR code image"),
        }
    }
}

#[async_trait]
impl QrCodeHandler for SaveQrCodeToFile {
    async fn on_qr_code(&self, qr: &QrCode) -> std::result::Result<(), HandlerError> {
        let png = qr.decode_png()?;
        tokio::fs::write(&self.path, png).await?;
        tracing::info!(path = %self.path.display(), "QR code saved, scan it to log in");
        Ok(())
    }
}

/// Drives the login state machine on a session's page
pub struct AuthenticationFlow<'a> {
    session: &'a SessionManager,
}

impl<'a> AuthenticationFlow<'a> {
    pub fn new(session: &'a SessionManager) -> Self {
        Self { session }
    }

    /// Log in, showing a QR code through `handler` when the session is not
    /// already authenticated. Waits up to `timeout` for the scan.
    pub async fn run(&self, handler: &dyn QrCodeHandler, timeout: Duration) -> Result<LoginOutcome> {
        let page = self.session.page()?;
        let site = self.session.site();
        let mut transitions = vec![LoginState::Unknown];

        let check = WaitOptions::visible(self.session.config().login_check_timeout);
        match page.wait_for_element(&site.logged_in_marker, check).await {
            Ok(()) => {
                transitions.push(LoginState::CheckedLoggedIn);
                self.refresh().await?;
                transitions.push(LoginState::LoggedIn);
                tracing::info!("session already logged in");
                return Ok(LoginOutcome {
                    method: LoginMethod::AlreadyLoggedIn,
                    transitions,
                });
            }
            Err(e) => tracing::info!(reason = %e, "not logged in, requesting QR code"),
        }

        transitions.push(LoginState::AwaitingQrCode);
        let qr = self.reveal_qr_code(page).await?;

        if let Err(e) = handler.on_qr_code(&qr).await {
            tracing::warn!(error = %e, "QR code handler failed, still waiting for login");
        }

        tracing::info!(timeout_secs = timeout.as_secs(), "waiting for QR code scan");
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        if let Err(e) = page
            .wait_for_element(&site.logged_in_marker, WaitOptions::visible(timeout))
            .await
        {
            transitions.push(LoginState::LoginTimedOut);
            tracing::warn!(timeout_ms, "login was not confirmed in time");
            let err = if e.is_timeout() {
                Error::timeout("login was not confirmed in time", timeout_ms)
            } else {
                Error::login("login page failed while waiting for the scan")
            };
            return Err(err.with_cause(&e));
        }

        self.refresh().await?;
        transitions.push(LoginState::LoggedIn);
        tracing::info!("logged in via QR code");

        Ok(LoginOutcome {
            method: LoginMethod::QrCode,
            transitions,
        })
    }

    async fn reveal_qr_code(&self, page: &dyn DriverPage) -> Result<QrCode> {
        let site = self.session.site();
        let wrap = |step: &'static str| {
            move |e: crate::driver::DriverError| {
                Error::login("could not extract the login QR code")
                    .with_detail("step", step)
                    .with_cause(&e)
            }
        };

        page.click(&site.login_button, ClickOptions::default())
            .await
            .map_err(wrap("open_login"))?;
        let (x, y) = site.qr_switcher_offset;
        page.click(&site.qr_switcher, ClickOptions::at(x, y))
            .await
            .map_err(wrap("switch_to_qr"))?;
        page.wait_for_element(
            &site.qr_image,
            WaitOptions::visible(self.session.config().qr_code_timeout),
        )
        .await
        .map_err(wrap("wait_qr_image"))?;

        let src = page
            .read_attribute(&site.qr_image, "src")
            .await
            .map_err(wrap("read_qr_src"))?
            .filter(|src| !src.is_empty())
            .ok_or_else(|| {
                Error::login("QR code image has no src attribute").with_detail("step", "read_qr_src")
            })?;

        Ok(QrCode {
            payload: site.qr_payload(&src).to_string(),
        })
    }

    async fn refresh(&self) -> Result<()> {
        self.session
            .refresh_auth_state()
            .await
            .map(|_| ())
            .map_err(|e| Error::login("could not export session state after login").with_cause(&e))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::driver::MockSite;
    use crate::error::ErrorKind;
    use crate::session::SessionConfig;

    fn counting_handler(calls: Arc<AtomicU32>) -> impl QrCodeHandler {
        qr_handler(move |_qr: QrCode| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    async fn initialized(site: &MockSite, dir: &tempfile::TempDir) -> SessionManager {
        let mut session = SessionManager::new(site.driver(), SessionConfig::new(dir.path()));
        session.init().await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_already_logged_in_skips_qr() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default().logged_in(true);
        let session = initialized(&site, &dir).await;
        let calls = Arc::new(AtomicU32::new(0));

        let outcome = AuthenticationFlow::new(&session)
            .run(&counting_handler(calls.clone()), Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(outcome.method, LoginMethod::AlreadyLoggedIn);
        assert_eq!(site.stats().auth_exports, 2);
        assert_eq!(
            outcome.transitions,
            vec![LoginState::Unknown, LoginState::CheckedLoggedIn, LoginState::LoggedIn]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(site.stats().qr_codes_shown, 0);
    }

    #[tokio::test]
    async fn test_qr_login() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default().logged_in(false).qr_scan_completes(true);
        let session = initialized(&site, &dir).await;
        let state_before = session.auth_state();
        let exports_before = site.stats().auth_exports;
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let sink = seen.clone();
        let handler = qr_handler(move |qr: QrCode| {
            let sink = sink.clone();
            async move {
                *sink.lock() = Some(qr.payload);
                Ok(())
            }
        });

        let outcome = AuthenticationFlow::new(&session)
            .run(&handler, Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(outcome.method, LoginMethod::QrCode);
        assert_eq!(outcome.state(), LoginState::LoggedIn);
        let payload = seen.lock().clone().unwrap();
        assert!(!payload.starts_with("data:"));
        assert_eq!(payload, site.qr_payload());
        assert_eq!(site.stats().auth_exports - exports_before, 1);

        let state_after = session.auth_state().unwrap();
        assert_ne!(Some(state_after.clone()), state_before);
        let cookies = state_after.as_value()["cookies"].as_array().unwrap().len();
        assert_eq!(cookies, 1);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default().logged_in(false).qr_scan_completes(true);
        let session = initialized(&site, &dir).await;
        let handler = qr_handler(|_qr: QrCode| async { Err::<(), HandlerError>("display offline".into()) });

        let outcome = AuthenticationFlow::new(&session)
            .run(&handler, Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(outcome.method, LoginMethod::QrCode);
    }

    #[tokio::test]
    async fn test_scan_never_happens_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default().logged_in(false).qr_scan_completes(false);
        let session = initialized(&site, &dir).await;
        let calls = Arc::new(AtomicU32::new(0));

        let err = AuthenticationFlow::new(&session)
            .run(&counting_handler(calls.clone()), Duration::from_secs(60))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.timeout_ms(), Some(60_000));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_qr_src_is_login_error() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default().logged_in(false).qr_src(None);
        let session = initialized(&site, &dir).await;
        let calls = Arc::new(AtomicU32::new(0));

        let err = AuthenticationFlow::new(&session)
            .run(&counting_handler(calls.clone()), Duration::from_secs(60))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Login);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default();
        let session = SessionManager::new(site.driver(), SessionConfig::new(dir.path()));
        let calls = Arc::new(AtomicU32::new(0));

        let err = AuthenticationFlow::new(&session)
            .run(&counting_handler(calls), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Initialization);
    }

    #[tokio::test]
    async fn test_save_qr_code_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let handler = SaveQrCodeToFile::new(dir.path().join("qrcode.png"));
        let qr = QrCode {
            payload: base64::engine::general_purpose::STANDARD.encode(b"\x89PNG"),
        };

        handler.on_qr_code(&qr).await.unwrap();
        assert_eq!(tokio::fs::read(handler.path()).await.unwrap(), b"\x89PNG");

        handler.cleanup().await;
        assert!(!handler.path().exists());
    }
}
