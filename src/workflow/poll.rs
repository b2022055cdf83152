// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Bounded polling for a task's artifact
//!
//! Fixed attempt count, fixed interval. Completion time is decided by the
//! remote site, so there is no backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use crate::driver::{DriverPage, WaitOptions};
use crate::error::{Error, Result};
use crate::session::SessionManager;
use crate::store::Artifact;

/// Polling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Number of checks before giving up
    pub max_attempts: u32,
    /// Pause between two checks
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 90,
            interval: Duration::from_secs(10),
        }
    }
}

impl PollConfig {
    /// Create a poll config
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Total polling window, `max_attempts * interval`
    pub fn window_ms(&self) -> u64 {
        let interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX);
        interval_ms.saturating_mul(u64::from(self.max_attempts))
    }
}

/// Timed suspension between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Observation made by one polling attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollAttempt {
    /// Zero-based attempt index
    pub index: u32,
    /// Title read from the result card, or the placeholder
    pub observed_title: String,
    /// Whether the download control was enabled
    pub ready: bool,
    pub observed_at: DateTime<Utc>,
}

/// Polls a task page until its artifact can be downloaded
pub struct PollingEngine<'a> {
    session: &'a SessionManager,
    config: PollConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl<'a> PollingEngine<'a> {
    /// Create an engine using the session's poll config and sleeper
    pub fn new(session: &'a SessionManager) -> Self {
        Self {
            session,
            config: session.config().poll,
            sleeper: session.sleeper(),
        }
    }

    /// Override polling parameters
    pub fn with_config(mut self, config: PollConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the sleeper
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Check the task until the artifact is ready, then download and store it
    pub async fn poll_until_ready(&self, task_id: &str) -> Result<Artifact> {
        let page = self.session.page()?;
        let task_url = self.session.site().checked_task_url(task_id).ok_or_else(|| {
            Error::task_creation("task id does not name a task location")
                .with_detail("task_id", task_id)
        })?;
        let max_attempts = self.config.max_attempts;

        for index in 0..max_attempts {
            let attempt = self.check(page, &task_url, index).await?;
            tracing::info!(
                task_id,
                attempt = index + 1,
                max_attempts,
                title = %attempt.observed_title,
                ready = attempt.ready,
                "checked task"
            );

            if attempt.ready {
                let artifact = self.download(page, &attempt).await;
                self.refresh(task_id).await?;
                return artifact;
            }

            self.refresh(task_id).await?;

            if index + 1 < max_attempts {
                tracing::debug!(task_id, interval = ?self.config.interval, "waiting before next attempt");
                self.sleeper.sleep(self.config.interval).await;
            }
        }

        Err(Error::timeout(
            "artifact did not become available within the polling window",
            self.config.window_ms(),
        )
        .with_detail("task_id", task_id)
        .with_detail("max_attempts", max_attempts)
        .with_detail("interval_seconds", self.config.interval.as_secs()))
    }

    async fn check(&self, page: &dyn DriverPage, task_url: &Url, index: u32) -> Result<PollAttempt> {
        let site = self.session.site();

        let on_task_page = matches!(page.current_url().await, Ok(url) if url == task_url.as_str());
        let loaded = if on_task_page {
            page.reload().await
        } else {
            page.navigate(task_url.as_str()).await
        };
        loaded.map_err(|e| {
            Error::download("could not load the task page")
                .with_detail("url", task_url.as_str())
                .with_detail("attempt", index)
                .with_cause(&e)
        })?;

        let check = WaitOptions::visible(self.session.config().login_check_timeout);
        if let Err(e) = page.wait_for_element(&site.logged_in_marker, check).await {
            return Err(Error::login("session is no longer authenticated")
                .with_detail("url", task_url.as_str())
                .with_detail("attempt", index)
                .with_cause(&e));
        }

        let observed_title = match page.read_text(&site.result_title, check.timeout).await {
            Ok(title) if !title.trim().is_empty() => title.trim().to_string(),
            Ok(_) => site.title_placeholder.clone(),
            Err(e) => {
                tracing::debug!(error = %e, "title not readable yet");
                site.title_placeholder.clone()
            }
        };

        let class = page
            .read_attribute(&site.download_button, "class")
            .await
            .unwrap_or(None);

        Ok(PollAttempt {
            index,
            observed_title,
            ready: site.is_download_enabled(class.as_deref()),
            observed_at: Utc::now(),
        })
    }

    async fn download(&self, page: &dyn DriverPage, attempt: &PollAttempt) -> Result<Artifact> {
        let site = self.session.site();
        let download = page.await_download(&site.download_button).await.map_err(|e| {
            Error::download("download did not complete")
                .with_detail("attempt", attempt.index)
                .with_cause(&e)
        })?;

        self.session
            .store()
            .save_download(download, &attempt.observed_title)
            .await
    }

    async fn refresh(&self, task_id: &str) -> Result<()> {
        self.session.refresh_auth_state().await.map(|_| ()).map_err(|e| {
            Error::download("could not export session state after polling")
                .with_detail("task_id", task_id)
                .with_cause(&e)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::driver::{DownloadMode, MockSite};
    use crate::error::ErrorKind;
    use crate::session::SessionConfig;

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

    async fn session_with(site: &MockSite, dir: &tempfile::TempDir) -> SessionManager {
        let config = SessionConfig::new(dir.path()).poll(PollConfig::new(3, Duration::ZERO));
        let mut session = SessionManager::new(site.driver(), config);
        session.init().await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_ready_on_second_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default()
            .logged_in(true)
            .ready_after(2)
            .download(b"podcast".to_vec(), "Episode.mp3");
        let session = session_with(&site, &dir).await;
        let sleeper = Arc::new(CountingSleeper::default());

        let artifact = PollingEngine::new(&session)
            .with_sleeper(sleeper.clone())
            .poll_until_ready("4242")
            .await
            .unwrap();

        let stats = site.stats();
        assert_eq!(stats.task_page_loads, 2);
        assert_eq!(stats.reloads, 1);
        assert_eq!(stats.downloads, 1);
        assert_eq!(sleeper.sleeps.load(Ordering::SeqCst), 1);
        assert_eq!(artifact.file_extension, ".mp3");
        assert_eq!(artifact.title, "Mock Episode");
        assert!(artifact.stored_path.starts_with(dir.path().join("downloads")));
    }

    #[tokio::test]
    async fn test_never_ready_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default().logged_in(true).ready_after(u32::MAX);
        let session = session_with(&site, &dir).await;
        let sleeper = Arc::new(CountingSleeper::default());

        let err = PollingEngine::new(&session)
            .with_config(PollConfig::new(3, Duration::from_secs(10)))
            .with_sleeper(sleeper.clone())
            .poll_until_ready("4242")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.timeout_ms(), Some(30_000));
        assert_eq!(err.detail("max_attempts"), Some(serde_json::Value::from(3u32)));
        assert_eq!(err.detail("interval_seconds"), Some(serde_json::Value::from(10u64)));
        assert_eq!(sleeper.sleeps.load(Ordering::SeqCst), 2);
        assert_eq!(site.stats().downloads, 0);
    }

    #[tokio::test]
    async fn test_missing_title_uses_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default().logged_in(true).ready_after(1).title(None);
        let session = session_with(&site, &dir).await;

        let artifact = PollingEngine::new(&session).poll_until_ready("7").await.unwrap();

        assert_eq!(artifact.title, session.site().title_placeholder);
    }

    #[tokio::test]
    async fn test_lost_session_surfaces_login_error() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default().logged_in(true).ready_after(u32::MAX);
        let session = session_with(&site, &dir).await;
        site.revoke_sessions();

        let err = PollingEngine::new(&session).poll_until_ready("7").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Login);
        assert!(err.requires_intervention());
    }

    #[tokio::test]
    async fn test_download_without_source_is_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default()
            .logged_in(true)
            .ready_after(1)
            .download_mode(DownloadMode::Unavailable);
        let session = session_with(&site, &dir).await;

        let err = PollingEngine::new(&session).poll_until_ready("7").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Download);
    }

    #[tokio::test]
    async fn test_refreshes_auth_state_every_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default().logged_in(true).ready_after(3);
        let session = session_with(&site, &dir).await;
        let exports_before = site.stats().auth_exports;

        PollingEngine::new(&session).poll_until_ready("7").await.unwrap();

        assert_eq!(site.stats().auth_exports - exports_before, 3);
    }

    #[tokio::test]
    async fn test_failed_download_still_refreshes_auth_state() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default()
            .logged_in(true)
            .ready_after(1)
            .download_mode(DownloadMode::BrokenStream);
        let session = session_with(&site, &dir).await;
        let exports_before = site.stats().auth_exports;

        let err = PollingEngine::new(&session).poll_until_ready("7").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Download);
        assert!(err.is_retryable());
        assert_eq!(site.stats().auth_exports - exports_before, 1);
        assert!(session.store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_task_id_rejected_before_navigation() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default().logged_in(true);
        let session = session_with(&site, &dir).await;
        let before = site.stats();

        for task_id in ["", "12/../../x", "12?from=upload", "abc"] {
            let err = PollingEngine::new(&session)
                .poll_until_ready(task_id)
                .await
                .unwrap_err();

            assert_eq!(err.kind(), ErrorKind::TaskCreation, "task id {:?}", task_id);
            assert!(!err.is_retryable());
            assert_eq!(err.detail("task_id"), Some(serde_json::Value::from(task_id)));
        }

        let after = site.stats();
        assert_eq!(after.navigations, before.navigations);
        assert_eq!(after.task_page_loads, 0);
    }

    #[test]
    fn test_window_ms() {
        assert_eq!(PollConfig::default().window_ms(), 900_000);
        assert_eq!(PollConfig::new(3, Duration::ZERO).window_ms(), 0);
    }
}
