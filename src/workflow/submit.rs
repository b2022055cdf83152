// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Document upload and task creation

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::driver::{ClickOptions, DriverResult};
use crate::error::{Error, Result};
use crate::session::SessionManager;
use crate::site::task_id_from_url;

/// A submitted document-processing task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: String,
    source_document_path: PathBuf,
}

impl Task {
    pub(crate) fn new(id: String, source_document_path: PathBuf) -> Self {
        Self {
            id,
            source_document_path,
        }
    }

    /// Identifier assigned by the site
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Document the task was created from
    pub fn source_document_path(&self) -> &Path {
        &self.source_document_path
    }
}

/// Uploads a document and reads back the task id
pub struct TaskSubmission<'a> {
    session: &'a SessionManager,
}

impl<'a> TaskSubmission<'a> {
    pub fn new(session: &'a SessionManager) -> Self {
        Self { session }
    }

    /// Upload `document` and wait for the site to open the task page
    pub async fn submit(&self, document: &Path) -> Result<Task> {
        let page = self.session.page()?;
        let site = self.session.site();

        match tokio::fs::metadata(document).await {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(Error::file_not_found(document)),
        }

        let current = step("read_url", page.current_url()).await?;
        if current != site.base_url_str() {
            tracing::info!(url = %current, "not on the conversation view, starting a new conversation");
            step(
                "new_conversation",
                page.click(&site.new_conversation_button, ClickOptions::default()),
            )
            .await?;
            step("wait_conversation", page.wait_for_url(&site.base_url_pattern())).await?;
        }

        tracing::debug!("opening document skill");
        step(
            "open_skills",
            page.click(&site.skill_menu_button, ClickOptions::default()),
        )
        .await?;
        step("choose_skill", page.click(&site.skill_button, ClickOptions::default())).await?;
        step("open_upload", page.click(&site.upload_button, ClickOptions::default())).await?;

        tracing::info!(path = %document.display(), "uploading document");
        step("choose_file", page.present_file(&site.upload_item, document)).await?;
        step("send", page.click(&site.send_button, ClickOptions::default())).await?;

        step("wait_task_page", page.wait_for_url(&site.task_url_pattern())).await?;
        let location = step("read_task_url", page.current_url()).await?;
        let id = task_id_from_url(&location).ok_or_else(|| {
            Error::task_creation("could not parse a task id from the task location")
                .with_detail("url", location.clone())
        })?;

        self.session.refresh_auth_state().await.map_err(|e| {
            Error::task_creation("could not export session state after submission")
                .with_detail("task_id", id.clone())
                .with_cause(&e)
        })?;

        tracing::info!(task_id = %id, "task created");
        Ok(Task::new(id, document.to_path_buf()))
    }
}

async fn step<T>(name: &'static str, action: impl Future<Output = DriverResult<T>>) -> Result<T> {
    action.await.map_err(|e| {
        Error::task_creation(format!("submission step '{}' failed", name))
            .with_detail("step", name)
            .with_cause(&e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MockSite;
    use crate::error::ErrorKind;
    use crate::session::SessionConfig;

    async fn initialized(site: &MockSite, dir: &tempfile::TempDir) -> SessionManager {
        let mut session = SessionManager::new(site.driver(), SessionConfig::new(dir.path()));
        session.init().await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_submit_creates_task() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("paper.pdf");
        tokio::fs::write(&document, b"%PDF-1.7").await.unwrap();
        let site = MockSite::default().logged_in(true).task_id("7412");
        let session = initialized(&site, &dir).await;
        let exports_before = site.stats().auth_exports;

        let task = TaskSubmission::new(&session).submit(&document).await.unwrap();

        assert_eq!(task.id(), "7412");
        assert_eq!(task.source_document_path(), document.as_path());
        let stats = site.stats();
        assert_eq!(stats.uploads, vec![document]);
        assert_eq!(stats.tasks_created, 1);
        assert_eq!(stats.auth_exports - exports_before, 1);
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_navigation() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default().logged_in(true);
        let session = initialized(&site, &dir).await;
        let before = site.stats();

        let err = TaskSubmission::new(&session)
            .submit(Path::new("/nonexistent/file.pdf"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert!(err.to_string().contains("/nonexistent/file.pdf"));
        let after = site.stats();
        assert_eq!(after.navigations, before.navigations);
        assert_eq!(after.clicks, before.clicks);
    }

    #[tokio::test]
    async fn test_starts_new_conversation_when_off_base_view() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("paper.pdf");
        tokio::fs::write(&document, b"%PDF-1.7").await.unwrap();
        let site = MockSite::default().logged_in(true).task_id("1");
        let session = initialized(&site, &dir).await;
        let page = session.page().unwrap();
        page.navigate("https://www.doubao.com/chat/999").await.unwrap();

        TaskSubmission::new(&session).submit(&document).await.unwrap();

        let clicks = site.stats().clicks;
        assert_eq!(clicks.first(), Some(&session.site().new_conversation_button));
    }

    #[tokio::test]
    async fn test_empty_task_id_is_task_creation_error() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("paper.pdf");
        tokio::fs::write(&document, b"%PDF-1.7").await.unwrap();
        let site = MockSite::default().logged_in(true).task_location("https://www.doubao.com/chat/12/");
        let session = initialized(&site, &dir).await;

        let err = TaskSubmission::new(&session).submit(&document).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TaskCreation);
        assert_eq!(
            err.detail("url"),
            Some(serde_json::Value::from("https://www.doubao.com/chat/12/"))
        );
    }

    #[tokio::test]
    async fn test_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockSite::default();
        let session = SessionManager::new(site.driver(), SessionConfig::new(dir.path()));

        let err = TaskSubmission::new(&session)
            .submit(Path::new("/nonexistent/file.pdf"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Initialization);
    }
}
