// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # Podsmith - Browser-Driven Podcast Generation
//!
//! Automates a web application that turns uploaded documents into podcast
//! audio: it owns a browser session, logs in with a QR code when needed,
//! uploads a document, polls the resulting task until the audio can be
//! downloaded, and stores the file under its SHA-256.
//!
//! ## Features
//!
//! - Session lifecycle: local launch or remote browser connection
//! - Persistent authentication state, refreshed after every interaction
//! - QR code login with pluggable display handlers
//! - Bounded polling with a fixed interval
//! - Content-addressed artifact store with verification
//! - Typed errors with stable codes and structured details
//! - Driver abstraction with an in-memory simulated site
//!
//! ## Example
//!
//! ```rust,no_run
//! use podsmith::{MockSite, SaveQrCodeToFile, SessionConfig, SessionManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let site = MockSite::default();
//!     let mut session = SessionManager::new(site.driver(), SessionConfig::new("workspace"));
//!
//!     session.init().await?;
//!     session.login(&SaveQrCodeToFile::new("workspace/qrcode.png")).await?;
//!
//!     let artifact = session.generate("paper.pdf").await?;
//!     println!("{} -> {}", artifact.title, artifact.stored_path.display());
//!
//!     session.destroy().await;
//!     Ok(())
//! }
//! ```

pub mod driver;
pub mod error;
pub mod session;
pub mod site;
pub mod store;
pub mod workflow;

// Re-exports for convenience

// Session
pub use session::{AuthState, AuthStateHandle, SessionConfig, SessionManager};

// Site
pub use site::{task_id_from_url, SiteProfile};

// Workflow
pub use workflow::{
    qr_handler, AuthenticationFlow, HandlerError, LoginMethod, LoginOutcome, LoginState, QrCode,
    QrCodeHandler, SaveQrCodeToFile,
};
pub use workflow::{PollAttempt, PollConfig, PollingEngine, Sleeper, TokioSleeper};
pub use workflow::{Task, TaskSubmission};

// Store
pub use store::{hash_bytes, Artifact, ArtifactStore, HashMismatch, StoredArtifact, VerifyReport};

// Driver
pub use driver::{
    ClickOptions, Download, DriverError, DriverResult, LaunchOptions, PageDriver, UrlPattern,
    WaitOptions,
};
pub use driver::{DownloadMode, MockDriver, MockSite};

// Errors
pub use error::{Error, ErrorKind, ErrorReport, Result};

/// Podsmith version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
