// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Workflow stages driven through a [`crate::SessionManager`]
//!
//! Each stage borrows the session, drives the page, converts driver failures
//! into typed errors and asks the session to refresh its authentication
//! state before returning.

mod login;
mod poll;
mod submit;

pub use login::{
    qr_handler, AuthenticationFlow, FnQrHandler, HandlerError, LoginMethod, LoginOutcome,
    LoginState, QrCode, QrCodeHandler, SaveQrCodeToFile,
};
pub use poll::{PollAttempt, PollConfig, PollingEngine, Sleeper, TokioSleeper};
pub use submit::{Task, TaskSubmission};
