// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Session ownership: driver handles, configuration and authentication state

mod auth_state;
mod config;
mod manager;

pub use auth_state::AuthState;
pub use config::SessionConfig;
pub use manager::{AuthStateHandle, SessionManager};
