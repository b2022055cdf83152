// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Opaque authentication state
//!
//! Cookies, local storage and whatever else the driver needs to resume one
//! browser identity. The orchestration core never looks inside; it only
//! passes the blob back to the driver and lets callers persist it.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Exported authentication state of one browser identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthState(Value);

impl AuthState {
    /// Wrap a driver-produced value
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the raw value
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Unwrap into the raw value
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Export to JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_default()
    }

    /// Create from JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json).map(Self)
    }

    /// Write to a JSON file
    pub async fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, self.to_json()).await
    }

    /// Read from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl From<Value> for AuthState {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_is_passed_through_verbatim() {
        let raw = json!({"cookies": [{"name": "sessionid", "value": "abc"}], "origins": []});
        let state = AuthState::new(raw.clone());

        let parsed = AuthState::from_json(&state.to_json()).unwrap();
        assert_eq!(parsed.as_value(), &raw);
        assert_eq!(serde_json::to_value(&state).unwrap(), raw);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("auth.json");
        let state = AuthState::new(json!({"cookies": []}));

        state.save(&path).await.unwrap();
        let loaded = AuthState::load(&path).await.unwrap();

        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let err = AuthState::load(&path).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
