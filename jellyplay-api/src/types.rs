//! Wire DTOs for the media-server API.
//!
//! Field names follow the server's PascalCase JSON convention.

use serde::{Deserialize, Serialize};

/// One registered API key, as returned by `GET /Auth/Keys`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthKeyInfo {
    /// Application the key was registered under.
    pub app_name: String,
    /// The key value itself.
    pub access_token: String,
}

/// Response envelope of `GET /Auth/Keys`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthKeysResponse {
    /// Registered keys for the current account.
    pub items: Vec<AuthKeyInfo>,
}

/// A playable library item.
///
/// Only the fields the session controller needs; the server returns many
/// more.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaItem {
    /// Server-assigned item identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Total duration in native ticks (100 ns units).
    #[serde(default)]
    pub run_time_ticks: u64,
}
