//! The media-server seam consumed by the session core.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ApiResult;

/// Backend operations the playback session needs.
///
/// Implemented by [`crate::ApiClient`] in production; tests substitute
/// hand-written stubs.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Fetch the API keys registered under the current account, keyed by
    /// application name.
    async fn list_api_keys(&self) -> ApiResult<HashMap<String, String>>;

    /// Register a new API key under `app_name`. The server does not return
    /// the key value inline; callers must re-list to obtain it.
    async fn create_api_key(&self, app_name: &str) -> ApiResult<()>;

    /// Delete a registered API key.
    async fn delete_api_key(&self, key: &str) -> ApiResult<()>;

    /// Fire the "mark item as played" notification for the current user.
    async fn mark_played(&self, item_id: &str) -> ApiResult<()>;

    /// Build the download/stream URL for an item, authorized by `key`.
    fn stream_url(&self, item_id: &str, key: &str) -> String;

    /// The long-lived login token, used as the fallback stream credential.
    fn login_token(&self) -> String;

    /// Display name of the authenticated user (for warning messages).
    fn username(&self) -> String;
}
