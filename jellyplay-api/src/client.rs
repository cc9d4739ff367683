//! Production `MediaBackend` implementation over reqwest.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use crate::backend::MediaBackend;
use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::types::AuthKeysResponse;

/// Client name advertised in the authorization header.
const CLIENT_NAME: &str = "jellyplay";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Authenticated HTTP client for the media server.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: String,
    user_id: String,
    username: String,
}

impl ApiClient {
    /// Build a client from persisted connection settings.
    pub fn new(config: &ServerConfig) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&config.access_token) {
            headers.insert("X-Emby-Token", value);
        }
        let auth = format!(
            "MediaBrowser Client=\"{}\", Device=\"{}\", DeviceId=\"{}\", Version=\"{}\"",
            CLIENT_NAME, config.device_id, config.device_id, CLIENT_VERSION,
        );
        if let Ok(value) = HeaderValue::from_str(&auth) {
            headers.insert("X-Emby-Authorization", value);
        }

        let http = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            token: config.access_token.clone(),
            user_id: config.user_id.clone(),
            username: config.username.clone(),
        })
    }

    /// Base URL of the server, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn check_status(response: &Response) -> ApiResult<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiError::from_status(status))
        }
    }
}

#[async_trait]
impl MediaBackend for ApiClient {
    async fn list_api_keys(&self) -> ApiResult<HashMap<String, String>> {
        let url = format!("{}/Auth/Keys", self.base_url);
        debug!(url = %url, "listing API keys");
        let response = self.http.get(&url).send().await?;
        match response.status() {
            StatusCode::OK => {
                let body: AuthKeysResponse = response.json().await?;
                Ok(body
                    .items
                    .into_iter()
                    .map(|key| (key.app_name, key.access_token))
                    .collect())
            }
            status => Err(ApiError::from_status(status)),
        }
    }

    async fn create_api_key(&self, app_name: &str) -> ApiResult<()> {
        // The app name MUST go in the query string. The server (observed on
        // Jellyfin 10.7.x) rejects it as a POST body.
        let url = format!("{}/Auth/Keys", self.base_url);
        debug!(url = %url, app = app_name, "requesting API key creation");
        let response = self
            .http
            .post(&url)
            .query(&[("app", app_name)])
            .send()
            .await?;
        Self::check_status(&response)
    }

    async fn delete_api_key(&self, key: &str) -> ApiResult<()> {
        let url = format!("{}/Auth/Keys/{}", self.base_url, key);
        debug!("revoking API key");
        let response = self.http.delete(&url).send().await?;
        Self::check_status(&response)
    }

    async fn mark_played(&self, item_id: &str) -> ApiResult<()> {
        let url = format!(
            "{}/Users/{}/PlayedItems/{}",
            self.base_url, self.user_id, item_id
        );
        debug!(item = item_id, "marking item as played");
        let response = self.http.post(&url).send().await?;
        Self::check_status(&response)
    }

    fn stream_url(&self, item_id: &str, key: &str) -> String {
        format!("{}/Items/{}/Download?api_key={}", self.base_url, item_id, key)
    }

    fn login_token(&self) -> String {
        self.token.clone()
    }

    fn username(&self) -> String {
        self.username.clone()
    }
}
