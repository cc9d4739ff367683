//! Persisted server connection settings.

use serde::{Deserialize, Serialize};

/// Connection settings for the media server.
///
/// Produced by the (out-of-scope) login flow and reused across sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the server, without a trailing slash.
    pub server_url: String,
    /// Long-lived login token. Doubles as the fallback stream credential.
    pub access_token: String,
    /// Id of the authenticated user.
    pub user_id: String,
    /// Display name of the authenticated user.
    pub username: String,
    /// Stable identifier for this client installation.
    pub device_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8096".to_string(),
            access_token: String::new(),
            user_id: String::new(),
            username: String::new(),
            device_id: String::new(),
        }
    }
}

impl ServerConfig {
    /// Load the config from the platform config dir, falling back to
    /// defaults when missing or unreadable.
    pub fn load() -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("jellyplay").join("config.json");
            if config_path.exists() {
                if let Ok(content) = std::fs::read_to_string(&config_path) {
                    if let Ok(config) = serde_json::from_str(&content) {
                        return config;
                    }
                }
            }
        }
        Self::default()
    }

    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(config_dir) = dirs::config_dir() {
            let app_dir = config_dir.join("jellyplay");
            std::fs::create_dir_all(&app_dir)?;
            let config_path = app_dir.join("config.json");
            let content = serde_json::to_string_pretty(self)?;
            std::fs::write(config_path, content)?;
        }
        Ok(())
    }
}
