//! External player abstraction.
//!
//! The session core only needs a small surface from the renderer: send it a
//! command list, receive a stream of property-change events, know when it
//! finished, and be able to halt it. [`mpv`] provides the production
//! implementation over mpv's JSON IPC socket.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

#[cfg(unix)]
pub mod mpv;

/// Errors from the external player process or its IPC channel.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The player binary could not be started.
    #[error("failed to spawn player process: {0}")]
    Spawn(#[source] std::io::Error),

    /// The IPC transport failed.
    #[error("IPC error: {0}")]
    Ipc(#[from] std::io::Error),

    /// The player sent something we could not interpret.
    #[error("malformed IPC message: {0}")]
    Protocol(String),

    /// The player answered a command with an error.
    #[error("player rejected command: {0}")]
    CommandFailed(String),

    /// The player went away before answering.
    #[error("player connection closed")]
    Closed,
}

/// A property-change notification pushed by the player.
#[derive(Debug, Clone)]
pub struct PropertyChange {
    /// Observed property name, e.g. `time-pos`.
    pub name: String,
    /// New value; `Null` while the property is unavailable.
    pub data: Value,
}

/// Handle to one running external player instance.
#[async_trait]
pub trait PlayerHandle: Send + Sync {
    /// Send a raw command list, e.g. `["set_property", "pause", true]`.
    async fn send_command(&self, command: Vec<Value>) -> Result<(), PlayerError>;

    /// Subscribe to property-change notifications.
    fn subscribe(&self) -> broadcast::Receiver<PropertyChange>;

    /// Resolve once the player has finished (process exit or IPC teardown).
    async fn wait_complete(&self);

    /// Halt the player. Best-effort; the process may already be gone.
    async fn stop(&self) -> Result<(), PlayerError>;
}

/// Factory for external player instances, one per playback session.
#[async_trait]
pub trait PlayerLauncher: Send + Sync {
    /// Start the player pointed at `url` and hand back its control handle.
    async fn launch(&self, url: &str) -> Result<Arc<dyn PlayerHandle>, PlayerError>;
}
