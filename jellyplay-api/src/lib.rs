//! Backend HTTP client layer for jellyplay.
//!
//! This crate makes the "already-authenticated media-server collaborator"
//! concrete: a typed error enum for status branching, the wire DTOs the
//! server speaks, persisted connection settings, and the [`MediaBackend`]
//! seam trait the session core consumes. [`ApiClient`] is the production
//! implementation over reqwest.

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use backend::MediaBackend;
pub use client::ApiClient;
pub use config::ServerConfig;
pub use error::ApiError;
pub use types::{AuthKeyInfo, AuthKeysResponse, MediaItem};
