//! Playback session core for jellyplay.
//!
//! One [`Player`] owns one live playback session at a time: it acquires a
//! scoped streaming key from the server (with a login-token fallback when
//! issuance fails), launches an external mpv process on the stream URL,
//! consumes its position updates, marks the item played once 70% has been
//! watched, and revokes the scoped key after the player finishes.
//!
//! The two collaborators are abstracted behind traits:
//! [`jellyplay_api::MediaBackend`] for the HTTP side and
//! [`player::PlayerLauncher`] / [`player::PlayerHandle`] for the external
//! renderer.

pub mod error;
pub mod format;
pub mod keys;
pub mod player;
pub mod report;
pub mod session;
pub mod ticks;

pub use error::SessionError;
pub use player::{PlayerError, PlayerHandle, PlayerLauncher, PropertyChange};
pub use session::{Player, StreamKey};
