//! Session error types.

use jellyplay_api::ApiError;
use thiserror::Error;

use crate::player::PlayerError;

/// Errors that can escape a playback session operation.
///
/// Only [`SessionError::KeyAcquisitionFailed`] and transport-level
/// [`SessionError::Api`] errors propagate out of `play`; everything else in
/// the session degrades gracefully (fallback token, skipped update, logged
/// best-effort cleanup).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The key-creation retry budget was exhausted.
    #[error("Failed to create API key after {attempts} attempts")]
    KeyAcquisitionFailed {
        /// How many creation attempts were made.
        attempts: u32,
    },

    /// A backend call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// The external player could not be started or driven.
    #[error("player error: {0}")]
    Player(#[from] PlayerError),
}
