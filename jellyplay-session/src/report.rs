//! Fallback/error reporting for credential failures.
//!
//! When scoped-key issuance fails, the session degrades to the login token
//! and warns the user once. The warning goes to an optional byte sink (one
//! end of a pipe, typically); if the sink is absent or the write fails, it
//! falls back to standard output.

use jellyplay_api::ApiError;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Destination for user-facing warning messages.
pub type MessageSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Build the warning text for a failed key acquisition.
///
/// The cause line varies by failure; the trailing warning about the fallback
/// credential is fixed.
pub fn fallback_message(error: &ApiError, username: &str) -> String {
    let cause = match error {
        ApiError::Forbidden => format!(
            "Could not create API token because user \"{}\" does not have permission",
            username
        ),
        ApiError::Unauthorized => {
            "Could not create API token due to HTTP error: 401 Unauthorized".to_string()
        }
        ApiError::Status(status) => {
            format!("Could not create API token due to HTTP error: {}", status)
        }
        ApiError::Transport(err) => {
            format!("Could not create API token due to HTTP error: {}", err)
        }
    };
    format!(
        "{}\nUsing login token in place of API key - be careful not to leak it!",
        cause
    )
}

/// Write `message` to `sink`, falling back to stdout when the sink is absent
/// or its write fails.
pub async fn report(message: &str, sink: Option<&mut MessageSink>) {
    if let Some(sink) = sink {
        match sink.write_all(message.as_bytes()).await {
            Ok(()) => {
                let _ = sink.flush().await;
                return;
            }
            Err(err) => {
                debug!(error = %err, "message sink write failed, falling back to stdout");
            }
        }
    }
    let mut stdout = tokio::io::stdout();
    if stdout.write_all(message.as_bytes()).await.is_ok() {
        let _ = stdout.write_all(b"\n").await;
        let _ = stdout.flush().await;
    }
}
