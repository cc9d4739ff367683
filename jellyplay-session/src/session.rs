//! The playback session state machine.
//!
//! One [`Player`] owns at most one live session. `play` tears down any prior
//! external process, resets the session state, resolves a stream credential
//! (scoped key, or the login token as fallback), launches the renderer on
//! the stream URL and wires up progress tracking and completion teardown.

use std::sync::{Arc, Mutex};

use jellyplay_api::{ApiError, MediaBackend, MediaItem};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::format::format_duration;
use crate::keys;
use crate::player::{PlayerHandle, PlayerLauncher, PropertyChange};
use crate::report::{self, MessageSink};
use crate::ticks::ticks_to_seconds;

/// Watched-percentage threshold past which the item is marked played.
const PLAYED_THRESHOLD_PERCENT: f64 = 70.0;

/// The property-observation id registered with the player.
const TIME_POS_OBSERVE_ID: u64 = 1;

/// Stream credential resolved for one session.
///
/// The variant decides teardown: scoped keys are revoked once playback
/// completes, fallback tokens belong to the authentication layer and are
/// never deleted here.
#[derive(Debug, Clone)]
pub enum StreamKey {
    /// Short-lived key created for this session.
    Scoped(String),
    /// Long-lived login token substituted when key issuance failed.
    Fallback(String),
}

impl StreamKey {
    /// The credential value to embed in the stream URL.
    pub fn secret(&self) -> &str {
        match self {
            StreamKey::Scoped(secret) | StreamKey::Fallback(secret) => secret,
        }
    }

    /// Whether this is the login-token fallback.
    pub fn is_fallback(&self) -> bool {
        matches!(self, StreamKey::Fallback(_))
    }
}

#[derive(Debug, Default)]
struct SessionState {
    item: Option<MediaItem>,
    /// Elapsed seconds, from observed player time only.
    position: u64,
    /// Total seconds, fixed per item.
    duration: u64,
    playing: bool,
    paused: bool,
    /// Latched once the played notification has fired for this item.
    played: bool,
    key: Option<StreamKey>,
}

/// Playback session controller.
pub struct Player {
    backend: Arc<dyn MediaBackend>,
    launcher: Arc<dyn PlayerLauncher>,
    state: Arc<Mutex<SessionState>>,
    handle: Mutex<Option<Arc<dyn PlayerHandle>>>,
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("Player")
            .field("playing", &state.playing)
            .field("paused", &state.paused)
            .field("position", &state.position)
            .field("duration", &state.duration)
            .finish_non_exhaustive()
    }
}

impl Player {
    /// Create a controller over the given collaborators.
    pub fn new(backend: Arc<dyn MediaBackend>, launcher: Arc<dyn PlayerLauncher>) -> Self {
        Self {
            backend,
            launcher,
            state: Arc::new(Mutex::new(SessionState::default())),
            handle: Mutex::new(None),
        }
    }

    /// Create a controller driving a real mpv process.
    #[cfg(unix)]
    pub fn with_mpv(backend: Arc<dyn MediaBackend>) -> Self {
        Self::new(backend, Arc::new(crate::player::mpv::MpvLauncher::default()))
    }

    /// Whether a session is currently active.
    pub fn playing(&self) -> bool {
        self.state.lock().unwrap().playing
    }

    /// Whether playback is paused.
    pub fn paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    /// Elapsed seconds of the current item.
    pub fn position(&self) -> u64 {
        self.state.lock().unwrap().position
    }

    /// Total seconds of the current item.
    pub fn duration(&self) -> u64 {
        self.state.lock().unwrap().duration
    }

    /// The credential held for the active session, if any.
    ///
    /// Cleared once playback completes and the scoped key is revoked; a
    /// revoked key is never reused.
    pub fn stream_key(&self) -> Option<StreamKey> {
        self.state.lock().unwrap().key.clone()
    }

    /// Render the display line: item name, elapsed and total time.
    pub fn playback_string(&self) -> String {
        let state = self.state.lock().unwrap();
        let name = state
            .item
            .as_ref()
            .map(|item| item.name.as_str())
            .unwrap_or_default();
        format!(
            " {}                     {} / {}",
            name,
            format_duration(state.position),
            format_duration(state.duration)
        )
    }

    /// Start playing `item`.
    ///
    /// With `block` set, returns once the external player has finished and
    /// the scoped key is revoked; otherwise completion and teardown run as a
    /// background task. `sink` receives the one-time warning if credential
    /// issuance fails and the session degrades to the login token.
    ///
    /// Only [`SessionError::KeyAcquisitionFailed`], transport errors from the
    /// initial key flow, and launch failures propagate; an active prior
    /// session is quit best-effort first.
    pub async fn play(
        &self,
        item: MediaItem,
        block: bool,
        sink: Option<MessageSink>,
    ) -> Result<(), SessionError> {
        // Tear down a prior session before starting the next process.
        let prior = {
            let active = self.state.lock().unwrap().playing;
            if active { self.handle.lock().unwrap().clone() } else { None }
        };
        if let Some(prior) = prior {
            if let Err(err) = prior.send_command(vec![json!("quit")]).await {
                debug!(error = %err, "quit to prior player failed");
            }
        }

        {
            let mut state = self.state.lock().unwrap();
            state.position = 0;
            state.duration = ticks_to_seconds(item.run_time_ticks);
            state.playing = true;
            state.played = false;
            state.item = Some(item.clone());
        }

        let key = self.resolve_stream_key(sink).await?;
        self.state.lock().unwrap().key = Some(key.clone());

        let url = self.backend.stream_url(&item.id, key.secret());
        let handle = self.launcher.launch(&url).await?;
        let events = handle.subscribe();
        *self.handle.lock().unwrap() = Some(Arc::clone(&handle));

        handle
            .send_command(vec![
                json!("observe_property"),
                json!(TIME_POS_OBSERVE_ID),
                json!("time-pos"),
            ])
            .await?;

        self.spawn_position_pump(events, item.id.clone());
        info!(item = %item.id, "playback started");

        let completion = {
            let state = Arc::clone(&self.state);
            let backend = Arc::clone(&self.backend);
            let handle = Arc::clone(&handle);
            async move {
                handle.wait_complete().await;
                {
                    let mut state = state.lock().unwrap();
                    state.playing = false;
                    state.key = None;
                }
                match key {
                    StreamKey::Scoped(secret) => {
                        if let Err(err) = keys::revoke_key(backend.as_ref(), Some(&secret)).await {
                            warn!(error = %err, "stream key revocation failed");
                        }
                    }
                    // Fallback tokens are owned by the auth layer.
                    StreamKey::Fallback(_) => {}
                }
            }
        };

        if block {
            completion.await;
        } else {
            tokio::spawn(completion);
        }
        Ok(())
    }

    /// Toggle pause and push the new state to the player.
    pub async fn pause(&self) {
        let paused = {
            let mut state = self.state.lock().unwrap();
            state.paused = !state.paused;
            state.paused
        };
        let handle = self.handle.lock().unwrap().clone();
        if let Some(handle) = handle {
            if let Err(err) = handle
                .send_command(vec![json!("set_property"), json!("pause"), json!(paused)])
                .await
            {
                warn!(error = %err, "pause command failed");
            }
        }
    }

    /// End the session and halt the player. Best-effort: the process may
    /// already be gone.
    pub async fn stop(&self) {
        self.state.lock().unwrap().playing = false;
        let handle = self.handle.lock().unwrap().clone();
        if let Some(handle) = handle {
            if let Err(err) = handle.stop().await {
                debug!(error = %err, "stop command failed");
            }
        }
    }

    /// Acquire a scoped key, degrading to the login token on HTTP errors.
    ///
    /// `KeyAcquisitionFailed` and transport errors are hard failures; any
    /// status-level error (401/403/other) produces the one-time warning and
    /// the fallback credential.
    async fn resolve_stream_key(
        &self,
        mut sink: Option<MessageSink>,
    ) -> Result<StreamKey, SessionError> {
        match keys::acquire_key(self.backend.as_ref()).await {
            Ok(secret) => Ok(StreamKey::Scoped(secret)),
            Err(SessionError::Api(err @ ApiError::Transport(_))) => {
                Err(SessionError::Api(err))
            }
            Err(SessionError::Api(err)) => {
                let message = report::fallback_message(&err, &self.backend.username());
                report::report(&message, sink.as_mut()).await;
                warn!(error = %err, "using login token in place of a scoped key");
                Ok(StreamKey::Fallback(self.backend.login_token()))
            }
            Err(other) => Err(other),
        }
    }

    fn spawn_position_pump(
        &self,
        mut events: broadcast::Receiver<PropertyChange>,
        item_id: String,
    ) {
        let state = Arc::clone(&self.state);
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(change) if change.name == "time-pos" => {
                        handle_position_update(&state, &backend, &item_id, &change.data);
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "position events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

/// Parse the raw player time and apply it to the session.
///
/// Unparseable values are skipped. Crossing the 70% threshold fires the
/// mark-played notification exactly once per session; the flag is latched
/// before the request is spawned so repeated updates cannot re-fire it.
fn handle_position_update(
    state: &Arc<Mutex<SessionState>>,
    backend: &Arc<dyn MediaBackend>,
    item_id: &str,
    raw: &Value,
) {
    let Some(seconds) = parse_seconds(raw) else {
        return;
    };

    let mut session = state.lock().unwrap();
    session.position = seconds;
    if session.duration == 0 || session.played {
        return;
    }
    let percent = session.position as f64 / session.duration as f64 * 100.0;
    if percent > PLAYED_THRESHOLD_PERCENT {
        session.played = true;
        drop(session);

        let backend = Arc::clone(backend);
        let item_id = item_id.to_string();
        // Fire-and-forget: a failed notification never disturbs playback.
        tokio::spawn(async move {
            if let Err(err) = backend.mark_played(&item_id).await {
                warn!(error = %err, item = %item_id, "mark-played notification failed");
            }
        });
    }
}

fn parse_seconds(raw: &Value) -> Option<u64> {
    match raw {
        Value::Number(n) => n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64),
        Value::String(s) => s.parse::<u64>().ok(),
        _ => None,
    }
}
