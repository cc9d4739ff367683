//! mpv JSON IPC client.
//!
//! Spawns `mpv --input-ipc-server=<socket> <url>` and speaks the
//! newline-delimited JSON protocol over the unix socket: commands carry a
//! `request_id` that the reply echoes back, events arrive unsolicited as
//! objects with an `event` field. Completion is detected when the IPC stream
//! reaches EOF or the process exits, whichever comes first.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::OwnedWriteHalf;
use tokio::process::Command;
use tokio::sync::{Notify, broadcast, oneshot, watch};
use tracing::{debug, warn};

use super::{PlayerError, PlayerHandle, PlayerLauncher, PropertyChange};

/// How many times to poll for the IPC socket while mpv starts up.
const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_POLL: Duration = Duration::from_millis(100);

/// Capacity of the property-change fan-out channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

static SOCKET_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Launches mpv processes with an IPC server socket attached.
#[derive(Debug, Clone)]
pub struct MpvLauncher {
    binary: PathBuf,
}

impl Default for MpvLauncher {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("mpv"),
        }
    }
}

impl MpvLauncher {
    /// Use a specific mpv binary instead of resolving `mpv` from `PATH`.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

fn socket_path() -> PathBuf {
    let n = SOCKET_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("jellyplay-mpv-{}-{}.sock", std::process::id(), n))
}

// mpv creates the socket shortly after startup; poll until it accepts.
async fn connect_with_retry(path: &Path) -> Result<UnixStream, PlayerError> {
    for _ in 0..CONNECT_ATTEMPTS {
        match UnixStream::connect(path).await {
            Ok(stream) => return Ok(stream),
            Err(_) => tokio::time::sleep(CONNECT_POLL).await,
        }
    }
    UnixStream::connect(path).await.map_err(PlayerError::Ipc)
}

#[async_trait]
impl PlayerLauncher for MpvLauncher {
    async fn launch(&self, url: &str) -> Result<Arc<dyn PlayerHandle>, PlayerError> {
        let socket = socket_path();
        debug!(socket = %socket.display(), "spawning mpv");

        let mut child = Command::new(&self.binary)
            .arg(format!("--input-ipc-server={}", socket.display()))
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(PlayerError::Spawn)?;

        let stream = connect_with_retry(&socket).await?;
        let (read_half, write_half) = stream.into_split();

        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (done_tx, done_rx) = watch::channel(false);
        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let kill = Arc::new(Notify::new());

        // Reader: demultiplex events and command replies until EOF.
        {
            let events_tx = events_tx.clone();
            let pending = Arc::clone(&pending);
            let done_tx = done_tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(read_half).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let message: Value = match serde_json::from_str(&line) {
                        Ok(value) => value,
                        Err(err) => {
                            debug!(error = %err, "discarding malformed IPC line");
                            continue;
                        }
                    };
                    if let Some(event) = message.get("event").and_then(Value::as_str) {
                        if event == "property-change" {
                            let name = message
                                .get("name")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string();
                            let data = message.get("data").cloned().unwrap_or(Value::Null);
                            let _ = events_tx.send(PropertyChange { name, data });
                        }
                        continue;
                    }
                    if let Some(id) = message.get("request_id").and_then(Value::as_u64) {
                        if let Some(reply_tx) = pending.lock().unwrap().remove(&id) {
                            let _ = reply_tx.send(message);
                        }
                    }
                }
                // Socket closed: wake completion waiters, fail pending calls.
                pending.lock().unwrap().clear();
                let _ = done_tx.send(true);
            });
        }

        // Supervisor: reap the child, honor kill requests from stop().
        {
            let done_tx = done_tx.clone();
            let kill = Arc::clone(&kill);
            let socket = socket.clone();
            tokio::spawn(async move {
                tokio::select! {
                    status = child.wait() => {
                        debug!(?status, "mpv exited");
                    }
                    _ = kill.notified() => {
                        if let Err(err) = child.start_kill() {
                            warn!(error = %err, "failed to kill mpv");
                        }
                        let _ = child.wait().await;
                    }
                }
                let _ = done_tx.send(true);
                let _ = std::fs::remove_file(&socket);
            });
        }

        Ok(Arc::new(MpvHandle {
            writer: tokio::sync::Mutex::new(write_half),
            events_tx,
            done_rx,
            pending,
            kill,
            next_request_id: AtomicU64::new(1),
        }))
    }
}

/// Control handle for one running mpv instance.
pub struct MpvHandle {
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    events_tx: broadcast::Sender<PropertyChange>,
    done_rx: watch::Receiver<bool>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>,
    kill: Arc<Notify>,
    next_request_id: AtomicU64,
}

impl std::fmt::Debug for MpvHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpvHandle")
            .field("done", &*self.done_rx.borrow())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PlayerHandle for MpvHandle {
    async fn send_command(&self, command: Vec<Value>) -> Result<(), PlayerError> {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, reply_tx);

        let payload = json!({ "command": command, "request_id": id });
        let mut line =
            serde_json::to_string(&payload).map_err(|err| PlayerError::Protocol(err.to_string()))?;
        line.push('\n');

        {
            let mut writer = self.writer.lock().await;
            if let Err(err) = writer.write_all(line.as_bytes()).await {
                self.pending.lock().unwrap().remove(&id);
                return Err(PlayerError::Ipc(err));
            }
        }

        let reply = reply_rx.await.map_err(|_| PlayerError::Closed)?;
        match reply.get("error").and_then(Value::as_str) {
            Some("success") | None => Ok(()),
            Some(other) => Err(PlayerError::CommandFailed(other.to_string())),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<PropertyChange> {
        self.events_tx.subscribe()
    }

    async fn wait_complete(&self) {
        let mut done_rx = self.done_rx.clone();
        while !*done_rx.borrow_and_update() {
            if done_rx.changed().await.is_err() {
                break;
            }
        }
    }

    async fn stop(&self) -> Result<(), PlayerError> {
        // Ask nicely over IPC, then make sure the process goes away.
        if let Err(err) = self.send_command(vec![json!("quit")]).await {
            debug!(error = %err, "quit command failed, killing mpv");
        }
        self.kill.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_paths_are_unique() {
        let a = socket_path();
        let b = socket_path();
        assert_ne!(a, b);
        assert!(a.to_string_lossy().contains("jellyplay-mpv-"));
    }

    #[tokio::test]
    async fn command_replies_resolve_pending_calls() {
        // Drive the handle against an in-process socket pair standing in for
        // mpv's IPC server.
        let dir = std::env::temp_dir();
        let path = dir.join(format!(
            "jellyplay-mpv-test-{}-{}.sock",
            std::process::id(),
            SOCKET_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = std::fs::remove_file(&path);
        let listener = tokio::net::UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();
            // Echo a success reply for each received command.
            while let Ok(Some(line)) = lines.next_line().await {
                let msg: Value = serde_json::from_str(&line).unwrap();
                let id = msg.get("request_id").and_then(Value::as_u64).unwrap();
                let reply = format!("{}\n", json!({ "error": "success", "request_id": id }));
                write_half.write_all(reply.as_bytes()).await.unwrap();
            }
        });

        let stream = UnixStream::connect(&path).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        let (events_tx, _) = broadcast::channel(8);
        let (done_tx, done_rx) = watch::channel(false);
        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        {
            let pending = Arc::clone(&pending);
            let events_tx = events_tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(read_half).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let message: Value = serde_json::from_str(&line).unwrap();
                    if let Some(id) = message.get("request_id").and_then(Value::as_u64) {
                        if let Some(tx) = pending.lock().unwrap().remove(&id) {
                            let _ = tx.send(message);
                        }
                    } else if message.get("event").is_some() {
                        let _ = events_tx.send(PropertyChange {
                            name: String::new(),
                            data: Value::Null,
                        });
                    }
                }
                let _ = done_tx.send(true);
            });
        }

        let handle = MpvHandle {
            writer: tokio::sync::Mutex::new(write_half),
            events_tx,
            done_rx,
            pending,
            kill: Arc::new(Notify::new()),
            next_request_id: AtomicU64::new(1),
        };

        handle
            .send_command(vec![json!("observe_property"), json!(1), json!("time-pos")])
            .await
            .unwrap();
        handle
            .send_command(vec![json!("set_property"), json!("pause"), json!(true)])
            .await
            .unwrap();

        server.abort();
        let _ = std::fs::remove_file(&path);
    }
}
