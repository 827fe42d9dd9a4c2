//! Per-job channel manager.
//!
//! [`ChannelManager`] owns at most one live WebSocket channel at a
//! time and runs its full lifecycle: connect, decode frames, reconnect
//! with bounded backoff on abnormal closure, and tear down on a
//! deliberate [`close`](ChannelManager::close).
//!
//! Consumers observe the channel through three read-only surfaces:
//! a [`watch`] of [`ConnectionState`], a [`watch`] of the latest
//! [`ProgressEvent`], and a [`broadcast`] stream of [`ChannelEvent`]s.
//! Subscribers attach and detach independently of the connection
//! lifecycle, so re-creating a consumer never requires reopening the
//! channel.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use tempest_core::{JobId, ProgressEvent};

use crate::client::{ChannelClient, ChannelConnection};
use crate::messages::parse_frame;
use crate::reconnect::{reconnect_loop, BackoffConfig, ReconnectOutcome};
use crate::state::ConnectionState;

/// Broadcast channel capacity for channel events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long `close()` waits for the channel task to exit.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Configuration for a [`ChannelManager`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket base URL, e.g. `ws://host:8000`.
    pub ws_url: String,
    /// Reconnect backoff parameters.
    pub backoff: BackoffConfig,
}

impl ChannelConfig {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            backoff: BackoffConfig::default(),
        }
    }
}

/// Events emitted by the channel lifecycle.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The channel is connected (initially or after a reconnect).
    Connected,
    /// A decoded progress update arrived.
    Progress(ProgressEvent),
    /// The channel dropped abnormally; reconnect attempts are running.
    Reconnecting,
    /// All reconnect attempts failed. No further reconnects will be
    /// scheduled; callers should fall back to pull-based checks.
    UpdatesUnavailable,
    /// The channel was closed deliberately (by the client or by a
    /// normal server closure). No reconnect is scheduled.
    Closed,
}

/// Owns one live progress channel and its reconnect policy.
///
/// Each manager instance is self-contained; tests can run any number
/// of managers side by side without interference.
pub struct ChannelManager {
    config: ChannelConfig,
    active: Mutex<Option<ActiveChannel>>,
    state_tx: watch::Sender<ConnectionState>,
    last_event_tx: watch::Sender<Option<ProgressEvent>>,
    event_tx: broadcast::Sender<ChannelEvent>,
}

/// Bookkeeping for the currently open channel.
struct ActiveChannel {
    job_id: JobId,
    cancel: CancellationToken,
    outbound_tx: mpsc::UnboundedSender<String>,
    task: tokio::task::JoinHandle<()>,
}

impl ChannelManager {
    pub fn new(config: ChannelConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (last_event_tx, _) = watch::channel(None);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            active: Mutex::new(None),
            state_tx,
            last_event_tx,
            event_tx,
        }
    }

    /// Subscribe to channel lifecycle and progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.event_tx.subscribe()
    }

    /// Observable connection state.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Observable latest progress event (the only one retained).
    pub fn last_progress(&self) -> watch::Receiver<Option<ProgressEvent>> {
        self.last_event_tx.subscribe()
    }

    /// Whether the channel is currently connected.
    pub fn is_connected(&self) -> bool {
        self.state_tx.borrow().is_connected()
    }

    /// Open the channel for a job.
    ///
    /// At most one channel is live at a time. Calling `open` for the
    /// job that is already open (connected or still connecting) is a
    /// no-op, so no second connection attempt is ever spawned. Calling
    /// it for a different job closes the existing channel first.
    pub async fn open(&self, job_id: JobId) {
        let mut active = self.active.lock().await;

        if let Some(existing) = active.as_ref() {
            if existing.job_id == job_id && !existing.task.is_finished() {
                tracing::debug!(%job_id, "Channel already open; ignoring open()");
                return;
            }
        }

        if let Some(old) = active.take() {
            tracing::info!(
                old_job_id = %old.job_id,
                new_job_id = %job_id,
                "Replacing existing channel",
            );
            shutdown_channel(old).await;
        }

        let cancel = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let client = ChannelClient::new(self.config.ws_url.clone(), job_id.clone());

        let ctx = TaskContext {
            backoff: self.config.backoff.clone(),
            state_tx: self.state_tx.clone(),
            last_event_tx: self.last_event_tx.clone(),
            event_tx: self.event_tx.clone(),
            cancel: cancel.clone(),
        };

        tracing::info!(%job_id, "Opening progress channel");
        let task = tokio::spawn(run_channel_loop(client, ctx, outbound_rx));

        *active = Some(ActiveChannel {
            job_id,
            cancel,
            outbound_tx,
            task,
        });
    }

    /// Close the channel deliberately.
    ///
    /// Idempotent and always safe to call, including with no active
    /// channel. Cancels any pending reconnect so no stale timer can
    /// revive a channel the caller believes is dead.
    pub async fn close(&self) {
        let mut active = self.active.lock().await;
        if let Some(old) = active.take() {
            tracing::info!(job_id = %old.job_id, "Closing progress channel");
            shutdown_channel(old).await;
        }
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }

    /// Send a text message to the server.
    ///
    /// The protocol is push-only from the server in the steady state,
    /// so this is rarely exercised. When not connected the message is
    /// dropped with a debug log rather than an error.
    pub async fn send(&self, text: String) {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(channel) if self.is_connected() => {
                if channel.outbound_tx.send(text).is_err() {
                    tracing::debug!(
                        job_id = %channel.job_id,
                        "Channel task gone; dropping outbound message",
                    );
                }
            }
            _ => {
                tracing::debug!("send() while not connected; dropping message");
            }
        }
    }
}

/// Cancel a channel task and wait briefly for it to exit.
async fn shutdown_channel(channel: ActiveChannel) {
    channel.cancel.cancel();
    let _ = tokio::time::timeout(CLOSE_GRACE, channel.task).await;
}

/// Shared handles the channel task needs.
struct TaskContext {
    backoff: BackoffConfig,
    state_tx: watch::Sender<ConnectionState>,
    last_event_tx: watch::Sender<Option<ProgressEvent>>,
    event_tx: broadcast::Sender<ChannelEvent>,
    cancel: CancellationToken,
}

/// Why the frame loop stopped.
enum StreamEnd {
    /// Server closed with code 1000. No reconnect.
    NormalClosure,
    /// Abnormal closure, receive error, or exhausted stream. Reconnect.
    Abnormal,
    /// Client-initiated cancellation. No reconnect.
    Cancelled,
}

/// Core channel loop: connect, process frames, reconnect.
///
/// Runs until a deliberate closure, cancellation, or exhausted
/// reconnect attempts.
async fn run_channel_loop(
    client: ChannelClient,
    ctx: TaskContext,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
) {
    let TaskContext {
        backoff,
        state_tx,
        last_event_tx,
        event_tx,
        cancel,
    } = ctx;

    state_tx.send_replace(ConnectionState::Connecting);

    let mut conn = tokio::select! {
        _ = cancel.cancelled() => {
            state_tx.send_replace(ConnectionState::Disconnected);
            return;
        }
        result = client.connect() => match result {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(
                    job_id = %client.job_id(),
                    error = %e,
                    "Initial connect failed; entering reconnect loop",
                );
                state_tx.send_replace(ConnectionState::Reconnecting);
                let _ = event_tx.send(ChannelEvent::Reconnecting);
                match reconnect_loop(&client, &backoff, &cancel).await {
                    ReconnectOutcome::Restored(conn) => conn,
                    ReconnectOutcome::ExhaustedAttempts => {
                        state_tx.send_replace(ConnectionState::Disconnected);
                        let _ = event_tx.send(ChannelEvent::UpdatesUnavailable);
                        return;
                    }
                    ReconnectOutcome::Cancelled => {
                        state_tx.send_replace(ConnectionState::Disconnected);
                        return;
                    }
                }
            }
        }
    };

    loop {
        state_tx.send_replace(ConnectionState::Connected);
        let _ = event_tx.send(ChannelEvent::Connected);

        let end = process_frames(conn, &cancel, &mut outbound_rx, &event_tx, &last_event_tx).await;

        match end {
            StreamEnd::NormalClosure | StreamEnd::Cancelled => {
                state_tx.send_replace(ConnectionState::Disconnected);
                let _ = event_tx.send(ChannelEvent::Closed);
                return;
            }
            StreamEnd::Abnormal => {
                if cancel.is_cancelled() {
                    state_tx.send_replace(ConnectionState::Disconnected);
                    return;
                }
                tracing::info!(
                    job_id = %client.job_id(),
                    "Channel lost; entering reconnect loop",
                );
                state_tx.send_replace(ConnectionState::Reconnecting);
                let _ = event_tx.send(ChannelEvent::Reconnecting);
                match reconnect_loop(&client, &backoff, &cancel).await {
                    ReconnectOutcome::Restored(restored) => {
                        conn = restored;
                    }
                    ReconnectOutcome::ExhaustedAttempts => {
                        state_tx.send_replace(ConnectionState::Disconnected);
                        let _ = event_tx.send(ChannelEvent::UpdatesUnavailable);
                        return;
                    }
                    ReconnectOutcome::Cancelled => {
                        state_tx.send_replace(ConnectionState::Disconnected);
                        return;
                    }
                }
            }
        }
    }
}

/// Read frames until the connection ends one way or another.
async fn process_frames(
    conn: ChannelConnection,
    cancel: &CancellationToken,
    outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    event_tx: &broadcast::Sender<ChannelEvent>,
    last_event_tx: &watch::Sender<Option<ProgressEvent>>,
) -> StreamEnd {
    let job_id = conn.job_id.clone();
    let connection_id = conn.connection_id.clone();
    let (mut sink, mut stream) = conn.ws_stream.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                // Deliberate close: code 1000 so the server knows not
                // to expect this client back.
                let _ = sink
                    .send(Message::Close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "client closed".into(),
                    })))
                    .await;
                return StreamEnd::Cancelled;
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(text) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            tracing::warn!(
                                job_id = %job_id,
                                error = %e,
                                "Failed to send outbound message",
                            );
                            return StreamEnd::Abnormal;
                        }
                    }
                    // Sender dropped: the manager has discarded this
                    // channel, so treat it like a cancellation.
                    None => return StreamEnd::Cancelled,
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    handle_text_frame(&text, &job_id, event_tx, last_event_tx);
                }
                Some(Ok(Message::Binary(_))) => {
                    tracing::trace!(job_id = %job_id, "Ignoring binary frame");
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    // Handled automatically by tungstenite.
                }
                Some(Ok(Message::Close(frame))) => {
                    let normal = frame
                        .as_ref()
                        .map(|f| f.code == CloseCode::Normal)
                        .unwrap_or(false);
                    tracing::info!(
                        job_id = %job_id,
                        connection_id = %connection_id,
                        ?frame,
                        "Channel closed by server",
                    );
                    return if normal {
                        StreamEnd::NormalClosure
                    } else {
                        StreamEnd::Abnormal
                    };
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    tracing::warn!(
                        job_id = %job_id,
                        connection_id = %connection_id,
                        error = %e,
                        "Channel receive error",
                    );
                    return StreamEnd::Abnormal;
                }
                None => {
                    tracing::info!(job_id = %job_id, "Channel stream ended");
                    return StreamEnd::Abnormal;
                }
            }
        }
    }
}

/// Decode one text frame and publish it.
///
/// A frame that fails to decode, or that carries a different job id,
/// is logged and dropped; the connection stays up either way.
fn handle_text_frame(
    text: &str,
    job_id: &str,
    event_tx: &broadcast::Sender<ChannelEvent>,
    last_event_tx: &watch::Sender<Option<ProgressEvent>>,
) {
    match parse_frame(text) {
        Ok(event) => {
            if event.job_id != job_id {
                tracing::warn!(
                    job_id = %job_id,
                    frame_job_id = %event.job_id,
                    "Frame for a different job on this channel; ignoring",
                );
                return;
            }
            tracing::debug!(
                job_id = %job_id,
                status = %event.status,
                percent = event.percent,
                step = %event.current_step,
                "Progress update",
            );
            last_event_tx.send_replace(Some(event.clone()));
            let _ = event_tx.send(ChannelEvent::Progress(event));
        }
        Err(e) => {
            tracing::warn!(
                job_id = %job_id,
                error = %e,
                raw_frame = %text,
                "Failed to parse progress frame",
            );
        }
    }
}
