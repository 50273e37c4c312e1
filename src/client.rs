//! Async client for the KeySprint room protocol.
//!
//! [`KeySprintClient`] is a thin handle that communicates with a background
//! transport loop task via an unbounded MPSC channel. Events are emitted on a
//! bounded channel ([`tokio::sync::mpsc::Receiver<KeySprintEvent>`]) returned
//! from [`KeySprintClient::start`].
//!
//! The loop owns the room state machine: every inbound event is reconciled
//! into the shared [`RoomState`] before being forwarded, so by the time the
//! consumer sees an event the accessors already reflect it. Outbound actions
//! are validated against that same state — the handle never mutates phase or
//! scores itself, it only requests.
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = connect_somehow().await;
//! let config = KeySprintConfig::new("4f2c…-invite", "Alice");
//! let (client, mut events) = KeySprintClient::start(transport, config);
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         KeySprintEvent::RaceStarted { paragraph } => { /* … */ }
//!         KeySprintEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use crate::error::{KeySprintError, Result};
use crate::event::KeySprintEvent;
use crate::protocol::{ClientEvent, GamePhase, Player, PlayerId, ServerEvent};
use crate::room::RoomState;
use crate::transport::Transport;

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`KeySprintClient`] session.
///
/// Must be supplied to [`KeySprintClient::start`]. The required fields are
/// the invite code of the room and the local display name; both must be
/// non-empty (the name-entry flow upstream is expected to enforce this —
/// the client sends them as-is).
///
/// # Example
///
/// ```
/// use keysprint_client::client::KeySprintConfig;
///
/// let config = KeySprintConfig::new("4f2c-invite", "Alice");
/// assert_eq!(config.room_id, "4f2c-invite");
/// assert_eq!(config.player_name, "Alice");
/// ```
///
/// # Tuning
///
/// ```
/// use keysprint_client::client::KeySprintConfig;
/// use std::time::Duration;
///
/// let config = KeySprintConfig::new("4f2c-invite", "Alice")
///     .with_event_channel_capacity(512)
///     .with_shutdown_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct KeySprintConfig {
    /// Invite code of the room to join. Joining an unused code creates the
    /// room implicitly (see [`generate_invite_code`](crate::protocol::generate_invite_code)).
    pub room_id: String,
    /// Display name shown in the roster and leaderboard.
    pub player_name: String,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up with incoming server events, events
    /// are dropped (with a warning logged) to avoid blocking the transport
    /// loop. The `Disconnected` event is always delivered regardless of
    /// capacity.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Timeout for the graceful shutdown.
    ///
    /// When [`KeySprintClient::shutdown`] is called, the background transport
    /// loop is given this much time to announce departure, close the
    /// transport, and emit a final `Disconnected` event. If the timeout
    /// expires the task is aborted.
    ///
    /// Defaults to **1 second**. A zero timeout aborts the transport loop
    /// immediately without waiting for graceful shutdown.
    pub shutdown_timeout: Duration,
}

impl KeySprintConfig {
    /// Create a new configuration for the given room and display name.
    pub fn new(room_id: impl Into<String>, player_name: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            player_name: player_name.into(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the capacity of the bounded event channel.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    ///
    /// Defaults to **1 second**. A zero timeout aborts the transport loop
    /// immediately without waiting for graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// Internal shared state between the client handle and the transport loop.
struct ClientShared {
    connected: AtomicBool,
    /// Whether the departure notice has been sent. Guarantees `leave` goes
    /// out at most once across explicit calls and teardown.
    departed: AtomicBool,
    /// The room state machine. Reconciled only by the transport loop; read
    /// (and input-gated) by the handle.
    room: Mutex<RoomState>,
}

impl ClientShared {
    fn new(room: RoomState) -> Self {
        Self {
            connected: AtomicBool::new(true),
            departed: AtomicBool::new(false),
            room: Mutex::new(room),
        }
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Async client handle for one KeySprint room membership.
///
/// Created via [`KeySprintClient::start`], which spawns a background
/// transport loop and returns this handle together with an event receiver.
///
/// One handle corresponds to exactly one room membership. It is not reusable
/// across rejoins — reconnecting means constructing a new transport and a
/// new client.
pub struct KeySprintClient {
    /// Sender half of the command channel to the transport loop.
    cmd_tx: mpsc::UnboundedSender<ClientEvent>,
    /// Shared state updated by the transport loop.
    shared: Arc<ClientShared>,
    /// Invite code of the joined room.
    room_id: String,
    /// Handle to the background transport loop task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to signal the transport loop to shut down gracefully.
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    /// Timeout for the graceful shutdown.
    shutdown_timeout: Duration,
}

impl KeySprintClient {
    /// Start the client transport loop and return a handle plus event receiver.
    ///
    /// The transport loop immediately sends a [`JoinGame`](ClientEvent::JoinGame)
    /// event carrying the room id and player name from the provided
    /// [`KeySprintConfig`]. Join is sent exactly once and never retried — a
    /// rejected join surfaces as a later inbound `error` event.
    ///
    /// The local participant's identity is read from
    /// [`Transport::session_id`] before the loop starts; if the transport
    /// does not know its id, the client can never hold host privilege.
    ///
    /// # Returns
    ///
    /// A tuple of `(client_handle, event_receiver)`. The event receiver
    /// yields [`KeySprintEvent`]s until the transport closes or the client
    /// shuts down.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        config: KeySprintConfig,
    ) -> (Self, mpsc::Receiver<KeySprintEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientEvent>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<KeySprintEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let room = match transport.session_id() {
            Some(id) => RoomState::with_local_id(id),
            None => RoomState::new(),
        };
        let shared = Arc::new(ClientShared::new(room));
        let loop_shared = Arc::clone(&shared);

        // Send the JoinGame event through the command channel so the
        // transport loop picks it up as the very first outgoing message.
        let join = ClientEvent::JoinGame {
            room_id: config.room_id.clone(),
            name: config.player_name,
        };
        // This cannot fail because we just created the channel.
        let _ = cmd_tx.send(join);

        let task = tokio::spawn(transport_loop(
            transport,
            cmd_rx,
            event_tx,
            loop_shared,
            shutdown_rx,
        ));

        let client = Self {
            cmd_tx,
            shared,
            room_id: config.room_id,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (client, event_rx)
    }

    // ── Public API methods ──────────────────────────────────────────

    /// Request a race start.
    ///
    /// Allowed only while the local participant is the current host and the
    /// room is not mid-race. The request performs **no** local state change —
    /// the phase transitions when (and only when) the server broadcasts
    /// `game-started`, so a dropped or rejected request leaves the room
    /// exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns [`KeySprintError::StartNotPermitted`] if the host/phase guard
    /// fails, or [`KeySprintError::NotConnected`] if the transport has closed.
    pub async fn start_race(&self) -> Result<()> {
        if !self.shared.connected.load(Ordering::Acquire) {
            return Err(KeySprintError::NotConnected);
        }
        if !self.shared.room.lock().await.start_permitted() {
            return Err(KeySprintError::StartNotPermitted);
        }
        self.send(ClientEvent::StartGame)
    }

    /// Report a change to the local transcription buffer.
    ///
    /// Carries the full buffer, not a delta. Accepted only while a race is
    /// in progress; outside of one the keystroke is inert — `Ok(false)` is
    /// returned and neither the stored buffer nor the wire sees it.
    ///
    /// # Errors
    ///
    /// Returns [`KeySprintError::NotConnected`] if the transport has closed.
    pub async fn type_input(&self, buffer: impl Into<String>) -> Result<bool> {
        if !self.shared.connected.load(Ordering::Acquire) {
            return Err(KeySprintError::NotConnected);
        }
        let buffer = buffer.into();
        if !self.shared.room.lock().await.set_input(buffer.clone()) {
            return Ok(false);
        }
        self.send(ClientEvent::PlayerTyped(buffer))?;
        Ok(true)
    }

    /// Announce departure from the room.
    ///
    /// Best-effort, sent at most once: if the departure notice has already
    /// gone out (explicitly or during teardown) this is a no-op. Does not
    /// close the transport — call [`shutdown`](Self::shutdown) for that.
    ///
    /// # Errors
    ///
    /// Returns [`KeySprintError::NotConnected`] if the transport has closed.
    pub fn leave(&self) -> Result<()> {
        if self.shared.departed.load(Ordering::Acquire) {
            return Ok(());
        }
        self.send(ClientEvent::Leave)
    }

    /// Shut down the client, closing the transport and stopping the
    /// background task.
    ///
    /// Teardown is total: the loop announces departure (if not already
    /// announced), closes the transport, and emits a final `Disconnected`
    /// event, after which the event receiver yields `None`. Safe to call
    /// more than once.
    pub async fn shutdown(&mut self) {
        debug!("KeySprintClient: shutdown requested");

        // Signal the transport loop to shut down gracefully.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Await the transport loop with a timeout. If it doesn't exit in time,
        // abort it so the task cannot detach and run indefinitely.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        self.shared.connected.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` if the transport is believed to be connected.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// The invite code of the room this client joined.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Current race phase.
    pub async fn phase(&self) -> GamePhase {
        self.shared.room.lock().await.phase()
    }

    /// Current host id, if one has been announced.
    pub async fn host(&self) -> Option<PlayerId> {
        self.shared.room.lock().await.host().cloned()
    }

    /// Whether the local participant currently holds host privilege.
    pub async fn is_host(&self) -> bool {
        self.shared.room.lock().await.is_host()
    }

    /// The local participant's connection id, if the transport supplied one.
    pub async fn local_player_id(&self) -> Option<PlayerId> {
        self.shared.room.lock().await.local_id().cloned()
    }

    /// The leaderboard: roster ordered by score descending, ties broken by
    /// arrival order. Recomputed on every call.
    pub async fn leaderboard(&self) -> Vec<Player> {
        self.shared.room.lock().await.leaderboard()
    }

    /// The paragraph being transcribed (empty before the first race).
    pub async fn paragraph(&self) -> String {
        self.shared.room.lock().await.paragraph().to_string()
    }

    /// The local transcription buffer.
    pub async fn local_input(&self) -> String {
        self.shared.room.lock().await.input().to_string()
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Queue a `ClientEvent` to the transport loop.
    fn send(&self, event: ClientEvent) -> Result<()> {
        if !self.shared.connected.load(Ordering::Acquire) {
            return Err(KeySprintError::NotConnected);
        }
        self.cmd_tx
            .send(event)
            .map_err(|_| KeySprintError::NotConnected)
    }
}

impl std::fmt::Debug for KeySprintClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySprintClient")
            .field("room_id", &self.room_id)
            .field("connected", &self.is_connected())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for KeySprintClient {
    fn drop(&mut self) {
        // `Drop` is synchronous so we cannot await a graceful shutdown.
        // The only safe action is to abort the spawned task, which causes
        // the transport loop future to be dropped immediately.  The
        // `shutdown_tx` oneshot is intentionally *not* sent here: sending
        // it would trigger a graceful path that calls async `transport.close()`,
        // but there is no executor context to drive it inside `Drop`.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// Background transport loop that multiplexes send/receive via `tokio::select!`.
///
/// The single place where inbound events are reconciled into the room state,
/// in strict arrival order — no two reconciliation rules ever run
/// concurrently.
///
/// Exits when:
/// - The command channel closes (client handle dropped or shutdown called)
/// - The transport returns `None` (server closed connection)
/// - A transport error occurs
async fn transport_loop(
    mut transport: impl Transport,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientEvent>,
    event_tx: mpsc::Sender<KeySprintEvent>,
    shared: Arc<ClientShared>,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    debug!("transport loop started");

    // Emit the synthetic Connected event before entering the select loop.
    emit_event(&event_tx, KeySprintEvent::Connected).await;

    loop {
        tokio::select! {
            // Branch 1: outgoing event from the client handle
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(event) => {
                        if matches!(event, ClientEvent::Leave) {
                            shared.departed.store(true, Ordering::Release);
                        }
                        debug!("sending client event: {:?}", std::mem::discriminant(&event));
                        match serde_json::to_string(&event) {
                            Ok(json) => {
                                if let Err(e) = transport.send(json).await {
                                    error!("transport send error: {e}");
                                    emit_disconnected(
                                        &event_tx,
                                        &shared,
                                        Some(format!("transport send error: {e}")),
                                    ).await;
                                    break;
                                }
                            }
                            Err(e) => {
                                error!("failed to serialize ClientEvent: {e}");
                                // Serialization errors are programming bugs; don't kill the loop.
                            }
                        }
                    }
                    // Command channel closed — client handle dropped.
                    None => {
                        debug!("command channel closed, shutting down transport loop");
                        depart_and_close(&mut transport, &shared).await;
                        emit_disconnected(&event_tx, &shared, Some("client shut down".into())).await;
                        break;
                    }
                }
            }

            // Branch 2: shutdown signal
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                depart_and_close(&mut transport, &shared).await;
                emit_disconnected(&event_tx, &shared, Some("client shut down".into())).await;
                break;
            }

            // Branch 3: incoming event from the server
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(server_event) => {
                                // Reconcile into the room state first, then
                                // forward — consumers reading accessors after
                                // an event always see it applied.
                                shared.room.lock().await.apply(&server_event);
                                emit_event(&event_tx, KeySprintEvent::from(server_event)).await;
                            }
                            Err(e) => {
                                warn!("failed to deserialize server event: {e} — raw: {text}");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        emit_disconnected(
                            &event_tx,
                            &shared,
                            Some(format!("transport receive error: {e}")),
                        ).await;
                        break;
                    }
                    // Transport closed cleanly.
                    None => {
                        debug!("transport closed by server");
                        emit_disconnected(&event_tx, &shared, None).await;
                        break;
                    }
                }
            }
        }
    }

    debug!("transport loop exited");
}

/// Graceful teardown: announce departure (at most once, best-effort) and
/// close the transport.
async fn depart_and_close(transport: &mut impl Transport, shared: &ClientShared) {
    if !shared.departed.swap(true, Ordering::AcqRel) {
        match serde_json::to_string(&ClientEvent::Leave) {
            Ok(json) => {
                // Best-effort: a failed departure notice must not block teardown.
                if let Err(e) = transport.send(json).await {
                    debug!("departure notice not delivered: {e}");
                }
            }
            Err(e) => error!("failed to serialize Leave event: {e}"),
        }
    }
    let _ = transport.close().await;
}

/// Emit an event to the event channel. If the channel is full, log a warning
/// and drop the event to avoid blocking the transport loop.
async fn emit_event(event_tx: &mpsc::Sender<KeySprintEvent>, event: KeySprintEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "event channel full, dropping event: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit a [`Disconnected`](KeySprintEvent::Disconnected) event and update state.
///
/// Uses `send().await` (blocking) instead of `try_send` because `Disconnected`
/// is always the last event on the channel and must never be silently dropped.
async fn emit_disconnected(
    event_tx: &mpsc::Sender<KeySprintEvent>,
    shared: &ClientShared,
    reason: Option<String>,
) {
    shared.connected.store(false, Ordering::Release);
    let event = KeySprintEvent::Disconnected { reason };
    if event_tx.send(event).await.is_err() {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::{Player, ScoreUpdate};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport ──────────────────────────────────────────────

    /// A mock transport that records sent messages and replays scripted responses.
    struct MockTransport {
        /// Messages that `recv()` will yield in order.
        incoming: VecDeque<Option<std::result::Result<String, KeySprintError>>>,
        /// Recorded outgoing messages.
        sent: Arc<StdMutex<Vec<String>>>,
        /// Whether `close()` was called.
        closed: Arc<AtomicBool>,
        /// Handshake-assigned connection id, if any.
        session_id: Option<PlayerId>,
    }

    impl MockTransport {
        fn new(
            incoming: Vec<Option<std::result::Result<String, KeySprintError>>>,
        ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let transport = Self {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
                session_id: None,
            };
            (transport, sent, closed)
        }

        fn with_session_id(mut self, id: &str) -> Self {
            self.session_id = Some(id.to_string());
            self
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), KeySprintError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, KeySprintError>> {
            if let Some(item) = self.incoming.pop_front() {
                // An explicit `None` entry signals a clean transport close;
                // `Some(result)` delivers the scripted message or error.
                item
            } else {
                // All scripted messages have been delivered — hang forever
                // so the transport loop stays alive until shutdown.
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), KeySprintError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }

        fn session_id(&self) -> Option<PlayerId> {
            self.session_id.clone()
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn players_json(players: Vec<Player>) -> String {
        serde_json::to_string(&ServerEvent::Players(players)).unwrap()
    }

    fn new_host_json(id: &str) -> String {
        serde_json::to_string(&ServerEvent::NewHost(id.into())).unwrap()
    }

    fn game_started_json(paragraph: &str) -> String {
        serde_json::to_string(&ServerEvent::GameStarted(paragraph.into())).unwrap()
    }

    fn game_finished_json() -> String {
        serde_json::to_string(&ServerEvent::GameFinished).unwrap()
    }

    fn player(id: &str, name: &str, score: f64) -> Player {
        Player {
            id: id.into(),
            name: name.into(),
            score,
        }
    }

    fn test_config() -> KeySprintConfig {
        KeySprintConfig::new("room-1", "Alice")
    }

    /// Receive events until `pred` matches, panicking if the channel closes.
    async fn recv_until(
        events: &mut mpsc::Receiver<KeySprintEvent>,
        pred: impl Fn(&KeySprintEvent) -> bool,
    ) -> KeySprintEvent {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn start_sends_join_game_first() {
        let (transport, sent, _closed) = MockTransport::new(vec![Some(Ok(players_json(vec![])))]);

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());

        // First event should be Connected.
        let event = events.recv().await.unwrap();
        assert!(matches!(event, KeySprintEvent::Connected));

        // Wait for the roster snapshot so the join has definitely been sent.
        recv_until(&mut events, |e| matches!(e, KeySprintEvent::Roster { .. })).await;

        {
            let messages = sent.lock().unwrap();
            assert!(!messages.is_empty());
            let first: ClientEvent = serde_json::from_str(&messages[0]).unwrap();
            if let ClientEvent::JoinGame { room_id, name } = first {
                assert_eq!(room_id, "room-1");
                assert_eq!(name, "Alice");
            } else {
                panic!("expected JoinGame as first message, got {first:?}");
            }
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn roster_snapshot_reflected_in_leaderboard() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(players_json(vec![
            player("a", "Alice", 0.0),
            player("b", "Bob", 0.0),
        ])))]);

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());
        recv_until(&mut events, |e| matches!(e, KeySprintEvent::Roster { .. })).await;

        let names: Vec<_> = client
            .leaderboard()
            .await
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["Alice", "Bob"]);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn game_started_updates_phase_and_paragraph() {
        let (transport, _sent, _closed) =
            MockTransport::new(vec![Some(Ok(game_started_json("the quick brown fox")))]);

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());
        recv_until(&mut events, |e| {
            matches!(e, KeySprintEvent::RaceStarted { .. })
        })
        .await;

        assert_eq!(client.phase().await, GamePhase::InProgress);
        assert_eq!(client.paragraph().await, "the quick brown fox");
        assert_eq!(client.local_input().await, "");

        client.shutdown().await;
    }

    #[tokio::test]
    async fn start_race_denied_for_non_host() {
        let (transport, sent, _closed) =
            MockTransport::new(vec![Some(Ok(new_host_json("someone-else")))]);
        let transport = transport.with_session_id("me");

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());
        recv_until(&mut events, |e| {
            matches!(e, KeySprintEvent::HostChanged { .. })
        })
        .await;

        let result = client.start_race().await;
        assert!(matches!(result, Err(KeySprintError::StartNotPermitted)));

        // Nothing besides the join should have gone out.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sent.lock().unwrap().len(), 1);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn start_race_denied_without_session_id() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(new_host_json("me")))]);

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());
        recv_until(&mut events, |e| {
            matches!(e, KeySprintEvent::HostChanged { .. })
        })
        .await;

        let result = client.start_race().await;
        assert!(matches!(result, Err(KeySprintError::StartNotPermitted)));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn start_race_as_host_sends_start_game_without_phase_change() {
        let (transport, sent, _closed) = MockTransport::new(vec![Some(Ok(new_host_json("me")))]);
        let transport = transport.with_session_id("me");

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());
        recv_until(&mut events, |e| {
            matches!(e, KeySprintEvent::HostChanged { .. })
        })
        .await;

        client.start_race().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let last: ClientEvent = serde_json::from_str(messages.last().unwrap()).unwrap();
            assert!(matches!(last, ClientEvent::StartGame));
        }

        // No optimistic transition: the phase only moves on inbound game-started.
        assert_eq!(client.phase().await, GamePhase::NotStarted);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn start_race_denied_mid_race() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok(new_host_json("me"))),
            Some(Ok(game_started_json("fox"))),
        ]);
        let transport = transport.with_session_id("me");

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());
        recv_until(&mut events, |e| {
            matches!(e, KeySprintEvent::RaceStarted { .. })
        })
        .await;

        let result = client.start_race().await;
        assert!(matches!(result, Err(KeySprintError::StartNotPermitted)));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn type_input_before_start_is_inert() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());
        let _ = events.recv().await; // Connected

        let accepted = client.type_input("early").await.unwrap();
        assert!(!accepted);
        assert_eq!(client.local_input().await, "");

        tokio::time::sleep(Duration::from_millis(50)).await;
        // Only the join went out.
        assert_eq!(sent.lock().unwrap().len(), 1);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn type_input_during_race_sends_full_buffer() {
        let (transport, sent, _closed) =
            MockTransport::new(vec![Some(Ok(game_started_json("the quick brown fox")))]);

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());
        recv_until(&mut events, |e| {
            matches!(e, KeySprintEvent::RaceStarted { .. })
        })
        .await;

        assert!(client.type_input("the").await.unwrap());
        assert!(client.type_input("the qu").await.unwrap());
        assert_eq!(client.local_input().await, "the qu");

        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let last: ClientEvent = serde_json::from_str(messages.last().unwrap()).unwrap();
            if let ClientEvent::PlayerTyped(buffer) = last {
                assert_eq!(buffer, "the qu");
            } else {
                panic!("expected PlayerTyped, got {last:?}");
            }
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn typing_goes_inert_after_finish() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok(game_started_json("fox"))),
            Some(Ok(game_finished_json())),
        ]);

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());
        recv_until(&mut events, |e| matches!(e, KeySprintEvent::RaceFinished)).await;

        assert_eq!(client.phase().await, GamePhase::Finished);
        let accepted = client.type_input("too late").await.unwrap();
        assert!(!accepted);
        assert_eq!(client.local_input().await, "");

        client.shutdown().await;
    }

    #[tokio::test]
    async fn score_update_reorders_leaderboard() {
        let score_json = serde_json::to_string(&ServerEvent::PlayerScore(ScoreUpdate {
            id: "b".into(),
            score: 40.0,
        }))
        .unwrap();
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok(players_json(vec![
                player("a", "Alice", 0.0),
                player("b", "Bob", 0.0),
            ]))),
            Some(Ok(score_json)),
        ]);

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());
        recv_until(&mut events, |e| {
            matches!(e, KeySprintEvent::ScoreUpdated { .. })
        })
        .await;

        let names: Vec<_> = client
            .leaderboard()
            .await
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["Bob", "Alice"]);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn server_error_is_forwarded_without_state_change() {
        let error_json = serde_json::to_string(&ServerEvent::Error("room is full".into())).unwrap();
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(error_json))]);

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());
        let event = recv_until(&mut events, |e| {
            matches!(e, KeySprintEvent::ServerError { .. })
        })
        .await;

        if let KeySprintEvent::ServerError { message } = event {
            assert_eq!(message, "room is full");
        }
        assert_eq!(client.phase().await, GamePhase::NotStarted);
        assert!(client.leaderboard().await.is_empty());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_server_message_is_skipped() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok("{not json".into())),
            Some(Ok(game_started_json("fox"))),
        ]);

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());
        // The malformed line is dropped; the next event still arrives.
        recv_until(&mut events, |e| {
            matches!(e, KeySprintEvent::RaceStarted { .. })
        })
        .await;

        client.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_sends_leave_and_emits_disconnected() {
        let (transport, sent, closed) = MockTransport::new(vec![]);

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());
        let _ = events.recv().await; // Connected

        client.shutdown().await;

        let event = events.recv().await.unwrap();
        assert!(matches!(event, KeySprintEvent::Disconnected { .. }));
        if let KeySprintEvent::Disconnected { reason } = event {
            assert_eq!(reason.as_deref(), Some("client shut down"));
        }

        {
            let messages = sent.lock().unwrap();
            let last: ClientEvent = serde_json::from_str(messages.last().unwrap()).unwrap();
            assert!(matches!(last, ClientEvent::Leave));
        }
        assert!(closed.load(Ordering::Relaxed));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn explicit_leave_is_not_repeated_on_shutdown() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());
        let _ = events.recv().await; // Connected

        client.leave().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        client.shutdown().await;
        let _ = events.recv().await; // Disconnected

        let leaves = sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                matches!(
                    serde_json::from_str::<ClientEvent>(m),
                    Ok(ClientEvent::Leave)
                )
            })
            .count();
        assert_eq!(leaves, 1, "departure notice must go out exactly once");
    }

    #[tokio::test]
    async fn disconnected_on_transport_close() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok(players_json(vec![]))),
            // Explicit None signals clean transport close.
            None,
        ]);

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Roster
        let event = events.recv().await.unwrap(); // Disconnected
        assert!(matches!(event, KeySprintEvent::Disconnected { .. }));

        assert!(!client.is_connected());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn transport_recv_error_emits_disconnected() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Err(
            KeySprintError::TransportReceive("boom".into()),
        ))]);

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());

        let _ = events.recv().await; // Connected
        let event = events.recv().await.unwrap();
        assert!(matches!(event, KeySprintEvent::Disconnected { .. }));
        if let KeySprintEvent::Disconnected { reason } = event {
            assert!(reason.unwrap().contains("boom"));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn not_connected_error_after_shutdown() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());
        let _ = events.recv().await; // Connected

        client.shutdown().await;

        let result = client.start_race().await;
        assert!(matches!(result, Err(KeySprintError::NotConnected)));
        let result = client.type_input("x").await;
        assert!(matches!(result, Err(KeySprintError::NotConnected)));
    }

    #[tokio::test]
    async fn double_shutdown_does_not_panic() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());
        let _ = events.recv().await; // Connected

        client.shutdown().await;
        client.shutdown().await; // should not panic
    }

    #[tokio::test]
    async fn drop_without_explicit_shutdown() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);

        let (client, mut events) = KeySprintClient::start(transport, test_config());
        let _ = events.recv().await; // Connected

        // Drop the client without calling shutdown.
        drop(client);

        // The transport loop should eventually exit; the event channel
        // will close. We just verify we don't hang or panic.
        while let Some(_event) = events.recv().await {}
    }

    #[tokio::test]
    async fn config_defaults() {
        let config = test_config();
        assert_eq!(config.room_id, "room-1");
        assert_eq!(config.player_name, "Alice");
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn config_builder_methods() {
        let config = test_config()
            .with_event_channel_capacity(512)
            .with_shutdown_timeout(Duration::from_secs(5));
        assert_eq!(config.event_channel_capacity, 512);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn event_channel_capacity_is_clamped_to_one() {
        let config = test_config().with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[tokio::test]
    async fn zero_event_channel_capacity_does_not_panic() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);

        let config = test_config()
            .with_event_channel_capacity(0)
            .with_shutdown_timeout(Duration::from_millis(50));
        let (mut client, mut events) = KeySprintClient::start(transport, config);

        // Should not panic despite capacity 0 — clamped to 1.
        let event = events.recv().await.unwrap();
        assert!(matches!(event, KeySprintEvent::Connected));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn small_event_channel_capacity_triggers_backpressure() {
        // Use a capacity of 1 and send many score updates — events should be dropped.
        let mut incoming: Vec<Option<std::result::Result<String, KeySprintError>>> = Vec::new();
        incoming.push(Some(Ok(players_json(vec![player("a", "Alice", 0.0)]))));
        for i in 0..20 {
            let score_json = serde_json::to_string(&ServerEvent::PlayerScore(ScoreUpdate {
                id: "a".into(),
                score: i as f64,
            }))
            .unwrap();
            incoming.push(Some(Ok(score_json)));
        }
        incoming.push(None);

        let (transport, _sent, _closed) = MockTransport::new(incoming);

        let config = test_config().with_event_channel_capacity(1);
        let (mut client, mut events) = KeySprintClient::start(transport, config);

        // Let the channel fill up and events get dropped.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut count = 0;
        while let Some(_event) = events.recv().await {
            count += 1;
        }
        // At minimum we get Connected (first try_send succeeds) and Disconnected
        // (always delivered via blocking send().await). Intermediate events may
        // be dropped when the single-slot channel is full.
        assert!(count >= 2, "expected at least 2 events, got {count}");
        // But fewer than the total sent (2 synthetic + 1 roster + 20 scores = 23 possible).
        assert!(
            count < 23,
            "expected backpressure to drop some events, but got all {count}"
        );

        // Even with dropped events the room state saw every message.
        assert_eq!(client.leaderboard().await[0].score, 19.0);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);

        let (mut client, mut events) = KeySprintClient::start(transport, test_config());
        let _ = events.recv().await; // Connected

        let debug_str = format!("{:?}", client);
        assert!(debug_str.contains("KeySprintClient"));
        assert!(debug_str.contains("room-1"));

        client.shutdown().await;
    }

    /// Transport that hangs forever in `close()` so shutdown timeout/abort can be tested.
    struct HangingCloseTransport {
        close_called: Arc<AtomicBool>,
        dropped: Arc<AtomicBool>,
    }

    impl HangingCloseTransport {
        fn new() -> (Self, Arc<AtomicBool>, Arc<AtomicBool>) {
            let close_called = Arc::new(AtomicBool::new(false));
            let dropped = Arc::new(AtomicBool::new(false));
            (
                Self {
                    close_called: Arc::clone(&close_called),
                    dropped: Arc::clone(&dropped),
                },
                close_called,
                dropped,
            )
        }
    }

    impl Drop for HangingCloseTransport {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::Release);
        }
    }

    #[async_trait]
    impl Transport for HangingCloseTransport {
        async fn send(&mut self, _message: String) -> std::result::Result<(), KeySprintError> {
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, KeySprintError>> {
            std::future::pending().await
        }

        async fn close(&mut self) -> std::result::Result<(), KeySprintError> {
            self.close_called.store(true, Ordering::Release);
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn shutdown_timeout_aborts_stuck_transport_task() {
        let (transport, close_called, dropped) = HangingCloseTransport::new();
        let config = test_config().with_shutdown_timeout(Duration::from_millis(20));
        let (mut client, mut events) = KeySprintClient::start(transport, config);

        // Drain Connected so the channel remains uncongested.
        let event = events.recv().await.unwrap();
        assert!(matches!(event, KeySprintEvent::Connected));

        client.shutdown().await;

        assert!(
            close_called.load(Ordering::Acquire),
            "transport.close() should have been attempted during graceful shutdown"
        );
        assert!(
            dropped.load(Ordering::Acquire),
            "timed-out shutdown should abort and drop the transport loop task"
        );
        assert!(!client.is_connected());
    }
}
