#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for KeySprint client integration tests.
//!
//! Provides a channel-based [`MockTransport`] and helper functions for
//! constructing common server event JSON strings.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use keysprint_client::protocol::{Player, PlayerId, ScoreUpdate, ServerEvent};
use keysprint_client::{KeySprintError, Transport};

// ── MockTransport ───────────────────────────────────────────────────

/// A channel-based mock transport for integration testing.
///
/// Scripted server responses are consumed in order by `recv()`.
/// All messages sent by the client are recorded in `sent`.
pub struct MockTransport {
    /// Scripted server responses (consumed in order by `recv`).
    incoming: VecDeque<Option<Result<String, KeySprintError>>>,
    /// Recorded outgoing messages from the client.
    pub sent: Arc<StdMutex<Vec<String>>>,
    /// Whether `close()` has been called.
    pub closed: Arc<AtomicBool>,
    /// Handshake-assigned connection id reported via `session_id()`.
    session_id: Option<PlayerId>,
}

impl MockTransport {
    /// Create a new mock transport with the given scripted incoming messages.
    ///
    /// Returns the transport plus shared handles for inspecting sent messages
    /// and whether close was called.
    pub fn new(
        incoming: Vec<Option<Result<String, KeySprintError>>>,
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

    /// Report `id` as the handshake-assigned connection id.
    #[must_use]
    pub fn with_session_id(mut self, id: &str) -> Self {
        self.session_id = Some(id.to_string());
        self
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), KeySprintError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, KeySprintError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            // No more scripted messages — hang forever so the transport loop
            // stays alive until shutdown is called.
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), KeySprintError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn session_id(&self) -> Option<PlayerId> {
        self.session_id.clone()
    }
}

// ── Fixture helpers ─────────────────────────────────────────────────

/// Build a [`Player`] with the given id, name, and score.
pub fn player(id: &str, name: &str, score: f64) -> Player {
    Player {
        id: id.into(),
        name: name.into(),
        score,
    }
}

/// Returns the JSON string for a `players` roster snapshot.
pub fn players_json(players: Vec<Player>) -> String {
    serde_json::to_string(&ServerEvent::Players(players)).expect("players_json serialization")
}

/// Returns the JSON string for a `player-joined` event.
pub fn player_joined_json(p: Player) -> String {
    serde_json::to_string(&ServerEvent::PlayerJoined(p)).expect("player_joined_json serialization")
}

/// Returns the JSON string for a `player-left` event.
pub fn player_left_json(id: &str) -> String {
    serde_json::to_string(&ServerEvent::PlayerLeft(id.into()))
        .expect("player_left_json serialization")
}

/// Returns the JSON string for a `player-score` event.
pub fn player_score_json(id: &str, score: f64) -> String {
    serde_json::to_string(&ServerEvent::PlayerScore(ScoreUpdate {
        id: id.into(),
        score,
    }))
    .expect("player_score_json serialization")
}

/// Returns the JSON string for a `game-started` event.
pub fn game_started_json(paragraph: &str) -> String {
    serde_json::to_string(&ServerEvent::GameStarted(paragraph.into()))
        .expect("game_started_json serialization")
}

/// Returns the JSON string for a `game-finished` event.
pub fn game_finished_json() -> String {
    serde_json::to_string(&ServerEvent::GameFinished).expect("game_finished_json serialization")
}

/// Returns the JSON string for a `new-host` event.
pub fn new_host_json(id: &str) -> String {
    serde_json::to_string(&ServerEvent::NewHost(id.into())).expect("new_host_json serialization")
}

/// Returns the JSON string for a server `error` event.
pub fn error_json(message: &str) -> String {
    serde_json::to_string(&ServerEvent::Error(message.into())).expect("error_json serialization")
}
