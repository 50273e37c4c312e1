//! Wire-compatible protocol types for the KeySprint room protocol.
//!
//! Every message is an adjacently tagged JSON object with the event name
//! under `"event"` and the payload (if any) under `"data"`:
//!
//! ```json
//! {"event":"player-score","data":{"id":"k7Qz","score":42.0}}
//! {"event":"game-finished"}
//! ```
//!
//! The kebab-case event names are the wire contract shared with the session
//! server — do not rename variants without a protocol version bump.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Type aliases ────────────────────────────────────────────────────

/// Opaque identifier for a participant's connection.
///
/// Assigned by the server during the transport handshake. Unique per active
/// connection and NOT stable across reconnects — a player who drops and
/// rejoins gets a fresh id.
pub type PlayerId = String;

// ── Enums ───────────────────────────────────────────────────────────

/// Lifecycle phase of a room.
///
/// The client observes phase transitions but never drives them directly:
/// the only phase-adjacent action it may take is requesting a start, and the
/// actual transition happens when the server broadcasts `game-started`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GamePhase {
    /// Waiting in the lobby for the host to start.
    #[default]
    NotStarted,
    /// A race is running; typing input is live.
    InProgress,
    /// The race ended; standings are final until the host restarts.
    Finished,
}

// ── Structs ─────────────────────────────────────────────────────────

/// One participant in a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Server-computed score. Never calculated locally — the server is the
    /// sole score authority.
    pub score: f64,
}

/// Payload of a `player-score` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    pub id: PlayerId,
    pub score: f64,
}

// ── Messages ────────────────────────────────────────────────────────

/// Events sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Join a room (MUST be the first event on a new connection). The room
    /// is created implicitly if this is the first joiner.
    JoinGame { room_id: String, name: String },
    /// Ask the server to start the race. Only honored for the current host;
    /// the resulting phase change arrives as `game-started`.
    StartGame,
    /// The local transcription buffer changed. Carries the full buffer, not
    /// a delta — the server diffs against the paragraph itself.
    PlayerTyped(String),
    /// Announce departure from the room.
    Leave,
}

/// Events sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Full roster snapshot, sent once after joining.
    Players(Vec<Player>),
    /// Another player joined the room.
    PlayerJoined(Player),
    /// A player left the room.
    PlayerLeft(PlayerId),
    /// A player's score changed.
    PlayerScore(ScoreUpdate),
    /// The race started; carries the paragraph to transcribe.
    GameStarted(String),
    /// The race ended.
    GameFinished,
    /// Host privilege was reassigned. The client treats this as opaque —
    /// it never participates in or second-guesses the election.
    NewHost(PlayerId),
    /// The invite code was accepted; carries the room id.
    Verified(String),
    /// The invite code was rejected.
    Invalid,
    /// Server-reported error. Forwarded to the consumer verbatim; never
    /// mutates room state.
    Error(String),
}

// ── Invite codes ────────────────────────────────────────────────────

/// Generate a fresh invite code for creating a room.
///
/// Rooms are created implicitly by their first joiner, so "creating" a game
/// is just joining a code nobody else holds yet. Codes are random v4 UUIDs
/// rendered as strings; uniqueness within the server's lifetime is the
/// server's concern, not checked here.
pub fn generate_invite_code() -> String {
    Uuid::new_v4().to_string()
}
