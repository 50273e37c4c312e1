//! Typed events delivered to the client consumer.
//!
//! The background transport loop converts every inbound [`ServerEvent`] into
//! a [`KeySprintEvent`] and forwards it on the channel returned by
//! [`KeySprintClient::start`](crate::client::KeySprintClient::start), after
//! reconciling it into the shared room state. Two variants are synthetic
//! (produced by the loop itself, not the server): [`Connected`] when the
//! loop begins and [`Disconnected`] as the guaranteed final event.
//!
//! [`Connected`]: KeySprintEvent::Connected
//! [`Disconnected`]: KeySprintEvent::Disconnected

use crate::protocol::{Player, PlayerId, ServerEvent};

/// Events emitted by a [`KeySprintClient`](crate::client::KeySprintClient).
#[derive(Debug, Clone, PartialEq)]
pub enum KeySprintEvent {
    /// The transport loop started (synthetic; always first).
    Connected,
    /// Full roster snapshot received after joining.
    Roster { players: Vec<Player> },
    /// Another player joined the room.
    PlayerJoined { player: Player },
    /// A player left the room.
    PlayerLeft { player_id: PlayerId },
    /// A player's score changed; the leaderboard view should be re-read.
    ScoreUpdated { player_id: PlayerId, score: f64 },
    /// The race started with the paragraph to transcribe.
    RaceStarted { paragraph: String },
    /// The race ended; standings are final.
    RaceFinished,
    /// Host privilege was reassigned.
    HostChanged { player_id: PlayerId },
    /// The invite code was accepted for the given room.
    RoomVerified { room_id: String },
    /// The invite code was rejected.
    RoomInvalid,
    /// Server-reported error, surfaced verbatim for notification display.
    ServerError { message: String },
    /// The transport closed (synthetic; always last, never dropped).
    Disconnected { reason: Option<String> },
}

impl From<ServerEvent> for KeySprintEvent {
    fn from(event: ServerEvent) -> Self {
        match event {
            ServerEvent::Players(players) => Self::Roster { players },
            ServerEvent::PlayerJoined(player) => Self::PlayerJoined { player },
            ServerEvent::PlayerLeft(player_id) => Self::PlayerLeft { player_id },
            ServerEvent::PlayerScore(update) => Self::ScoreUpdated {
                player_id: update.id,
                score: update.score,
            },
            ServerEvent::GameStarted(paragraph) => Self::RaceStarted { paragraph },
            ServerEvent::GameFinished => Self::RaceFinished,
            ServerEvent::NewHost(player_id) => Self::HostChanged { player_id },
            ServerEvent::Verified(room_id) => Self::RoomVerified { room_id },
            ServerEvent::Invalid => Self::RoomInvalid,
            ServerEvent::Error(message) => Self::ServerError { message },
        }
    }
}
