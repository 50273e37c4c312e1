//! Room state machine for a single typing-race session.
//!
//! [`RoomState`] is the client's authoritative view of one room: the roster,
//! the current host, the race phase, the shared paragraph, and the local
//! transcription buffer. It is pure and synchronous — all I/O lives in the
//! transport loop, which feeds inbound [`ServerEvent`]s through
//! [`RoomState::apply`] one at a time. Because exactly one loop owns the
//! state, reconciliation rules never run concurrently.
//!
//! Reconciliation is strictly event-sourced: local actions (start, typing)
//! only *request* — every state transition is confirmed by the matching
//! inbound event. [`RoomState`] therefore has no "start" method; the phase
//! changes when `game-started` arrives, never before.

use tracing::{debug, warn};

use crate::protocol::{GamePhase, Player, PlayerId, ServerEvent};

/// Client-side view of one room membership.
///
/// Created once per membership; never reused across rooms or rejoins.
#[derive(Debug, Clone, Default)]
pub struct RoomState {
    /// The local participant's connection id, if the transport handshake
    /// supplied one. Without it the host guard can never pass.
    local_id: Option<PlayerId>,
    /// Roster in arrival order. Arrival order is what breaks leaderboard
    /// ties, so it is preserved here and sorting stays a derived view.
    players: Vec<Player>,
    /// Current host, or `None` before the first `new-host` event. May go
    /// stale if the host leaves — only an explicit reassignment replaces it.
    host: Option<PlayerId>,
    phase: GamePhase,
    /// The paragraph to transcribe. Empty until a race starts; retained
    /// through `finished` for display.
    paragraph: String,
    /// The local transcription buffer. Only writable while in progress.
    input: String,
}

impl RoomState {
    /// Create an empty room view with no local identity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty room view for the given local connection id.
    pub fn with_local_id(local_id: impl Into<PlayerId>) -> Self {
        Self {
            local_id: Some(local_id.into()),
            ..Self::default()
        }
    }

    /// Record the local connection id once the transport handshake yields it.
    pub fn set_local_id(&mut self, local_id: impl Into<PlayerId>) {
        self.local_id = Some(local_id.into());
    }

    // ── Reconciliation ──────────────────────────────────────────────

    /// Apply one inbound server event to the room view.
    ///
    /// Every rule is idempotent-safe: duplicate joins, leaves for unknown
    /// ids, score updates for departed players, and replayed phase
    /// transitions are all absorbed without corrupting state.
    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::Players(players) => {
                // The snapshot is the initial roster handshake. Once a race
                // is underway the incremental events are authoritative, so a
                // late or replayed snapshot must not clobber them.
                if self.phase == GamePhase::NotStarted {
                    debug!(count = players.len(), "roster snapshot received");
                    self.players = players.clone();
                } else {
                    warn!(phase = ?self.phase, "ignoring roster snapshot outside lobby");
                }
            }
            ServerEvent::PlayerJoined(player) => {
                if self.players.iter().any(|p| p.id == player.id) {
                    warn!(id = %player.id, "duplicate player-joined ignored");
                } else {
                    debug!(id = %player.id, name = %player.name, "player joined");
                    self.players.push(player.clone());
                }
            }
            ServerEvent::PlayerLeft(id) => {
                let before = self.players.len();
                self.players.retain(|p| p.id != *id);
                if self.players.len() == before {
                    debug!(id = %id, "player-left for unknown id ignored");
                }
                // The host id is deliberately left untouched even if the
                // host just departed: reassignment only ever arrives as an
                // explicit new-host event.
            }
            ServerEvent::PlayerScore(update) => {
                match self.players.iter_mut().find(|p| p.id == update.id) {
                    Some(player) => player.score = update.score,
                    // A score racing a departure must not resurrect the player.
                    None => debug!(id = %update.id, "score for unknown id ignored"),
                }
            }
            ServerEvent::GameStarted(paragraph) => {
                if self.phase == GamePhase::InProgress {
                    // A duplicate or retried start must not erase the
                    // in-flight buffer.
                    warn!("game-started while already in progress, ignored");
                } else {
                    debug!("race started");
                    self.paragraph = paragraph.clone();
                    self.input.clear();
                    self.phase = GamePhase::InProgress;
                }
            }
            ServerEvent::GameFinished => {
                if self.phase == GamePhase::InProgress {
                    debug!("race finished");
                    self.input.clear();
                    self.phase = GamePhase::Finished;
                } else {
                    warn!(phase = ?self.phase, "game-finished outside race, ignored");
                }
            }
            ServerEvent::NewHost(id) => {
                debug!(id = %id, "host reassigned");
                self.host = Some(id.clone());
            }
            // Pass-through events: surfaced to the consumer by the transport
            // loop, no room state to reconcile.
            ServerEvent::Error(message) => debug!(%message, "server error (no state change)"),
            ServerEvent::Verified(room_id) => debug!(%room_id, "invite code verified"),
            ServerEvent::Invalid => debug!("invite code rejected"),
        }
    }

    // ── Local input ─────────────────────────────────────────────────

    /// Store a new transcription buffer, if typing is currently live.
    ///
    /// Returns `true` when the buffer was accepted (phase is in-progress)
    /// and `false` when the keystroke is inert — the stored buffer is left
    /// unchanged outside a running race.
    pub fn set_input(&mut self, buffer: impl Into<String>) -> bool {
        if self.phase == GamePhase::InProgress {
            self.input = buffer.into();
            true
        } else {
            false
        }
    }

    // ── Guards ──────────────────────────────────────────────────────

    /// Whether the local participant may request a race start right now:
    /// the local id is known, matches the current host, and the room is not
    /// mid-race.
    pub fn start_permitted(&self) -> bool {
        match (&self.local_id, &self.host) {
            (Some(local), Some(host)) if local == host => {
                matches!(self.phase, GamePhase::NotStarted | GamePhase::Finished)
            }
            _ => false,
        }
    }

    /// Whether the local participant currently holds host privilege.
    pub fn is_host(&self) -> bool {
        match (&self.local_id, &self.host) {
            (Some(local), Some(host)) => local == host,
            _ => false,
        }
    }

    // ── Derived views & accessors ───────────────────────────────────

    /// The leaderboard: roster ordered by score descending, ties broken by
    /// arrival order.
    ///
    /// Recomputed on demand — never stored. The stable sort is what keeps
    /// equal-score players in the order they joined.
    pub fn leaderboard(&self) -> Vec<Player> {
        let mut standings = self.players.clone();
        standings.sort_by(|a, b| b.score.total_cmp(&a.score));
        standings
    }

    /// Current race phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Current host id, if one has been announced.
    pub fn host(&self) -> Option<&PlayerId> {
        self.host.as_ref()
    }

    /// The local participant's connection id, if known.
    pub fn local_id(&self) -> Option<&PlayerId> {
        self.local_id.as_ref()
    }

    /// Roster in arrival order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// The paragraph being transcribed (empty before the first race).
    pub fn paragraph(&self) -> &str {
        &self.paragraph
    }

    /// The local transcription buffer.
    pub fn input(&self) -> &str {
        &self.input
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
    use crate::protocol::ScoreUpdate;

    fn player(id: &str, name: &str, score: f64) -> Player {
        Player {
            id: id.into(),
            name: name.into(),
            score,
        }
    }

    fn started(room: &mut RoomState) {
        room.apply(&ServerEvent::GameStarted("the quick brown fox".into()));
        assert_eq!(room.phase(), GamePhase::InProgress);
    }

    // ── Roster reconciliation ───────────────────────────────────────

    #[test]
    fn snapshot_replaces_roster_wholesale() {
        let mut room = RoomState::new();
        room.apply(&ServerEvent::PlayerJoined(player("x", "Old", 5.0)));
        room.apply(&ServerEvent::Players(vec![
            player("a", "Alice", 0.0),
            player("b", "Bob", 0.0),
        ]));

        let ids: Vec<_> = room.players().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn snapshot_outside_lobby_is_ignored() {
        let mut room = RoomState::new();
        room.apply(&ServerEvent::PlayerJoined(player("a", "Alice", 10.0)));
        started(&mut room);

        room.apply(&ServerEvent::Players(vec![player("z", "Zoe", 0.0)]));
        assert_eq!(room.players().len(), 1);
        assert_eq!(room.players()[0].id, "a");
    }

    #[test]
    fn duplicate_join_leaves_roster_unchanged() {
        let mut room = RoomState::new();
        room.apply(&ServerEvent::PlayerJoined(player("a", "Alice", 0.0)));
        room.apply(&ServerEvent::PlayerJoined(player("a", "Alice", 0.0)));

        assert_eq!(room.players().len(), 1);
    }

    #[test]
    fn leave_for_absent_id_is_a_no_op() {
        let mut room = RoomState::new();
        room.apply(&ServerEvent::PlayerJoined(player("a", "Alice", 0.0)));
        room.apply(&ServerEvent::PlayerLeft("ghost".into()));

        assert_eq!(room.players().len(), 1);
    }

    #[test]
    fn leave_removes_exactly_the_named_player() {
        let mut room = RoomState::new();
        room.apply(&ServerEvent::Players(vec![
            player("a", "Alice", 0.0),
            player("b", "Bob", 0.0),
            player("c", "Cara", 0.0),
        ]));
        room.apply(&ServerEvent::PlayerLeft("b".into()));

        let ids: Vec<_> = room.players().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
    }

    #[test]
    fn score_overwrites_by_id() {
        let mut room = RoomState::new();
        room.apply(&ServerEvent::Players(vec![
            player("a", "Alice", 0.0),
            player("b", "Bob", 0.0),
        ]));
        room.apply(&ServerEvent::PlayerScore(ScoreUpdate {
            id: "a".into(),
            score: 40.0,
        }));

        assert_eq!(room.players()[0].score, 40.0);
        assert_eq!(room.players()[1].score, 0.0);
    }

    #[test]
    fn score_after_leave_does_not_resurrect() {
        let mut room = RoomState::new();
        room.apply(&ServerEvent::Players(vec![player("a", "Alice", 0.0)]));
        room.apply(&ServerEvent::PlayerLeft("a".into()));
        room.apply(&ServerEvent::PlayerScore(ScoreUpdate {
            id: "a".into(),
            score: 99.0,
        }));

        assert!(room.players().is_empty());
    }

    // ── Phase transitions ───────────────────────────────────────────

    #[test]
    fn game_started_sets_paragraph_and_clears_input() {
        let mut room = RoomState::new();
        room.apply(&ServerEvent::GameStarted("the quick brown fox".into()));

        assert_eq!(room.phase(), GamePhase::InProgress);
        assert_eq!(room.paragraph(), "the quick brown fox");
        assert_eq!(room.input(), "");
    }

    #[test]
    fn duplicate_game_started_preserves_in_flight_input() {
        let mut room = RoomState::new();
        started(&mut room);
        assert!(room.set_input("the qu"));

        room.apply(&ServerEvent::GameStarted("a different paragraph".into()));

        assert_eq!(room.phase(), GamePhase::InProgress);
        assert_eq!(room.input(), "the qu");
        assert_eq!(room.paragraph(), "the quick brown fox");
    }

    #[test]
    fn game_finished_clears_input_and_retains_paragraph() {
        let mut room = RoomState::new();
        started(&mut room);
        room.set_input("the quick");
        room.apply(&ServerEvent::GameFinished);

        assert_eq!(room.phase(), GamePhase::Finished);
        assert_eq!(room.input(), "");
        assert_eq!(room.paragraph(), "the quick brown fox");
    }

    #[test]
    fn game_finished_outside_race_is_ignored() {
        let mut room = RoomState::new();
        room.apply(&ServerEvent::GameFinished);
        assert_eq!(room.phase(), GamePhase::NotStarted);
    }

    #[test]
    fn restart_from_finished_begins_a_fresh_race() {
        let mut room = RoomState::new();
        started(&mut room);
        room.apply(&ServerEvent::GameFinished);
        room.apply(&ServerEvent::GameStarted("second paragraph".into()));

        assert_eq!(room.phase(), GamePhase::InProgress);
        assert_eq!(room.paragraph(), "second paragraph");
        assert_eq!(room.input(), "");
    }

    // ── Input gating ────────────────────────────────────────────────

    #[test]
    fn input_rejected_before_start() {
        let mut room = RoomState::new();
        assert!(!room.set_input("early"));
        assert_eq!(room.input(), "");
    }

    #[test]
    fn input_accepted_while_in_progress() {
        let mut room = RoomState::new();
        started(&mut room);
        assert!(room.set_input("the"));
        assert_eq!(room.input(), "the");
    }

    #[test]
    fn input_inert_after_finish() {
        let mut room = RoomState::new();
        started(&mut room);
        room.set_input("the quick");
        room.apply(&ServerEvent::GameFinished);

        assert!(!room.set_input("too late"));
        assert_eq!(room.input(), "");
    }

    // ── Host & start guard ──────────────────────────────────────────

    #[test]
    fn host_reassignment_fully_replaces() {
        let mut room = RoomState::new();
        room.apply(&ServerEvent::NewHost("a".into()));
        room.apply(&ServerEvent::NewHost("b".into()));
        assert_eq!(room.host().map(String::as_str), Some("b"));
    }

    #[test]
    fn start_permitted_only_for_host_in_startable_phase() {
        let mut room = RoomState::with_local_id("a");
        assert!(!room.start_permitted()); // no host announced yet

        room.apply(&ServerEvent::NewHost("a".into()));
        assert!(room.start_permitted()); // not-started

        started(&mut room);
        assert!(!room.start_permitted()); // in-progress

        room.apply(&ServerEvent::GameFinished);
        assert!(room.start_permitted()); // finished — host may restart
    }

    #[test]
    fn start_denied_without_local_identity() {
        let mut room = RoomState::new();
        room.apply(&ServerEvent::NewHost("a".into()));
        assert!(!room.start_permitted());
    }

    #[test]
    fn start_denied_for_non_host() {
        let mut room = RoomState::with_local_id("b");
        room.apply(&ServerEvent::NewHost("a".into()));
        assert!(!room.start_permitted());
    }

    #[test]
    fn losing_host_revokes_start_immediately() {
        let mut room = RoomState::with_local_id("a");
        room.apply(&ServerEvent::NewHost("a".into()));
        assert!(room.start_permitted());

        room.apply(&ServerEvent::NewHost("b".into()));
        assert!(!room.start_permitted());
        assert_eq!(room.players().len(), 0); // no roster change involved
    }

    #[test]
    fn host_survives_its_own_departure_until_reassigned() {
        let mut room = RoomState::new();
        room.apply(&ServerEvent::Players(vec![player("a", "Alice", 0.0)]));
        room.apply(&ServerEvent::NewHost("a".into()));
        room.apply(&ServerEvent::PlayerLeft("a".into()));

        // Stale by design: vacancy is never inferred from roster removal.
        assert_eq!(room.host().map(String::as_str), Some("a"));

        room.apply(&ServerEvent::NewHost("b".into()));
        assert_eq!(room.host().map(String::as_str), Some("b"));
    }

    #[test]
    fn becoming_host_mid_race_does_not_unlock_start() {
        let mut room = RoomState::with_local_id("a");
        started(&mut room);
        room.apply(&ServerEvent::NewHost("a".into()));

        assert!(!room.start_permitted()); // gated until the race ends
        assert!(room.set_input("typing still works"));

        room.apply(&ServerEvent::GameFinished);
        assert!(room.start_permitted());
    }

    // ── Leaderboard ─────────────────────────────────────────────────

    #[test]
    fn leaderboard_sorts_by_score_descending() {
        let mut room = RoomState::new();
        room.apply(&ServerEvent::Players(vec![
            player("a", "Alice", 10.0),
            player("b", "Bob", 30.0),
            player("c", "Cara", 20.0),
        ]));

        let names: Vec<_> = room.leaderboard().iter().map(|p| p.name.clone()).collect();
        assert_eq!(names, ["Bob", "Cara", "Alice"]);
    }

    #[test]
    fn leaderboard_ties_keep_arrival_order() {
        let mut room = RoomState::new();
        room.apply(&ServerEvent::Players(vec![player("a", "Alice", 0.0)]));
        room.apply(&ServerEvent::PlayerJoined(player("b", "Bob", 0.0)));

        let names: Vec<_> = room.leaderboard().iter().map(|p| p.name.clone()).collect();
        assert_eq!(names, ["Alice", "Bob"]);
    }

    #[test]
    fn leaderboard_reorders_after_score_update() {
        let mut room = RoomState::new();
        room.apply(&ServerEvent::Players(vec![
            player("a", "Alice", 0.0),
            player("b", "Bob", 0.0),
        ]));
        room.apply(&ServerEvent::PlayerScore(ScoreUpdate {
            id: "b".into(),
            score: 40.0,
        }));

        let names: Vec<_> = room.leaderboard().iter().map(|p| p.name.clone()).collect();
        assert_eq!(names, ["Bob", "Alice"]);
        // Roster itself keeps arrival order — the leaderboard is a view.
        assert_eq!(room.players()[0].name, "Alice");
    }

    // ── Pass-through events ─────────────────────────────────────────

    #[test]
    fn error_event_mutates_nothing() {
        let mut room = RoomState::with_local_id("a");
        room.apply(&ServerEvent::Players(vec![player("a", "Alice", 5.0)]));
        room.apply(&ServerEvent::NewHost("a".into()));
        let before = room.clone();

        room.apply(&ServerEvent::Error("room is full".into()));

        assert_eq!(room.players(), before.players());
        assert_eq!(room.host(), before.host());
        assert_eq!(room.phase(), before.phase());
    }
}
