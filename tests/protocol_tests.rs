#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire-contract tests for the KeySprint protocol types.
//!
//! The kebab-case event names under `"event"` and the payload shapes under
//! `"data"` are shared with the session server — these tests pin the exact
//! JSON so an accidental rename or field change fails loudly.

use keysprint_client::protocol::{
    generate_invite_code, ClientEvent, GamePhase, Player, ScoreUpdate, ServerEvent,
};
use serde_json::json;

fn player(id: &str, name: &str, score: f64) -> Player {
    Player {
        id: id.into(),
        name: name.into(),
        score,
    }
}

// ════════════════════════════════════════════════════════════════════
// ClientEvent wire shapes (4 variants)
// ════════════════════════════════════════════════════════════════════

#[test]
fn join_game_wire_shape() {
    let event = ClientEvent::JoinGame {
        room_id: "race-1".into(),
        name: "Alice".into(),
    };
    let value = serde_json::to_value(&event).expect("serialize");
    assert_eq!(
        value,
        json!({"event": "join-game", "data": {"room_id": "race-1", "name": "Alice"}})
    );
}

#[test]
fn start_game_wire_shape() {
    let value = serde_json::to_value(ClientEvent::StartGame).expect("serialize");
    assert_eq!(value, json!({"event": "start-game"}));
}

#[test]
fn player_typed_carries_full_buffer() {
    let value = serde_json::to_value(ClientEvent::PlayerTyped("the quick".into())).expect("serialize");
    assert_eq!(value, json!({"event": "player-typed", "data": "the quick"}));
}

#[test]
fn leave_wire_shape() {
    let value = serde_json::to_value(ClientEvent::Leave).expect("serialize");
    assert_eq!(value, json!({"event": "leave"}));
}

// ════════════════════════════════════════════════════════════════════
// ServerEvent wire shapes (10 variants)
// ════════════════════════════════════════════════════════════════════

#[test]
fn players_snapshot_parses() {
    let raw = r#"{"event":"players","data":[{"id":"a","name":"Alice","score":0.0},{"id":"b","name":"Bob","score":12.5}]}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("deserialize");
    if let ServerEvent::Players(players) = event {
        assert_eq!(players, vec![player("a", "Alice", 0.0), player("b", "Bob", 12.5)]);
    } else {
        panic!("expected Players variant");
    }
}

#[test]
fn player_joined_parses() {
    let raw = r#"{"event":"player-joined","data":{"id":"c","name":"Cara","score":0.0}}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("deserialize");
    assert!(matches!(event, ServerEvent::PlayerJoined(p) if p == player("c", "Cara", 0.0)));
}

#[test]
fn player_left_carries_bare_id() {
    let raw = r#"{"event":"player-left","data":"c"}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("deserialize");
    assert!(matches!(event, ServerEvent::PlayerLeft(id) if id == "c"));
}

#[test]
fn player_score_parses() {
    let raw = r#"{"event":"player-score","data":{"id":"a","score":40.0}}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("deserialize");
    if let ServerEvent::PlayerScore(update) = event {
        assert_eq!(
            update,
            ScoreUpdate {
                id: "a".into(),
                score: 40.0
            }
        );
    } else {
        panic!("expected PlayerScore variant");
    }
}

#[test]
fn game_started_carries_paragraph() {
    let raw = r#"{"event":"game-started","data":"the quick brown fox"}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("deserialize");
    assert!(matches!(event, ServerEvent::GameStarted(p) if p == "the quick brown fox"));
}

#[test]
fn game_finished_has_no_payload() {
    let raw = r#"{"event":"game-finished"}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("deserialize");
    assert!(matches!(event, ServerEvent::GameFinished));
}

#[test]
fn new_host_carries_bare_id() {
    let raw = r#"{"event":"new-host","data":"b"}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("deserialize");
    assert!(matches!(event, ServerEvent::NewHost(id) if id == "b"));
}

#[test]
fn verified_carries_room_id() {
    let raw = r#"{"event":"verified","data":"race-1"}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("deserialize");
    assert!(matches!(event, ServerEvent::Verified(code) if code == "race-1"));
}

#[test]
fn invalid_has_no_payload() {
    let raw = r#"{"event":"invalid"}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("deserialize");
    assert!(matches!(event, ServerEvent::Invalid));
}

#[test]
fn error_carries_message_string() {
    let raw = r#"{"event":"error","data":"room is full"}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("deserialize");
    assert!(matches!(event, ServerEvent::Error(msg) if msg == "room is full"));
}

#[test]
fn unknown_event_name_is_rejected() {
    let raw = r#"{"event":"no-such-event","data":1}"#;
    assert!(serde_json::from_str::<ServerEvent>(raw).is_err());
}

// ════════════════════════════════════════════════════════════════════
// Supporting types
// ════════════════════════════════════════════════════════════════════

#[test]
fn game_phase_uses_kebab_case() {
    assert_eq!(
        serde_json::to_value(GamePhase::NotStarted).expect("serialize"),
        json!("not-started")
    );
    assert_eq!(
        serde_json::to_value(GamePhase::InProgress).expect("serialize"),
        json!("in-progress")
    );
    assert_eq!(
        serde_json::to_value(GamePhase::Finished).expect("serialize"),
        json!("finished")
    );
}

#[test]
fn game_phase_defaults_to_not_started() {
    assert_eq!(GamePhase::default(), GamePhase::NotStarted);
}

#[test]
fn player_wire_shape() {
    let value = serde_json::to_value(player("a", "Alice", 42.5)).expect("serialize");
    assert_eq!(value, json!({"id": "a", "name": "Alice", "score": 42.5}));
}

// ════════════════════════════════════════════════════════════════════
// Invite codes
// ════════════════════════════════════════════════════════════════════

#[test]
fn invite_codes_are_nonempty_and_distinct() {
    let a = generate_invite_code();
    let b = generate_invite_code();
    assert!(!a.is_empty());
    assert_ne!(a, b);
}

#[test]
fn invite_code_is_usable_in_join_game() {
    let code = generate_invite_code();
    let event = ClientEvent::JoinGame {
        room_id: code.clone(),
        name: "Alice".into(),
    };
    let json = serde_json::to_string(&event).expect("serialize");
    let back: ClientEvent = serde_json::from_str(&json).expect("deserialize");
    assert!(matches!(back, ClientEvent::JoinGame { room_id, .. } if room_id == code));
}
