#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration tests driving [`KeySprintClient`] through full session
//! transcripts over a scripted mock transport: joining, racing, scoring,
//! host churn, and teardown.

mod common;

use common::{
    error_json, game_finished_json, game_started_json, new_host_json, player, player_joined_json,
    player_left_json, player_score_json, players_json, MockTransport,
};
use keysprint_client::{
    ClientEvent, GamePhase, KeySprintClient, KeySprintConfig, KeySprintError, KeySprintEvent,
};
use std::time::Duration;

fn config() -> KeySprintConfig {
    KeySprintConfig::new("race-room-1", "Alice")
}

/// Receive events until `pred` matches, panicking if the channel closes first.
async fn recv_until(
    events: &mut tokio::sync::mpsc::Receiver<KeySprintEvent>,
    pred: impl Fn(&KeySprintEvent) -> bool,
) -> KeySprintEvent {
    loop {
        let event = events.recv().await.expect("event channel closed");
        if pred(&event) {
            return event;
        }
    }
}

// ── Session transcripts ─────────────────────────────────────────────

/// Snapshot then an incremental join: leaderboard keeps arrival order on ties.
#[tokio::test]
async fn roster_builds_from_snapshot_and_joins() {
    let (transport, _sent, _closed) = MockTransport::new(vec![
        Some(Ok(players_json(vec![player("a", "Alice", 0.0)]))),
        Some(Ok(player_joined_json(player("b", "Bob", 0.0)))),
    ]);

    let (mut client, mut events) = KeySprintClient::start(transport, config());
    recv_until(&mut events, |e| {
        matches!(e, KeySprintEvent::PlayerJoined { .. })
    })
    .await;

    let standings = client.leaderboard().await;
    let names: Vec<_> = standings.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Alice", "Bob"]);

    client.shutdown().await;
}

/// The host starts a race; the phase changes only when the server confirms.
#[tokio::test]
async fn host_start_confirmed_by_game_started() {
    let (transport, sent, _closed) = MockTransport::new(vec![
        Some(Ok(players_json(vec![player("a", "Alice", 0.0)]))),
        Some(Ok(new_host_json("a"))),
        Some(Ok(game_started_json("the quick brown fox"))),
    ]);
    let transport = transport.with_session_id("a");

    let (mut client, mut events) = KeySprintClient::start(transport, config());
    recv_until(&mut events, |e| {
        matches!(e, KeySprintEvent::HostChanged { .. })
    })
    .await;

    assert!(client.is_host().await);
    client.start_race().await.unwrap();

    let event = recv_until(&mut events, |e| {
        matches!(e, KeySprintEvent::RaceStarted { .. })
    })
    .await;
    if let KeySprintEvent::RaceStarted { paragraph } = event {
        assert_eq!(paragraph, "the quick brown fox");
    }

    assert_eq!(client.phase().await, GamePhase::InProgress);
    assert_eq!(client.paragraph().await, "the quick brown fox");
    assert_eq!(client.local_input().await, "");

    tokio::time::sleep(Duration::from_millis(50)).await;
    let start_requests = sent
        .lock()
        .unwrap()
        .iter()
        .filter(|m| {
            matches!(
                serde_json::from_str::<ClientEvent>(m),
                Ok(ClientEvent::StartGame)
            )
        })
        .count();
    assert_eq!(start_requests, 1);

    client.shutdown().await;
}

/// Typing mid-race emits the full buffer; score updates reorder standings.
#[tokio::test]
async fn typing_and_scoring_during_race() {
    let (transport, sent, _closed) = MockTransport::new(vec![
        Some(Ok(players_json(vec![
            player("a", "Alice", 0.0),
            player("b", "Bob", 0.0),
        ]))),
        Some(Ok(game_started_json("the quick brown fox"))),
        Some(Ok(player_score_json("a", 40.0))),
    ]);
    let transport = transport.with_session_id("a");

    let (mut client, mut events) = KeySprintClient::start(transport, config());
    recv_until(&mut events, |e| {
        matches!(e, KeySprintEvent::RaceStarted { .. })
    })
    .await;

    assert!(client.type_input("the").await.unwrap());

    recv_until(&mut events, |e| {
        matches!(e, KeySprintEvent::ScoreUpdated { .. })
    })
    .await;

    let standings = client.leaderboard().await;
    assert_eq!(standings[0].name, "Alice");
    assert_eq!(standings[0].score, 40.0);

    tokio::time::sleep(Duration::from_millis(50)).await;
    {
        let messages = sent.lock().unwrap();
        let typed: Vec<String> = messages
            .iter()
            .filter_map(|m| match serde_json::from_str::<ClientEvent>(m) {
                Ok(ClientEvent::PlayerTyped(buffer)) => Some(buffer),
                _ => None,
            })
            .collect();
        assert_eq!(typed, ["the"]);
    }

    client.shutdown().await;
}

/// After game-finished the buffer clears and further typing is inert.
#[tokio::test]
async fn finish_clears_input_and_disables_typing() {
    let (transport, sent, _closed) = MockTransport::new(vec![
        Some(Ok(game_started_json("the quick brown fox"))),
        Some(Ok(game_finished_json())),
    ]);

    let (mut client, mut events) = KeySprintClient::start(transport, config());
    recv_until(&mut events, |e| matches!(e, KeySprintEvent::RaceFinished)).await;

    assert_eq!(client.phase().await, GamePhase::Finished);
    assert_eq!(client.local_input().await, "");
    // Paragraph is retained for display after the race ends.
    assert_eq!(client.paragraph().await, "the quick brown fox");

    assert!(!client.type_input("too late").await.unwrap());
    assert_eq!(client.local_input().await, "");

    tokio::time::sleep(Duration::from_millis(50)).await;
    let typed = sent
        .lock()
        .unwrap()
        .iter()
        .filter(|m| {
            matches!(
                serde_json::from_str::<ClientEvent>(m),
                Ok(ClientEvent::PlayerTyped(_))
            )
        })
        .count();
    assert_eq!(typed, 0);

    client.shutdown().await;
}

/// Losing the host role mid-lobby revokes start eligibility immediately.
#[tokio::test]
async fn host_reassignment_revokes_start() {
    let (transport, _sent, _closed) = MockTransport::new(vec![
        Some(Ok(new_host_json("a"))),
        Some(Ok(new_host_json("b"))),
    ]);
    let transport = transport.with_session_id("a");

    let (mut client, mut events) = KeySprintClient::start(transport, config());
    recv_until(&mut events, |e| {
        matches!(e, KeySprintEvent::HostChanged { player_id } if player_id == "b")
    })
    .await;

    assert!(!client.is_host().await);
    let result = client.start_race().await;
    assert!(matches!(result, Err(KeySprintError::StartNotPermitted)));

    client.shutdown().await;
}

/// The host leaving does not vacate the host id until the server reassigns.
#[tokio::test]
async fn host_stays_stale_after_departure() {
    let (transport, _sent, _closed) = MockTransport::new(vec![
        Some(Ok(players_json(vec![
            player("a", "Alice", 0.0),
            player("b", "Bob", 0.0),
        ]))),
        Some(Ok(new_host_json("a"))),
        Some(Ok(player_left_json("a"))),
    ]);
    let transport = transport.with_session_id("b");

    let (mut client, mut events) = KeySprintClient::start(transport, config());
    recv_until(&mut events, |e| {
        matches!(e, KeySprintEvent::PlayerLeft { .. })
    })
    .await;

    // Roster lost the host, but the host id is unchanged until new-host.
    assert_eq!(client.leaderboard().await.len(), 1);
    assert_eq!(client.host().await.as_deref(), Some("a"));
    assert!(!client.is_host().await);

    client.shutdown().await;
}

/// A score racing a departure neither errors nor resurrects the player.
#[tokio::test]
async fn score_for_departed_player_is_dropped() {
    let (transport, _sent, _closed) = MockTransport::new(vec![
        Some(Ok(players_json(vec![
            player("a", "Alice", 0.0),
            player("b", "Bob", 0.0),
        ]))),
        Some(Ok(player_left_json("b"))),
        Some(Ok(player_score_json("b", 55.0))),
        Some(Ok(player_score_json("a", 10.0))),
    ]);

    let (mut client, mut events) = KeySprintClient::start(transport, config());
    recv_until(&mut events, |e| {
        matches!(e, KeySprintEvent::ScoreUpdated { player_id, .. } if player_id == "a")
    })
    .await;

    let standings = client.leaderboard().await;
    assert_eq!(standings.len(), 1);
    assert_eq!(standings[0].name, "Alice");
    assert_eq!(standings[0].score, 10.0);

    client.shutdown().await;
}

/// A full race cycle: lobby → race → finish → host restarts fresh.
#[tokio::test]
async fn restart_cycle_resets_buffer_and_paragraph() {
    let (transport, _sent, _closed) = MockTransport::new(vec![
        Some(Ok(new_host_json("a"))),
        Some(Ok(game_started_json("first paragraph"))),
        Some(Ok(game_finished_json())),
        Some(Ok(game_started_json("second paragraph"))),
    ]);
    let transport = transport.with_session_id("a");

    let (mut client, mut events) = KeySprintClient::start(transport, config());

    recv_until(&mut events, |e| {
        matches!(e, KeySprintEvent::RaceStarted { paragraph } if paragraph == "first paragraph")
    })
    .await;
    assert!(client.type_input("fir").await.unwrap());

    recv_until(&mut events, |e| matches!(e, KeySprintEvent::RaceFinished)).await;
    assert!(client.start_race().await.is_ok());

    recv_until(&mut events, |e| {
        matches!(e, KeySprintEvent::RaceStarted { paragraph } if paragraph == "second paragraph")
    })
    .await;

    assert_eq!(client.phase().await, GamePhase::InProgress);
    assert_eq!(client.paragraph().await, "second paragraph");
    assert_eq!(client.local_input().await, "");

    client.shutdown().await;
}

/// Server errors reach the consumer verbatim and leave the room untouched.
#[tokio::test]
async fn server_error_only_notifies() {
    let (transport, _sent, _closed) = MockTransport::new(vec![
        Some(Ok(players_json(vec![player("a", "Alice", 7.0)]))),
        Some(Ok(error_json("name already taken"))),
    ]);

    let (mut client, mut events) = KeySprintClient::start(transport, config());
    let event = recv_until(&mut events, |e| {
        matches!(e, KeySprintEvent::ServerError { .. })
    })
    .await;

    assert_eq!(
        event,
        KeySprintEvent::ServerError {
            message: "name already taken".into()
        }
    );
    assert_eq!(client.leaderboard().await.len(), 1);
    assert_eq!(client.phase().await, GamePhase::NotStarted);

    client.shutdown().await;
}

// ── Teardown discipline ─────────────────────────────────────────────

/// Teardown sends join … leave in order and closes the transport.
#[tokio::test]
async fn teardown_is_total_and_ordered() {
    let (transport, sent, closed) = MockTransport::new(vec![]);

    let (mut client, mut events) = KeySprintClient::start(transport, config());
    let _ = events.recv().await; // Connected

    client.shutdown().await;

    let event = events.recv().await.unwrap();
    assert!(matches!(event, KeySprintEvent::Disconnected { .. }));
    // The channel ends after Disconnected.
    assert!(events.recv().await.is_none());

    {
        let messages = sent.lock().unwrap();
        let first: ClientEvent = serde_json::from_str(&messages[0]).unwrap();
        assert!(matches!(first, ClientEvent::JoinGame { .. }));
        let last: ClientEvent = serde_json::from_str(messages.last().unwrap()).unwrap();
        assert!(matches!(last, ClientEvent::Leave));
    }
    assert!(closed.load(std::sync::atomic::Ordering::Relaxed));
}

/// A server-side close mid-session still delivers Disconnected as the final event.
#[tokio::test]
async fn server_close_ends_event_stream() {
    let (transport, _sent, _closed) = MockTransport::new(vec![
        Some(Ok(players_json(vec![player("a", "Alice", 0.0)]))),
        None,
    ]);

    let (mut client, mut events) = KeySprintClient::start(transport, config());

    recv_until(&mut events, |e| {
        matches!(e, KeySprintEvent::Disconnected { .. })
    })
    .await;
    assert!(!client.is_connected());

    // Further actions report NotConnected rather than panicking or hanging.
    let result = client.start_race().await;
    assert!(matches!(result, Err(KeySprintError::NotConnected)));

    client.shutdown().await;
}
