//! # Basic Race Example
//!
//! Demonstrates a complete KeySprint client lifecycle:
//!
//! 1. Connect to a session server via WebSocket
//! 2. Join a room with an invite code and a display name
//! 3. React to room events (players joining, scores, host changes)
//! 4. Start the race when holding host privilege, then stream typed input
//! 5. Shut down gracefully on Ctrl+C or disconnect
//!
//! ## Running
//!
//! ```sh
//! # Start a KeySprint server on localhost:4820, then:
//! cargo run --example basic_race
//!
//! # Override the server URL or room:
//! KEYSPRINT_URL=ws://my-server:4820/ws KEYSPRINT_ROOM=my-room cargo run --example basic_race
//! ```

use keysprint_client::{
    protocol::generate_invite_code, KeySprintClient, KeySprintConfig, KeySprintEvent,
    WebSocketTransport,
};

/// Default server URL when `KEYSPRINT_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:4820/ws";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("KEYSPRINT_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    // Joining a fresh invite code creates the room; share the code with
    // friends so they can race you.
    let room = std::env::var("KEYSPRINT_ROOM").unwrap_or_else(|_| generate_invite_code());
    tracing::info!("Connecting to {url}, room {room}");

    // ── Connect ─────────────────────────────────────────────────────
    // Establish a WebSocket connection to the session server.
    let transport = WebSocketTransport::connect(&url).await?;

    // Start the client. This spawns a background task that drives the
    // transport, sends the join request, and emits events on `event_rx`.
    let config = KeySprintConfig::new(room.clone(), "RustRacer");
    let (mut client, mut event_rx) = KeySprintClient::start(transport, config);

    // ── Event loop ──────────────────────────────────────────────────
    // Use `tokio::select!` to listen for both server events and Ctrl+C.
    loop {
        tokio::select! {
            // Branch 1: Incoming event from the server (or transport layer).
            event = event_rx.recv() => {
                let Some(event) = event else {
                    // Channel closed — transport loop exited.
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    // ── Synthetic: transport connected ───────────────
                    KeySprintEvent::Connected => {
                        tracing::info!("Transport connected, join request sent");
                    }

                    // ── Roster ───────────────────────────────────────
                    KeySprintEvent::Roster { players } => {
                        tracing::info!("In room with {} player(s)", players.len());
                    }

                    KeySprintEvent::PlayerJoined { player } => {
                        tracing::info!("Player joined: {} ({})", player.name, player.id);
                    }

                    KeySprintEvent::PlayerLeft { player_id } => {
                        tracing::info!("Player left: {player_id}");
                    }

                    // ── Host & race lifecycle ────────────────────────
                    KeySprintEvent::HostChanged { player_id } => {
                        tracing::info!("Host is now {player_id}");

                        if client.is_host().await {
                            // Rejected if a race is already running; the
                            // server-confirmed phase decides, not us.
                            match client.start_race().await {
                                Ok(()) => tracing::info!("We are the host — start requested"),
                                Err(e) => tracing::warn!("Start not sent: {e}"),
                            }
                        }
                    }

                    KeySprintEvent::RaceStarted { paragraph } => {
                        tracing::info!("Race started! Paragraph: {paragraph}");

                        // A real frontend streams keystrokes; here we just
                        // transcribe the first word to show the flow.
                        let first_word = paragraph
                            .split_whitespace()
                            .next()
                            .unwrap_or_default()
                            .to_string();
                        client.type_input(first_word).await?;
                    }

                    KeySprintEvent::ScoreUpdated { player_id, score } => {
                        tracing::info!("Score: {player_id} → {score}");
                        for (rank, p) in client.leaderboard().await.iter().enumerate() {
                            tracing::info!("  #{} {} ({})", rank + 1, p.name, p.score);
                        }
                    }

                    KeySprintEvent::RaceFinished => {
                        tracing::info!("Race finished! Final standings:");
                        for (rank, p) in client.leaderboard().await.iter().enumerate() {
                            tracing::info!("  #{} {} ({})", rank + 1, p.name, p.score);
                        }
                    }

                    // ── Errors from the server ───────────────────────
                    KeySprintEvent::RoomInvalid => {
                        tracing::error!("Invite code rejected");
                        break;
                    }

                    KeySprintEvent::ServerError { message } => {
                        tracing::error!("Server error: {message}");
                    }

                    // ── Disconnect ───────────────────────────────────
                    KeySprintEvent::Disconnected { reason } => {
                        tracing::warn!("Disconnected: {}", reason.as_deref().unwrap_or("unknown"));
                        break;
                    }

                    // ── Catch-all ────────────────────────────────────
                    other => {
                        tracing::debug!("Event: {other:?}");
                    }
                }
            }

            // Branch 2: Ctrl+C — shut down gracefully.
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Client shut down. Goodbye!");
    Ok(())
}
