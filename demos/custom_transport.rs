//! # Custom Transport Example
//!
//! Shows how to implement the [`Transport`] trait with a simple in-process
//! loopback channel. This is useful for:
//!
//! - **Testing** — unit-test your race logic without a real server
//! - **Custom backends** — adapt any I/O layer (TCP, QUIC, WebRTC data channels)
//!
//! ## Running
//!
//! ```sh
//! cargo run --example custom_transport
//! ```

use async_trait::async_trait;
use keysprint_client::{
    KeySprintClient, KeySprintConfig, KeySprintError, KeySprintEvent, PlayerId, Transport,
};
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: Define a channel-based "loopback" transport
// ─────────────────────────────────────────────────────────────────────

/// A loopback transport that shuttles messages through in-process channels.
///
/// This transport consists of two halves:
/// - The **client half** (`LoopbackTransport`) implements [`Transport`] and is
///   handed to `KeySprintClient::start`.
/// - The **server half** (`LoopbackServer`) lets you inject responses and read
///   what the client sent — perfect for testing.
pub struct LoopbackTransport {
    /// Messages the client sends go here (server reads from the other end).
    tx: mpsc::UnboundedSender<String>,
    /// Messages the server sends arrive here (client reads them).
    rx: mpsc::UnboundedReceiver<String>,
    /// The connection id the "server" assigned during the fake handshake.
    session_id: PlayerId,
}

/// The "server side" of the loopback — use this to drive the conversation.
pub struct LoopbackServer {
    /// Read what the client sent.
    pub rx: mpsc::UnboundedReceiver<String>,
    /// Send messages to the client (as if they came from a server).
    pub tx: mpsc::UnboundedSender<String>,
}

/// Create a connected `(transport, server)` pair with the given session id.
fn loopback_pair(session_id: &str) -> (LoopbackTransport, LoopbackServer) {
    // Client → Server channel
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    // Server → Client channel
    let (server_tx, client_rx) = mpsc::unbounded_channel();

    let transport = LoopbackTransport {
        tx: client_tx,
        rx: client_rx,
        session_id: session_id.to_string(),
    };
    let server = LoopbackServer {
        rx: server_rx,
        tx: server_tx,
    };

    (transport, server)
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Implement the Transport trait
// ─────────────────────────────────────────────────────────────────────

#[async_trait]
impl Transport for LoopbackTransport {
    /// Send a JSON message to the "server" side of the loopback.
    async fn send(&mut self, message: String) -> Result<(), KeySprintError> {
        self.tx
            .send(message)
            .map_err(|e| KeySprintError::TransportSend(e.to_string()))
    }

    /// Receive the next message from the "server" side.
    ///
    /// Returns `None` when the server channel is closed — this is how the
    /// client discovers that the connection has ended.
    ///
    /// This method is **cancel-safe** because `mpsc::UnboundedReceiver::recv`
    /// is cancel-safe.
    async fn recv(&mut self) -> Option<Result<String, KeySprintError>> {
        self.rx.recv().await.map(Ok)
    }

    /// Close is a no-op for channels — dropping is sufficient.
    async fn close(&mut self) -> Result<(), KeySprintError> {
        Ok(())
    }

    /// The id the fake handshake assigned — this is what lets the client
    /// recognize itself as host.
    fn session_id(&self) -> Option<PlayerId> {
        Some(self.session_id.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Wire together the client and the fake server
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for readable output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Create the loopback pair; the fake server knows us as "local-1".
    let (transport, mut server) = loopback_pair("local-1");

    // Start the client — it will immediately send a join-game event
    // through the loopback.
    let config = KeySprintConfig::new("loopback-room", "Alice");
    let (mut client, mut event_rx) = KeySprintClient::start(transport, config);

    // ── Fake server: read the join event and respond ────────────────
    // The client auto-sends join-game on start.
    let Some(join_msg) = server.rx.recv().await else {
        return Err("server channel closed before join-game was received".into());
    };
    tracing::info!("Server received: {join_msg}");

    // Respond with a roster snapshot and make the client the host (the
    // JSON must match the wire format — adjacently-tagged:
    // {"event": "<name>", "data": …}).
    let roster = serde_json::json!({
        "event": "players",
        "data": [{"id": "local-1", "name": "Alice", "score": 0.0}]
    });
    server.tx.send(roster.to_string())?;
    server
        .tx
        .send(serde_json::json!({"event": "new-host", "data": "local-1"}).to_string())?;

    // ── Read events from the client ─────────────────────────────────
    // We expect Connected (synthetic), the roster, then the host change.
    while let Some(event) = event_rx.recv().await {
        match &event {
            KeySprintEvent::Connected => {
                tracing::info!("Event: Connected (synthetic)");
            }
            KeySprintEvent::Roster { players } => {
                tracing::info!("Event: Roster — {} player(s)", players.len());
            }
            KeySprintEvent::HostChanged { player_id } => {
                tracing::info!("Event: HostChanged — {player_id}");
                break;
            }
            other => {
                tracing::info!("Event: {other:?}");
            }
        }
    }

    // We are the host now, so starting the race is permitted.
    assert!(client.is_host().await);
    client.start_race().await?;
    let Some(start_msg) = server.rx.recv().await else {
        return Err("server channel closed before start-game was received".into());
    };
    tracing::info!("Server received: {start_msg}");

    // ── Clean shutdown ──────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Done — custom transport works!");
    Ok(())
}
