//! # KeySprint Client
//!
//! Transport-agnostic Rust client for the KeySprint multiplayer typing-race
//! protocol.
//!
//! This crate provides a high-level async client that joins one shared race
//! room on a KeySprint session server, reconciles the server's event stream
//! into a consistent local view (roster, live standings, host, race phase,
//! shared paragraph), and propagates local typing input upstream.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement the [`Transport`] trait for any backend
//! - **Event-sourced** — local actions only request; every state transition
//!   is confirmed by an inbound server event
//! - **WebSocket built-in** — default `transport-websocket` feature provides
//!   `WebSocketTransport`
//! - **Event-driven** — receive typed [`KeySprintEvent`]s via a channel
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keysprint_client::{KeySprintClient, KeySprintConfig, WebSocketTransport};
//!
//! let transport = WebSocketTransport::connect("ws://localhost:4820/ws").await?;
//! let config = KeySprintConfig::new("4f2c…-invite", "Alice");
//! let (client, mut events) = KeySprintClient::start(transport, config);
//!
//! while let Some(event) = events.recv().await {
//!     // react to roster, race, and host changes…
//! }
//! ```

pub mod client;
pub mod error;
pub mod event;
pub mod protocol;
pub mod room;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::{KeySprintClient, KeySprintConfig};
pub use error::KeySprintError;
pub use event::KeySprintEvent;
pub use protocol::{ClientEvent, GamePhase, Player, PlayerId, ServerEvent};
pub use room::RoomState;
pub use transport::Transport;

#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
