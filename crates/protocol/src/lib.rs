//! vncgate handshake protocol.
//!
//! A small stand-in for the remote-display protocol's security handshake:
//! the server sends a random challenge, the client answers with a response
//! derived from its password, and the server reports whether the session
//! is admitted and at which tier.

use serde::{Deserialize, Serialize};

pub mod challenge;
pub mod codec;
pub mod handshake;

pub use challenge::Challenge;
pub use handshake::{HandshakeError, connect, serve};

/// Current protocol version.
pub const PROTOCOL_VERSION: &str = "0.1";

/// Messages sent by the client to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Answer to [`ServerMessage::Challenge`].
    Response {
        /// Response bytes.
        response: Vec<u8>,
    },
    /// Keepalive after admission.
    Ping,
}

/// Messages sent by the server to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Opens the handshake.
    Challenge {
        /// Protocol version.
        version: String,
        /// Per-session nonce.
        nonce: Vec<u8>,
    },
    /// The response was accepted.
    Admitted {
        /// Input events from this session are ignored.
        view_only: bool,
    },
    /// The response was rejected. Carries no detail.
    Denied,
    /// Keepalive reply.
    Pong,
}
