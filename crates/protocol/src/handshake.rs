//! Server and client sides of the handshake.

use crate::{
    Challenge, ClientMessage, PROTOCOL_VERSION, ServerMessage,
    codec::{self, FrameError},
};
use auth::{AuthDecision, Authenticator, Tier};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Handshake failure. The peer gets no detail beyond the closed socket.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// Framing or transport failure.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// The peer did not answer in time.
    #[error("handshake timed out")]
    Timeout,
    /// The peer sent something other than the expected message.
    #[error("unexpected {0} during handshake")]
    Unexpected(&'static str),
}

/// Run the server side: challenge the peer, hand its response to `gate`,
/// and report the decision back.
pub async fn serve<S, A>(
    stream: &mut S,
    gate: &A,
    timeout: Duration,
) -> Result<AuthDecision, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    A: Authenticator,
{
    let exchange = async {
        let challenge = Challenge::random();
        codec::write_message(
            stream,
            &ServerMessage::Challenge {
                version: PROTOCOL_VERSION.to_owned(),
                nonce: challenge.nonce().to_vec(),
            },
        )
        .await?;

        let message: ClientMessage = codec::read_message(stream).await?;
        let response = match message {
            ClientMessage::Response { response } => response,
            ClientMessage::Ping => return Err(HandshakeError::Unexpected("ping")),
        };

        let decision = gate.authenticate(&challenge, &response);
        let reply = match decision.tier {
            Some(tier) if decision.is_accepted() => ServerMessage::Admitted {
                view_only: tier == Tier::ViewOnly,
            },
            _ => ServerMessage::Denied,
        };
        codec::write_message(stream, &reply).await?;
        Ok::<_, HandshakeError>(decision)
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| HandshakeError::Timeout)?
}

/// Run the client side with `password`.
pub async fn connect<S>(stream: &mut S, password: &[u8]) -> Result<AuthDecision, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let opening: ServerMessage = codec::read_message(stream).await?;
    let challenge = match opening {
        ServerMessage::Challenge { nonce, .. } => Challenge::from_nonce(&nonce)
            .ok_or(HandshakeError::Unexpected("nonce length"))?,
        _ => return Err(HandshakeError::Unexpected("message before challenge")),
    };

    let response = challenge.respond(password);
    codec::write_message(stream, &ClientMessage::Response { response }).await?;

    let reply: ServerMessage = codec::read_message(stream).await?;
    match reply {
        ServerMessage::Admitted { view_only: false } => Ok(AuthDecision::accept(Tier::Full)),
        ServerMessage::Admitted { view_only: true } => Ok(AuthDecision::accept(Tier::ViewOnly)),
        ServerMessage::Denied => Ok(AuthDecision::reject()),
        _ => Err(HandshakeError::Unexpected("reply to response")),
    }
}
