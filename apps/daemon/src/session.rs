//! Per-connection session handler.

use admission::{Attempt, SessionHandler};
use auth::{AuthDecision, CredentialGate};
use protocol::{
    ClientMessage, ServerMessage,
    codec::{self, FrameError},
};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// Runs the handshake against the credential gate, then keeps an admitted
/// session alive until the peer leaves.
#[derive(Debug, Clone)]
pub struct ProtocolSession {
    gate: CredentialGate,
    timeout: Duration,
}

impl ProtocolSession {
    pub fn new(gate: CredentialGate, timeout: Duration) -> Self {
        Self { gate, timeout }
    }
}

impl<S> SessionHandler<S> for ProtocolSession
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn handle(&self, mut stream: S, attempt: Attempt) {
        let id = attempt.id();
        if let Err(e) = attempt.handshake_started() {
            tracing::warn!("attempt {id}: {e}");
            return;
        }

        let decision = match protocol::serve(&mut stream, &self.gate, self.timeout).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::info!("attempt {id}: handshake failed: {e}");
                AuthDecision::reject()
            }
        };
        if let Err(e) = attempt.decided(&decision) {
            tracing::warn!("attempt {id}: {e}");
        }
        if !decision.is_accepted() {
            return;
        }

        loop {
            match codec::read_message::<_, ClientMessage>(&mut stream).await {
                Ok(ClientMessage::Ping) => {
                    if let Err(e) = codec::write_message(&mut stream, &ServerMessage::Pong).await {
                        tracing::debug!("attempt {id}: write failed: {e}");
                        break;
                    }
                }
                Ok(ClientMessage::Response { .. }) => {
                    tracing::debug!("attempt {id}: ignoring response after admission");
                }
                Err(FrameError::ConnectionClosed) => break,
                Err(e) => {
                    tracing::debug!("attempt {id}: session ended: {e}");
                    break;
                }
            }
        }
        match attempt.peer() {
            Some(peer) => tracing::info!("attempt {id}: session with {peer} closed"),
            None => tracing::info!("attempt {id}: session closed"),
        }
    }
}
