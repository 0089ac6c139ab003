//! Per-attempt admission state machine.

use crate::AdmissionError;
use auth::Outcome;

/// Where a connection attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionState {
    Idle,
    Waiting,
    PeerConnected,
    Authenticating,
    Granted,
    Rejected,
    Closed,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The loop started waiting for this attempt.
    Start,
    /// A socket-level connection was accepted.
    Accepted,
    /// Accept failed transiently.
    AcceptFailed,
    /// A bootstrap page was served; the real handshake is still pending.
    BootstrapServed,
    /// Handshake bytes began arriving.
    HandshakeStarted,
    /// The gate decided.
    Decided(Outcome),
    /// The connection ended.
    ConnectionEnded,
    /// The loop goes back to waiting after a closed attempt.
    Rearm,
}

impl AdmissionState {
    /// Apply `event`, refusing transitions the lifecycle does not allow.
    pub fn on(self, event: Event) -> Result<Self, AdmissionError> {
        use AdmissionState::*;
        let next = match (self, event) {
            (Idle, Event::Start) => Waiting,
            (Waiting, Event::Accepted) => PeerConnected,
            (Waiting, Event::AcceptFailed | Event::BootstrapServed) => Waiting,
            (PeerConnected, Event::HandshakeStarted) => Authenticating,
            (Authenticating, Event::Decided(Outcome::Accept)) => Granted,
            (Authenticating, Event::Decided(Outcome::Reject)) => Rejected,
            (Granted | Rejected, Event::ConnectionEnded) => Closed,
            (Closed, Event::Rearm) => Waiting,
            (from, event) => return Err(AdmissionError::InvalidTransition { from, event }),
        };
        Ok(next)
    }

    /// A handshake is underway and must be allowed to finish.
    pub fn is_authenticating(self) -> bool {
        self == Self::Authenticating
    }
}
