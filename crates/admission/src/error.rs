//! Admission error kinds.

use crate::{AdmissionState, Event};
use std::{io, net::SocketAddr};
use thiserror::Error;

/// Fatal admission failures. Transient accept errors never surface here;
/// the loop logs them and keeps waiting.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The protocol listener could not be created.
    #[error("failed to listen on {target}: {source}")]
    Bind {
        target: String,
        #[source]
        source: io::Error,
    },
    /// The bootstrap HTTP responder could not be started.
    #[error("failed to start bootstrap responder on {addr}: {source}")]
    Bootstrap {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// The lurk trigger could not be armed.
    #[error("lurk trigger failed: {0}")]
    Trigger(#[source] io::Error),
    /// A lifecycle event arrived in a state that does not allow it.
    #[error("invalid admission transition from {from:?} on {event:?}")]
    InvalidTransition { from: AdmissionState, event: Event },
    /// The loop task panicked or was cancelled.
    #[error("admission task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
