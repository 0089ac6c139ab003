//! Coarse lifecycle checkpoints for supervisors and tests.

use std::{net::SocketAddr, sync::Arc};
use tokio::sync::watch;

/// The most recent checkpoint the admission loop reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Starting,
    /// Lurking with no listener, waiting for the trigger.
    Lurking,
    /// A protocol listener is accepting on this address.
    ListenerReady(SocketAddr),
    /// The bootstrap responder is serving on this address.
    BootstrapReady(SocketAddr),
    PeerAccepted,
    Authenticated,
    SessionEnded,
    /// The loop exited and will accept nothing further.
    Finished,
}

/// Publishes checkpoints. Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: Arc<watch::Sender<Progress>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Progress::Starting);
        Self { tx: Arc::new(tx) }
    }

    /// Record a checkpoint.
    pub fn report(&self, checkpoint: Progress) {
        tracing::debug!("admission progress: {checkpoint:?}");
        self.tx.send_replace(checkpoint);
    }

    /// Observe checkpoints as they are reported.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.tx.subscribe()
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
