//! Connection attempt handles shared between the loop and session tasks.

use crate::{AdmissionError, AdmissionState, Event, Progress, progress::ProgressReporter};
use auth::{AuthDecision, Outcome};
use std::{
    net::SocketAddr,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicU32, Ordering},
    },
};
use tokio::sync::watch;

/// Shared loop bookkeeping each attempt reports into.
#[derive(Debug, Clone, Default)]
pub(crate) struct Ledger {
    pub progress: ProgressReporter,
    pub failures: Arc<AtomicU32>,
}

#[derive(Debug)]
struct Inner {
    id: u64,
    peer: OnceLock<SocketAddr>,
    state: watch::Sender<AdmissionState>,
    ledger: Ledger,
}

/// One connection attempt. Session handlers report handshake progress
/// through it; the loop watches it to drain in-progress handshakes on
/// shutdown.
#[derive(Debug, Clone)]
pub struct Attempt {
    inner: Arc<Inner>,
}

impl Attempt {
    pub(crate) fn new(id: u64, ledger: Ledger) -> Self {
        let (state, _) = watch::channel(AdmissionState::Idle);
        Self {
            inner: Arc::new(Inner {
                id,
                peer: OnceLock::new(),
                state,
                ledger,
            }),
        }
    }

    /// Sequence number within the loop.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The connected peer, once accepted.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.inner.peer.get().copied()
    }

    pub fn state(&self) -> AdmissionState {
        *self.inner.state.borrow()
    }

    /// Observe state changes.
    pub fn watch(&self) -> watch::Receiver<AdmissionState> {
        self.inner.state.subscribe()
    }

    /// Handshake bytes began arriving.
    pub fn handshake_started(&self) -> Result<AdmissionState, AdmissionError> {
        self.advance(Event::HandshakeStarted)
    }

    /// Record the gate's decision.
    pub fn decided(&self, decision: &AuthDecision) -> Result<AdmissionState, AdmissionError> {
        let state = self.advance(Event::Decided(decision.outcome))?;
        match decision.outcome {
            Outcome::Accept => {
                self.inner.ledger.failures.store(0, Ordering::Relaxed);
                self.inner.ledger.progress.report(Progress::Authenticated);
            }
            Outcome::Reject => {
                self.inner.ledger.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(state)
    }

    pub(crate) fn advance(&self, event: Event) -> Result<AdmissionState, AdmissionError> {
        let mut result = Ok(AdmissionState::Idle);
        self.inner.state.send_if_modified(|state| match state.on(event) {
            Ok(next) => {
                result = Ok(next);
                let changed = *state != next;
                *state = next;
                changed
            }
            Err(e) => {
                result = Err(e);
                false
            }
        });
        result
    }

    pub(crate) fn accepted(&self, peer: SocketAddr) {
        let _ = self.inner.peer.set(peer);
        if let Err(e) = self.advance(Event::Accepted) {
            tracing::warn!("attempt {}: {e}", self.inner.id);
        }
    }

    /// Close the attempt after its session ended. A session that never
    /// reached a decision counts as rejected.
    pub(crate) fn finish(&self) {
        let state = self.state();
        if state == AdmissionState::PeerConnected {
            let _ = self.advance(Event::HandshakeStarted);
        }
        if self.state().is_authenticating() {
            tracing::info!("attempt {}: peer left before a decision", self.inner.id);
            let _ = self.decided(&AuthDecision::reject());
        }
        if let Err(e) = self.advance(Event::ConnectionEnded) {
            tracing::warn!("attempt {}: {e}", self.inner.id);
        }
        self.inner.ledger.progress.report(Progress::SessionEnded);
    }

    /// Wait until no handshake is in progress.
    pub(crate) async fn settled(&self) {
        let mut rx = self.watch();
        let _ = rx.wait_for(|state| !state.is_authenticating()).await;
    }
}
