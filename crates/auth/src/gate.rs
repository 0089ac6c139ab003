//! Authentication gate invoked by the protocol layer during the handshake.
//!
//! The gate owns no cryptography. The protocol layer hands it a
//! [`ResponseVerifier`] bound to the session's challenge; the gate supplies
//! each stored secret in tier order and reports which tier, if any, matched.

use crate::{CredentialStore, Tier};
use std::sync::Arc;

/// Accept or reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accept,
    Reject,
}

/// The result of one handshake attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthDecision {
    /// Whether the peer may proceed.
    pub outcome: Outcome,
    /// Tier granted on accept; `None` on reject.
    pub tier: Option<Tier>,
}

impl AuthDecision {
    /// Accept at `tier`.
    pub const fn accept(tier: Tier) -> Self {
        Self {
            outcome: Outcome::Accept,
            tier: Some(tier),
        }
    }

    /// Reject.
    pub const fn reject() -> Self {
        Self {
            outcome: Outcome::Reject,
            tier: None,
        }
    }

    /// Whether the decision admits the peer.
    pub fn is_accepted(&self) -> bool {
        self.outcome == Outcome::Accept
    }

    /// Whether the peer was admitted display-only.
    pub fn is_view_only(&self) -> bool {
        self.tier == Some(Tier::ViewOnly)
    }
}

/// The protocol layer's challenge/response primitive for one session.
pub trait ResponseVerifier {
    /// Whether `response` is the expected answer to this session's
    /// challenge under `secret`.
    fn matches(&self, secret: &[u8], response: &[u8]) -> bool;
}

impl<F: Fn(&[u8], &[u8]) -> bool> ResponseVerifier for F {
    fn matches(&self, secret: &[u8], response: &[u8]) -> bool {
        self(secret, response)
    }
}

/// Decides whether a handshake response is admitted.
pub trait Authenticator: Send + Sync {
    /// Validate `response` using the session's `verifier`.
    fn authenticate<V>(&self, verifier: &V, response: &[u8]) -> AuthDecision
    where
        V: ResponseVerifier + ?Sized;
}

/// Authenticator backed by a [`CredentialStore`].
#[derive(Debug, Clone)]
pub struct CredentialGate {
    store: Arc<CredentialStore>,
}

impl CredentialGate {
    /// Gate reading from `store`. See [`CredentialStore::install`].
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self { store }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }
}

impl Authenticator for CredentialGate {
    fn authenticate<V>(&self, verifier: &V, response: &[u8]) -> AuthDecision
    where
        V: ResponseVerifier + ?Sized,
    {
        // Pick up operator edits before every handshake.
        if let Err(e) = self.store.reload(false) {
            tracing::warn!("{e}");
        }

        let snapshot = self.store.snapshot();
        if snapshot.is_disabled() {
            tracing::debug!("authentication disabled, granting full access");
            return AuthDecision::accept(Tier::Full);
        }

        for slot in snapshot.slots() {
            if verifier.matches(slot.secret.expose(), response) {
                tracing::info!(tier = ?slot.tier, "handshake accepted");
                return AuthDecision::accept(slot.tier);
            }
        }

        tracing::info!("handshake rejected");
        AuthDecision::reject()
    }
}
