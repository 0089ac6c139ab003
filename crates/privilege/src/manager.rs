//! One-shot privilege drop with post-condition verification.

use crate::{Identity, IdentityOps, PrivilegeError, System};

/// What has been requested and confirmed so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrivilegeState {
    /// Effective identity at construction.
    pub original: Identity,
    /// Target of the drop, once requested.
    pub requested: Option<Identity>,
    /// The set-id calls returned success. Never reset.
    pub applied: bool,
    /// The kernel reported the requested identity after the drop.
    pub verified: bool,
}

/// Proof that the process runs as the requested, verified identity.
///
/// Only [`PrivilegeManager::unprivileged`] hands these out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unprivileged {
    identity: Identity,
}

impl Unprivileged {
    /// The identity the process was verified to run as.
    pub fn identity(&self) -> Identity {
        self.identity
    }
}

/// Applies and verifies the process's privilege drop.
pub struct PrivilegeManager<O = System> {
    ops: O,
    state: PrivilegeState,
}

impl PrivilegeManager<System> {
    /// Manager for the running process.
    pub fn new() -> Self {
        Self::with_ops(System)
    }
}

impl Default for PrivilegeManager<System> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: IdentityOps> PrivilegeManager<O> {
    /// Manager over custom identity primitives.
    pub fn with_ops(ops: O) -> Self {
        let original = ops.effective();
        Self {
            ops,
            state: PrivilegeState {
                original,
                requested: None,
                applied: false,
                verified: false,
            },
        }
    }

    /// Current state.
    pub fn state(&self) -> PrivilegeState {
        self.state
    }

    /// The underlying primitives.
    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// Resolve `target` (see [`Identity::resolve`]) against this manager's
    /// user and group databases.
    pub fn resolve(&self, target: &str) -> Result<Identity, PrivilegeError> {
        Identity::resolve(target, &self.ops)
    }

    /// Switch the process to `identity`.
    ///
    /// Must run before any listener is bound. A second call for the same
    /// identity is a no-op; any other identity change after a successful
    /// drop is refused with [`PrivilegeError::ReEscalationAttempt`].
    /// Failures carry `strict` so the caller can tell whether it must exit.
    pub fn drop_to(&mut self, identity: Identity, strict: bool) -> Result<(), PrivilegeError> {
        if self.state.applied {
            let current = self.state.requested.unwrap_or(self.state.original);
            if current == identity {
                tracing::debug!("privileges already dropped to {identity}");
                return Ok(());
            }
            tracing::error!("re-escalation attempt from {current} to {identity}");
            return Err(PrivilegeError::ReEscalationAttempt {
                current,
                requested: identity,
            });
        }

        self.state.requested = Some(identity);
        let current = self.ops.effective();
        if current == identity && self.ops.real() == identity {
            tracing::info!("already running as {identity}");
            self.state.applied = true;
            return Ok(());
        }

        let fail = |step, source| PrivilegeError::DropFailed {
            identity,
            step,
            strict,
            source,
        };
        // Groups first: once the uid is gone we may no longer change them.
        self.ops
            .set_groups(&[identity.gid])
            .map_err(|e| fail("setgroups", e))?;
        self.ops
            .set_gid(identity.gid)
            .map_err(|e| fail("setgid", e))?;
        self.ops
            .set_uid(identity.uid)
            .map_err(|e| fail("setuid", e))?;

        self.state.applied = true;
        tracing::info!("dropped privileges from {current} to {identity}");
        Ok(())
    }

    /// Re-read the process identity and confirm the drop took effect.
    ///
    /// Real, effective and saved ids must all equal the target. Only
    /// queries the kernel; never calls a set-id function.
    pub fn verify_dropped(&mut self) -> bool {
        let Some(target) = self.state.requested.filter(|_| self.state.applied) else {
            self.state.verified = false;
            return false;
        };

        let real = self.ops.real();
        let effective = self.ops.effective();
        let verified = match self.ops.saved() {
            Ok(saved) if real == target && effective == target && saved == target => true,
            Ok(saved) => {
                tracing::error!(
                    "privilege drop to {target} did not take effect \
                     (real {real}, effective {effective}, saved {saved})"
                );
                false
            }
            Err(e) => {
                tracing::error!("cannot read saved ids after dropping to {target}: {e}");
                false
            }
        };

        self.state.verified = verified;
        verified
    }

    /// The proof marker, available only after a successful verification.
    pub fn unprivileged(&self) -> Option<Unprivileged> {
        match self.state.requested {
            Some(identity) if self.state.applied && self.state.verified => {
                Some(Unprivileged { identity })
            }
            _ => None,
        }
    }
}
