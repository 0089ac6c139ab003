//! Privilege error kinds.

use crate::Identity;
use nix::errno::Errno;
use thiserror::Error;

/// Failure to resolve or apply a privilege drop.
#[derive(Debug, Error)]
pub enum PrivilegeError {
    /// The user or group named in the drop target does not exist.
    #[error("unknown user or group '{name}'")]
    UnknownIdentity { name: String },
    /// The passwd or group database could not be queried.
    #[error("lookup of '{name}' failed: {source}")]
    Lookup {
        name: String,
        #[source]
        source: Errno,
    },
    /// A set-id call failed. Fatal when `strict`.
    #[error("failed to drop privileges to {identity} at {step}: {source}")]
    DropFailed {
        identity: Identity,
        step: &'static str,
        strict: bool,
        #[source]
        source: Errno,
    },
    /// An identity change was requested after the drop was applied.
    #[error("refusing to switch from {current} to {requested}: privileges already dropped")]
    ReEscalationAttempt {
        current: Identity,
        requested: Identity,
    },
}

impl PrivilegeError {
    /// Whether the process must not continue.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::DropFailed { strict, .. } => *strict,
            Self::ReEscalationAttempt { .. }
            | Self::UnknownIdentity { .. }
            | Self::Lookup { .. } => true,
        }
    }
}
