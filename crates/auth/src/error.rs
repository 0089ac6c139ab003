//! Credential error kinds.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Failure while loading or reloading a credential source.
///
/// All variants are recoverable once the server is running: a failed reload
/// keeps the previous store. Whether a failure at startup is fatal is the
/// caller's policy.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The password file does not exist.
    #[error("password file {} does not exist", .path.display())]
    MissingFile { path: PathBuf },
    /// The password file exists but could not be read by this identity.
    #[error("password file {} is not readable: {source}", .path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The password list violates the file grammar.
    #[error("malformed password list: {reason}")]
    MalformedSpec { reason: String },
    /// The source was readable but held no secrets.
    #[error("password list contains no credentials")]
    EmptyCredentials,
    /// A reload failed; the previous credentials remain installed.
    #[error("reload of {} failed, keeping previous credentials: {source}", .path.display())]
    ReloadFailed {
        path: PathBuf,
        #[source]
        source: Box<CredentialError>,
    },
}

impl CredentialError {
    pub(crate) fn malformed(line: usize, reason: &str) -> Self {
        Self::MalformedSpec {
            reason: format!("line {line}: {reason}"),
        }
    }
}
