//! Privilege de-escalation for vncgate.
//!
//! The process may start as root to bind low ports or read protected
//! credentials. [`PrivilegeManager::drop_to`] moves it to a target account
//! exactly once; [`PrivilegeManager::verify_dropped`] re-reads the real
//! process identity and, only if it matches, yields an [`Unprivileged`]
//! marker that later stages demand as proof.

pub use error::PrivilegeError;
pub use identity::Identity;
pub use manager::{PrivilegeManager, PrivilegeState, Unprivileged};
pub use ops::{IdentityOps, System};

mod error;
mod identity;
mod manager;
mod ops;
