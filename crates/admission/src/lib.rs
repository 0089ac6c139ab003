//! Session admission for vncgate.
//!
//! [`AdmissionLoop`] waits for peers using one of the [`Strategy`] modes,
//! tracks each connection through [`AdmissionState`], and hands accepted
//! streams to a [`SessionHandler`] that runs the handshake against the
//! credential gate.

pub use attempt::Attempt;
pub use bootstrap::{BootstrapConfig, BootstrapRequest};
pub use error::AdmissionError;
pub use listener::{Acceptor, Binder, TcpBinder};
pub use lurk::LurkTrigger;
pub use progress::Progress;
pub use serve::{AdmissionConfig, AdmissionHandle, AdmissionLoop, SessionHandler, Strategy};
pub use state::{AdmissionState, Event};

mod attempt;
pub mod bootstrap;
mod error;
pub mod listener;
pub mod lurk;
mod progress;
mod serve;
mod state;
