//! vncgate daemon: drops privileges, loads credentials, and runs the
//! admission loop that gates peers on the stand-in handshake.

pub use cmd::Cli;
pub use config::DaemonConfig;
pub use server::Server;
pub use session::ProtocolSession;

pub mod cmd;
pub mod config;
pub mod server;
mod session;
pub mod utils;
