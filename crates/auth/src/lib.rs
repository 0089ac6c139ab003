//! vncgate credentials: password slots, the hot-reloadable credential
//! store, the display-manager cookie bridge, and the authentication gate
//! invoked by the remote-display protocol layer during the handshake.

pub use cookie::{
    CookieError, CookieLocator, XauthEntry, XauthLocator, bridge_display_cookie,
    display_cookie_slot,
};
pub use error::CredentialError;
pub use gate::{AuthDecision, Authenticator, CredentialGate, Outcome, ResponseVerifier};
pub use slot::{CredentialSlot, Secret, SlotSource, Tier};
pub use store::{CredentialSource, CredentialStore, Fingerprint, ReloadOutcome, Snapshot};

pub mod cookie;
mod error;
pub mod gate;
mod slot;
pub mod passwd;
pub mod store;
