//! Credential slots and their privilege tiers.

use std::fmt;

/// Privilege granted to an authenticated session.
///
/// Ordered so that `Full` sorts before `ViewOnly`; the gate consults slots
/// in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Keyboard and pointer control plus display.
    Full,
    /// Display only; input events are dropped.
    ViewOnly,
}

/// Where a slot's secret came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSource {
    /// A password file on disk.
    File,
    /// A password given inline on the command line or in config.
    Inline,
    /// A display manager's session cookie.
    DisplayManagerCookie,
}

/// Opaque secret bytes. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Box<[u8]>);

impl Secret {
    /// Wrap raw secret bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into().into_boxed_slice())
    }

    /// The raw bytes, for handing to the protocol layer's primitive.
    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    /// Whether the secret is the empty string (`__EMPTY__`).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(<{} bytes>)", self.0.len())
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

/// A single password slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSlot {
    /// Tier granted when a response matches this slot.
    pub tier: Tier,
    /// The stored secret.
    pub secret: Secret,
    /// Origin of the secret.
    pub source: SlotSource,
}

impl CredentialSlot {
    /// Create a slot.
    pub fn new(tier: Tier, secret: impl Into<Secret>, source: SlotSource) -> Self {
        Self {
            tier,
            secret: secret.into(),
            source,
        }
    }
}
