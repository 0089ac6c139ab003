//! Challenge/response primitive.
//!
//! The expected response is `HMAC-SHA256(key = secret, msg = nonce)`,
//! compared in constant time.

use auth::ResponseVerifier;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 16;

/// One session's challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    nonce: [u8; NONCE_LEN],
}

impl Challenge {
    /// A fresh random challenge.
    pub fn random() -> Self {
        Self {
            nonce: rand::random(),
        }
    }

    /// A challenge with a known nonce, as received by a client.
    pub fn from_nonce(nonce: &[u8]) -> Option<Self> {
        Some(Self {
            nonce: nonce.try_into().ok()?,
        })
    }

    /// The nonce sent to the peer.
    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    /// The response a peer holding `secret` sends.
    pub fn respond(&self, secret: &[u8]) -> Vec<u8> {
        let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
            return Vec::new();
        };
        mac.update(&self.nonce);
        mac.finalize().into_bytes().to_vec()
    }
}

impl ResponseVerifier for Challenge {
    fn matches(&self, secret: &[u8], response: &[u8]) -> bool {
        self.respond(secret).ct_eq(response).into()
    }
}
