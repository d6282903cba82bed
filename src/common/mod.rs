//! Helpers shared by the relay and the middleware layers

pub mod caller;
pub mod trace;

use sha2::{Digest, Sha256};

/// Short, log-safe fingerprint of a correlation key
///
/// The first 12 hex chars of its SHA-256, so log lines can be correlated
/// without the key itself ever being written out.
pub fn fingerprint(state: &str) -> String {
    let digest = Sha256::digest(state.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(12);
    hex
}
