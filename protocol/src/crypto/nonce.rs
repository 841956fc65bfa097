//! # Nonce Registry
//!
//! AES-GCM falls apart under nonce reuse: two plaintexts under the same
//! (key, nonce) leak their XOR and let an attacker forge tags. Random 96-bit
//! nonces make collisions unlikely; this registry makes reuse of a
//! *supplied* nonce (deterministic replay, tests, bad callers) a hard error.
//!
//! The registry is an explicit object passed to [`super::cipher::encrypt`],
//! not process-wide state. Share it across worker threads with `Arc`.
//! Entries are indexed by [`KeyFingerprint`]; key bytes never enter it.

use std::collections::HashSet;

use dashmap::DashMap;
use thiserror::Error;

use super::keys::{AeadNonce, KeyFingerprint, SymmetricKey};

/// A nonce was presented twice for the same key.
///
/// This is caller misuse. The encryption call that hit it was aborted
/// before touching the plaintext.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("nonce already used under key {fingerprint}")]
pub struct DuplicateNonceError {
    pub fingerprint: KeyFingerprint,
}

/// Thread-safe map of key fingerprint to the nonces used under that key.
///
/// Check-and-insert for one key happens under that key's shard lock, so two
/// threads racing on the same (key, nonce) cannot both succeed.
#[derive(Debug, Default)]
pub struct NonceRegistry {
    used: DashMap<KeyFingerprint, HashSet<AeadNonce>>,
}

impl NonceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `nonce` as used under `fingerprint`.
    ///
    /// # Errors
    ///
    /// [`DuplicateNonceError`] if the pair was already claimed.
    pub fn claim(
        &self,
        fingerprint: KeyFingerprint,
        nonce: AeadNonce,
    ) -> Result<(), DuplicateNonceError> {
        let mut nonces = self.used.entry(fingerprint).or_default();
        if nonces.insert(nonce) {
            Ok(())
        } else {
            tracing::warn!(key = %fingerprint, "rejected duplicate nonce");
            Err(DuplicateNonceError { fingerprint })
        }
    }

    /// Whether `nonce` has been claimed under `key`.
    pub fn is_used(&self, key: &SymmetricKey, nonce: &AeadNonce) -> bool {
        self.used
            .get(&key.fingerprint())
            .map(|nonces| nonces.contains(nonce))
            .unwrap_or(false)
    }

    /// Number of nonces claimed under `key`.
    pub fn nonces_used(&self, key: &SymmetricKey) -> usize {
        self.used
            .get(&key.fingerprint())
            .map(|nonces| nonces.len())
            .unwrap_or(0)
    }

    /// Number of distinct keys with at least one claimed nonce.
    pub fn tracked_keys(&self) -> usize {
        self.used.len()
    }

    /// Drop all entries for a retired key. Returns `true` if it was tracked.
    ///
    /// Only call this once the key can never encrypt again.
    pub fn forget(&self, key: &SymmetricKey) -> bool {
        self.used.remove(&key.fingerprint()).is_some()
    }
}
