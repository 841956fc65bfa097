//! # Symmetric Keys and Nonces
//!
//! One [`SymmetricKey`] per bundle. The seller process generates it, uses it
//! for exactly one envelope, then either hands it to the buyer over a
//! separate channel or wraps it into an escrow ticket.
//!
//! ## Handling rules
//!
//! - Key bytes are zeroized on drop (`zeroize`).
//! - `SymmetricKey` has no `Serialize` impl and a redacted `Debug`. Exporting
//!   it is a deliberate call to [`SymmetricKey::expose_bytes`] or
//!   [`SymmetricKey::to_base64`].
//! - Key bytes are never logged. Log the [`KeyFingerprint`] instead.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH, KEY_FINGERPRINT_CONTEXT};
use crate::crypto::hash::domain_separated_hash;

/// Errors while importing key or nonce material.
///
/// Deliberately says nothing about the bytes themselves.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid key length: expected {AES_KEY_LENGTH} bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("invalid nonce length: expected {AES_NONCE_LENGTH} bytes, got {0}")]
    InvalidNonceLength(usize),

    #[error("invalid key encoding")]
    InvalidEncoding,
}

/// A 256-bit AES-GCM key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; AES_KEY_LENGTH]);

impl SymmetricKey {
    /// Draw a fresh key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; AES_KEY_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        let key = Self(bytes);
        bytes.zeroize();
        key
    }

    /// Wrap existing key bytes, e.g. for deterministic replay in tests.
    pub fn from_bytes(bytes: [u8; AES_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Length-checked import from an untrusted slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let arr: [u8; AES_KEY_LENGTH] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidKeyLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Import a base64 key as produced by [`Self::to_base64`].
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let decoded = Zeroizing::new(
            STANDARD
                .decode(encoded.trim().as_bytes())
                .map_err(|_| KeyError::InvalidEncoding)?,
        );
        Self::from_slice(&decoded)
    }

    /// Raw key bytes. Only for handing the key to a secure channel.
    pub fn expose_bytes(&self) -> &[u8; AES_KEY_LENGTH] {
        &self.0
    }

    /// Base64 export for a secure channel. The returned string is zeroized
    /// when dropped.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(self.0))
    }

    /// Public, non-reversible identity of this key.
    pub fn fingerprint(&self) -> KeyFingerprint {
        KeyFingerprint(domain_separated_hash(KEY_FINGERPRINT_CONTEXT, &[&self.0]))
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey(<redacted> fp={})", self.fingerprint())
    }
}

/// BLAKE3 derive-key fingerprint of a [`SymmetricKey`].
///
/// Safe to log, store and index by.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyFingerprint(#[serde(with = "crate::encoding::hex_array")] [u8; 32]);

impl KeyFingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for KeyFingerprint {
    /// First 8 bytes in hex. Enough to tell keys apart in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..8]))
    }
}

impl fmt::Debug for KeyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyFingerprint({self})")
    }
}

/// A 96-bit AES-GCM nonce. Must never repeat under the same key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AeadNonce(#[serde(with = "crate::encoding::base64_array")] [u8; AES_NONCE_LENGTH]);

impl AeadNonce {
    /// Draw a random nonce from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; AES_NONCE_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; AES_NONCE_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let arr: [u8; AES_NONCE_LENGTH] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidNonceLength(bytes.len()))?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; AES_NONCE_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for AeadNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AeadNonce({})", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_differ() {
        assert_ne!(SymmetricKey::generate(), SymmetricKey::generate());
    }

    #[test]
    fn from_slice_rejects_short_key() {
        assert!(matches!(
            SymmetricKey::from_slice(&[0u8; 16]),
            Err(KeyError::InvalidKeyLength(16))
        ));
    }

    #[test]
    fn base64_round_trip() {
        let key = SymmetricKey::generate();
        let encoded = key.to_base64();
        let back = SymmetricKey::from_base64(&encoded).unwrap();
        assert_eq!(key, back);
    }

    #[test]
    fn debug_does_not_leak_key_bytes() {
        let key = SymmetricKey::from_bytes([0xAB; 32]);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains(&hex::encode(key.expose_bytes())));
        assert!(!rendered.contains("171, 171"));
    }

    #[test]
    fn fingerprint_is_stable_and_key_specific() {
        let a = SymmetricKey::from_bytes([1; 32]);
        let b = SymmetricKey::from_bytes([2; 32]);
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint().as_bytes(), a.expose_bytes());
    }

    #[test]
    fn nonce_from_slice_checks_length() {
        assert!(AeadNonce::from_slice(&[0u8; 12]).is_ok());
        assert!(matches!(
            AeadNonce::from_slice(&[0u8; 16]),
            Err(KeyError::InvalidNonceLength(16))
        ));
    }

    #[test]
    fn nonce_serializes_as_base64() {
        let nonce = AeadNonce::from_bytes([0u8; 12]);
        assert_eq!(serde_json::to_string(&nonce).unwrap(), "\"AAAAAAAAAAAAAAAA\"");
    }
}
