//! # Proof Anchoring
//!
//! A [`ProofRecord`] carries two SHA-256 digests of one bundle:
//!
//! - `ciphertextHash`: digest of the envelope ciphertext. This is the only
//!   value handed to the public ledger. Anyone can later confirm that a
//!   specific, unaltered envelope existed at anchoring time without learning
//!   anything about its content, and the anchor is bound to the exact bytes
//!   the buyer will decrypt.
//! - `plaintextHash`: digest of the canonical record bytes. Disclosed to the
//!   buyer together with the key, never published.
//!
//! Everything in this module is a pure function of its inputs.

use std::fmt;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::canonical::{canonicalize, CanonicalBytes, CanonicalError};
use crate::config::DIGEST_LENGTH;
use crate::crypto::cipher::{AlgorithmTag, EncryptedEnvelope};
use crate::crypto::hash::sha256_array;
use crate::record::DeliverableRecord;

/// A hex string did not decode to a 32-byte digest.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid digest: expected {DIGEST_LENGTH} bytes as hex")]
pub struct DigestParseError;

/// A 256-bit SHA-256 digest. Lowercase hex on the wire.
///
/// Equality is constant-time.
#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(#[serde(with = "crate::encoding::hex_array")] [u8; DIGEST_LENGTH]);

impl ContentDigest {
    pub fn from_bytes(bytes: [u8; DIGEST_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, DigestParseError> {
        let bytes = hex::decode(s.trim()).map_err(|_| DigestParseError)?;
        let arr: [u8; DIGEST_LENGTH] = bytes.try_into().map_err(|_| DigestParseError)?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl PartialEq for ContentDigest {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for ContentDigest {}

impl std::hash::Hash for ContentDigest {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl std::str::FromStr for ContentDigest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// SHA-256 of `bytes` as 64 lowercase hex characters.
pub fn digest(bytes: &[u8]) -> String {
    digest_bytes(bytes).to_hex()
}

/// SHA-256 of `bytes` as a [`ContentDigest`].
pub fn digest_bytes(bytes: &[u8]) -> ContentDigest {
    ContentDigest(sha256_array(bytes))
}

/// Public and buyer-facing digests of one sealed bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRecord {
    pub plaintext_hash: ContentDigest,
    pub ciphertext_hash: ContentDigest,
    pub algorithm_tag: AlgorithmTag,
    /// The record's own `createdAt`, so the proof stays a pure function of
    /// its inputs.
    pub created_at: i64,
}

impl ProofRecord {
    /// The value to hand to the ledger.
    pub fn anchor_hash(&self) -> &ContentDigest {
        &self.ciphertext_hash
    }
}

/// Compute the proof for a record and the envelope that encrypts it.
///
/// `plaintextHash = digest(canonicalize(record))`,
/// `ciphertextHash = digest(envelope.ciphertext)`.
///
/// Does not check that `envelope` actually decrypts to `record`; that is the
/// verifier's job, and it needs the key.
///
/// # Errors
///
/// [`CanonicalError::Malformed`] if the record cannot be canonicalized.
pub fn compute_proof(
    record: &DeliverableRecord,
    envelope: &EncryptedEnvelope,
) -> Result<ProofRecord, CanonicalError> {
    let canonical = canonicalize(record)?;
    Ok(compute_proof_from_canonical(
        &canonical,
        record.created_at,
        envelope,
    ))
}

/// Same as [`compute_proof`] for callers that already hold the canonical
/// bytes.
pub fn compute_proof_from_canonical(
    canonical: &CanonicalBytes,
    created_at: i64,
    envelope: &EncryptedEnvelope,
) -> ProofRecord {
    ProofRecord {
        plaintext_hash: digest_bytes(canonical.as_bytes()),
        ciphertext_hash: digest_bytes(envelope.ciphertext()),
        algorithm_tag: envelope.algorithm_tag(),
        created_at,
    }
}
