//! # Hashing Utilities
//!
//! Two hash functions, two jobs:
//!
//! - **SHA-256** for every digest that leaves the process: anchored
//!   ciphertext hashes, disclosed plaintext hashes, file content hashes.
//!   Buyers, arbiters and ledgers recompute these with whatever tooling they
//!   have, and every tool has SHA-256.
//!
//! - **BLAKE3** in `derive_key` mode for internal key derivation and
//!   fingerprints, where domain separation by context string is what we need.

use sha2::{Digest, Sha256};

/// SHA-256 of `data` as a fixed-size array.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 of `data` as 64 lowercase hex characters.
///
/// # Example
///
/// ```
/// use tessera_protocol::crypto::hash::sha256_hex;
///
/// assert_eq!(
///     sha256_hex(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256_array(data))
}

/// Domain-separated BLAKE3 hash over several parts.
///
/// Uses BLAKE3's `derive_key` mode, so the same parts hashed under two
/// different contexts never collide.
pub fn domain_separated_hash(context: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}
