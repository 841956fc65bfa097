//! # Cryptographic Primitives for Tessera
//!
//! Every key, nonce, envelope and wrapped key flows through here. The
//! choices are boring on purpose:
//!
//! - **AES-256-GCM** for bundle encryption. AEAD gives
//!   confidentiality and integrity.
//! - **X25519** for wrapping bundle keys to an arbiter.
//! - **SHA-256** for every digest that gets anchored or disclosed.
//! - **BLAKE3** (`derive_key` mode) for internal KDFs and key fingerprints.
//!
//! Everything here is a thin, typed wrapper around audited crates.

pub mod cipher;
pub mod hash;
pub mod kem;
pub mod keys;
pub mod nonce;

pub use cipher::{decrypt, encrypt, seal, AlgorithmTag, CipherError, EncryptedEnvelope};
pub use hash::{sha256_array, sha256_hex};
pub use kem::{ArbiterKeypair, ArbiterPublicKey, WrappedKey};
pub use keys::{AeadNonce, KeyError, KeyFingerprint, SymmetricKey};
pub use nonce::{DuplicateNonceError, NonceRegistry};
