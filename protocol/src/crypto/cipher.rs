//! # AES-256-GCM Envelopes
//!
//! Authenticated encryption of canonical record bytes. One envelope per
//! bundle, one key per envelope.
//!
//! AES-256-GCM gives confidentiality and integrity in one primitive: flip
//! any ciphertext bit and decryption fails instead of yielding a predictably
//! altered plaintext. An unauthenticated stream cipher (the XOR demo this
//! replaces) is malleable and is not an option here.
//!
//! ## Nonce management
//!
//! Callers may supply a nonce for deterministic replay. Every nonce, supplied
//! or generated, is claimed in a [`NonceRegistry`] before encryption; a
//! duplicate aborts the call with [`CipherError::DuplicateNonce`].
//!
//! ## Associated data
//!
//! The algorithm tag string (`"AEAD-v1"`) is authenticated as AAD. An
//! envelope relabelled with a different tag fails to decrypt.

use std::fmt;
use std::str::FromStr;

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::keys::{AeadNonce, KeyError, SymmetricKey};
use super::nonce::{DuplicateNonceError, NonceRegistry};
use crate::config::{AEAD_V1_TAG, AES_TAG_LENGTH};

/// Errors from the cipher engine.
///
/// `Authentication` covers both a wrong key and a tampered envelope. The two
/// are indistinguishable by construction and stay indistinguishable here.
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("authentication failed -- wrong key or tampered envelope")]
    Authentication,

    #[error(transparent)]
    DuplicateNonce(#[from] DuplicateNonceError),

    #[error("encryption failed")]
    EncryptFailed,

    #[error(transparent)]
    InvalidKey(#[from] KeyError),
}

/// Identifies the AEAD construction used for an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgorithmTag {
    /// AES-256-GCM, 96-bit nonce, 128-bit tag, tag string as AAD.
    #[serde(rename = "AEAD-v1")]
    AeadV1,
}

impl AlgorithmTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmTag::AeadV1 => AEAD_V1_TAG,
        }
    }
}

impl fmt::Display for AlgorithmTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlgorithmTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            AEAD_V1_TAG => Ok(AlgorithmTag::AeadV1),
            other => Err(format!("unknown algorithm tag: {other}")),
        }
    }
}

/// An encrypted bundle: ciphertext (with the GCM tag appended), the nonce,
/// and the algorithm tag.
///
/// Immutable once built. The wire form is
/// `{ "ciphertext": <base64>, "nonce": <base64>, "algorithmTag": "AEAD-v1" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    #[serde(with = "crate::encoding::base64_bytes")]
    ciphertext: Vec<u8>,
    nonce: AeadNonce,
    algorithm_tag: AlgorithmTag,
}

impl EncryptedEnvelope {
    /// Reassemble an envelope received from elsewhere. Nothing is checked
    /// until [`decrypt`] runs.
    pub fn from_parts(algorithm_tag: AlgorithmTag, nonce: AeadNonce, ciphertext: Vec<u8>) -> Self {
        Self {
            ciphertext,
            nonce,
            algorithm_tag,
        }
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn nonce(&self) -> &AeadNonce {
        &self.nonce
    }

    pub fn algorithm_tag(&self) -> AlgorithmTag {
        self.algorithm_tag
    }

    /// Plaintext length implied by the ciphertext, or `None` if the
    /// ciphertext is too short to hold a tag.
    pub fn plaintext_len(&self) -> Option<usize> {
        self.ciphertext.len().checked_sub(AES_TAG_LENGTH)
    }
}

/// Encrypt `plaintext` under a caller-supplied key.
///
/// If `nonce` is `None`, a random one is drawn. Either way the nonce is
/// claimed in `registry` first.
///
/// # Errors
///
/// - [`CipherError::DuplicateNonce`] if `(key, nonce)` was used before.
///   Nothing is encrypted.
/// - [`CipherError::EncryptFailed`] if the AEAD rejects the input (only
///   possible for absurdly large plaintexts).
///
/// # Example
///
/// ```
/// use tessera_protocol::crypto::cipher::{decrypt, encrypt};
/// use tessera_protocol::crypto::{NonceRegistry, SymmetricKey};
///
/// let registry = NonceRegistry::new();
/// let key = SymmetricKey::generate();
/// let envelope = encrypt(&registry, &key, b"deliverable", None).unwrap();
/// assert_eq!(decrypt(&envelope, &key).unwrap(), b"deliverable");
/// ```
pub fn encrypt(
    registry: &NonceRegistry,
    key: &SymmetricKey,
    plaintext: &[u8],
    nonce: Option<AeadNonce>,
) -> Result<EncryptedEnvelope, CipherError> {
    let nonce = nonce.unwrap_or_else(AeadNonce::generate);
    registry.claim(key.fingerprint(), nonce)?;

    let algorithm_tag = AlgorithmTag::AeadV1;
    let cipher =
        Aes256Gcm::new_from_slice(key.expose_bytes()).map_err(|_| CipherError::EncryptFailed)?;
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(nonce.as_bytes()),
            Payload {
                msg: plaintext,
                aad: algorithm_tag.as_str().as_bytes(),
            },
        )
        .map_err(|_| CipherError::EncryptFailed)?;

    Ok(EncryptedEnvelope {
        ciphertext,
        nonce,
        algorithm_tag,
    })
}

/// Encrypt under a freshly generated key and nonce.
///
/// Returns the key separately from the envelope; route it over a different
/// channel than the ciphertext.
///
/// The new key stays tracked in `registry`; call
/// [`NonceRegistry::forget`] once it is retired.
pub fn seal(
    registry: &NonceRegistry,
    plaintext: &[u8],
) -> Result<(SymmetricKey, EncryptedEnvelope), CipherError> {
    let key = SymmetricKey::generate();
    let envelope = encrypt(registry, &key, plaintext, None)?;
    Ok((key, envelope))
}

/// Decrypt and authenticate an envelope.
///
/// # Errors
///
/// [`CipherError::Authentication`] if the key is wrong, any byte of the
/// ciphertext, tag or nonce changed, or the algorithm tag was swapped.
pub fn decrypt(envelope: &EncryptedEnvelope, key: &SymmetricKey) -> Result<Vec<u8>, CipherError> {
    let cipher =
        Aes256Gcm::new_from_slice(key.expose_bytes()).map_err(|_| CipherError::Authentication)?;
    cipher
        .decrypt(
            Nonce::from_slice(envelope.nonce.as_bytes()),
            Payload {
                msg: &envelope.ciphertext,
                aad: envelope.algorithm_tag.as_str().as_bytes(),
            },
        )
        .map_err(|_| CipherError::Authentication)
}
