//! # Key Wrapping for Arbiters
//!
//! Ephemeral-static X25519 key encapsulation, used by the dispute escrow to
//! wrap a bundle key so only one arbiter can recover it.
//!
//! ## Construction
//!
//! ```text
//! eph        = fresh X25519 secret
//! shared     = X25519(eph, arbiter_public)
//! kek        = BLAKE3-derive-key("tessera v1 escrow key-encryption key",
//!                                shared || eph_public || arbiter_public)
//! wrapped    = AES-256-GCM(kek, random nonce, bundle_key, aad = binding)
//! ```
//!
//! The raw DH output is never used as a key directly. Both public keys go
//! into the KDF so a wrapped key cannot be replayed against another
//! recipient. `binding` is the caller's header (for escrow: the canonical
//! ticket header), authenticated but not encrypted.
//!
//! Non-contributory shared secrets (low-order arbiter points) are refused
//! on wrap and treated as an authentication failure on unwrap.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::Zeroizing;

use super::cipher::CipherError;
use super::keys::{AeadNonce, SymmetricKey};
use crate::config::{AES_KEY_LENGTH, ESCROW_KEK_CONTEXT, X25519_KEY_LENGTH};

/// An arbiter's long-term X25519 keypair. The secret is zeroized on drop.
pub struct ArbiterKeypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl ArbiterKeypair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Rebuild a keypair from stored secret bytes.
    pub fn from_secret_bytes(bytes: [u8; X25519_KEY_LENGTH]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_key(&self) -> ArbiterPublicKey {
        ArbiterPublicKey(self.public.to_bytes())
    }

    /// Export the secret scalar. Handle like any other private key.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; X25519_KEY_LENGTH]> {
        Zeroizing::new(self.secret.to_bytes())
    }
}

impl fmt::Debug for ArbiterKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArbiterKeypair")
            .field("public", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// An arbiter's X25519 public key, hex on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArbiterPublicKey(
    #[serde(with = "crate::encoding::hex_array")] [u8; X25519_KEY_LENGTH],
);

impl ArbiterPublicKey {
    pub fn from_bytes(bytes: [u8; X25519_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; X25519_KEY_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ArbiterPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArbiterPublicKey({})", self.to_hex())
    }
}

/// A symmetric key encapsulated to one X25519 recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedKey {
    #[serde(with = "crate::encoding::hex_array")]
    ephemeral_public: [u8; X25519_KEY_LENGTH],
    nonce: AeadNonce,
    #[serde(with = "crate::encoding::base64_bytes")]
    ciphertext: Vec<u8>,
}

impl WrappedKey {
    pub fn ephemeral_public(&self) -> &[u8; X25519_KEY_LENGTH] {
        &self.ephemeral_public
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }
}

/// Encapsulate `key` to `recipient`, authenticating `binding` alongside.
///
/// # Errors
///
/// [`CipherError::EncryptFailed`] if the recipient key is a low-order
/// point (the DH output would be all zeros).
pub fn wrap_key(
    key: &SymmetricKey,
    recipient: &ArbiterPublicKey,
    binding: &[u8],
) -> Result<WrappedKey, CipherError> {
    let eph = EphemeralSecret::random_from_rng(OsRng);
    let eph_public = PublicKey::from(&eph);
    let shared = eph.diffie_hellman(&PublicKey::from(recipient.0));
    if !shared.was_contributory() {
        return Err(CipherError::EncryptFailed);
    }

    let kek = derive_kek(shared.as_bytes(), eph_public.as_bytes(), &recipient.0);
    let nonce = AeadNonce::generate();
    let cipher = Aes256Gcm::new_from_slice(kek.as_slice()).map_err(|_| CipherError::EncryptFailed)?;
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(nonce.as_bytes()),
            Payload {
                msg: key.expose_bytes(),
                aad: binding,
            },
        )
        .map_err(|_| CipherError::EncryptFailed)?;

    Ok(WrappedKey {
        ephemeral_public: eph_public.to_bytes(),
        nonce,
        ciphertext,
    })
}

/// Recover a key wrapped by [`wrap_key`].
///
/// # Errors
///
/// [`CipherError::Authentication`] for a wrong recipient, a modified
/// wrapped key, or a `binding` that differs from the one used to wrap.
pub fn unwrap_key(
    wrapped: &WrappedKey,
    recipient: &ArbiterKeypair,
    binding: &[u8],
) -> Result<SymmetricKey, CipherError> {
    let shared = recipient
        .secret
        .diffie_hellman(&PublicKey::from(wrapped.ephemeral_public));
    if !shared.was_contributory() {
        return Err(CipherError::Authentication);
    }

    let kek = derive_kek(
        shared.as_bytes(),
        &wrapped.ephemeral_public,
        recipient.public.as_bytes(),
    );
    let cipher = Aes256Gcm::new_from_slice(kek.as_slice()).map_err(|_| CipherError::Authentication)?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(
                Nonce::from_slice(wrapped.nonce.as_bytes()),
                Payload {
                    msg: &wrapped.ciphertext,
                    aad: binding,
                },
            )
            .map_err(|_| CipherError::Authentication)?,
    );
    SymmetricKey::from_slice(&plaintext).map_err(|_| CipherError::Authentication)
}

fn derive_kek(
    shared_secret: &[u8; 32],
    ephemeral_public: &[u8; 32],
    recipient_public: &[u8; 32],
) -> Zeroizing<[u8; AES_KEY_LENGTH]> {
    let mut hasher = blake3::Hasher::new_derive_key(ESCROW_KEK_CONTEXT);
    hasher.update(shared_secret);
    hasher.update(ephemeral_public);
    hasher.update(recipient_public);
    let mut kek = Zeroizing::new([0u8; AES_KEY_LENGTH]);
    hasher.finalize_xof().fill(kek.as_mut_slice());
    kek
}
