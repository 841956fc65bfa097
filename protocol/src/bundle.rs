//! # Bundle Pipeline
//!
//! canonicalize → encrypt → compute proof, in one call.
//!
//! The key comes back as its own field of [`SealedBundle`]. Nothing that
//! serializes a bundle for storage or display ([`BundleSummary`]) has a slot
//! for it.

use serde::{Deserialize, Serialize};

use crate::anchor::{compute_proof_from_canonical, ProofRecord};
use crate::canonical::canonicalize;
use crate::crypto::cipher::{encrypt, EncryptedEnvelope};
use crate::crypto::keys::{AeadNonce, SymmetricKey};
use crate::crypto::nonce::NonceRegistry;
use crate::error::Result;
use crate::record::DeliverableRecord;
use crate::verify::{verify_against_proof, Verification};

/// Output of [`seal_bundle`].
#[derive(Debug)]
pub struct SealedBundle {
    pub envelope: EncryptedEnvelope,
    pub proof: ProofRecord,
    /// Route this to the buyer, or into escrow, over a separate channel.
    pub key: SymmetricKey,
}

impl SealedBundle {
    /// Decrypt with the bundle's own key and check it against its proof.
    pub fn self_check(&self) -> Verification {
        verify_against_proof(&self.envelope, &self.key, &self.proof)
    }

    /// Split off the key, leaving the publishable parts.
    pub fn into_parts(self) -> (EncryptedEnvelope, ProofRecord, SymmetricKey) {
        (self.envelope, self.proof, self.key)
    }
}

/// Seal `record` under a fresh key and nonce.
///
/// The fresh key stays tracked in `registry` until the caller calls
/// [`NonceRegistry::forget`]. Long-running sellers that never encrypt
/// under a bundle key again should use [`seal_bundle_once`].
pub fn seal_bundle(registry: &NonceRegistry, record: &DeliverableRecord) -> Result<SealedBundle> {
    seal_bundle_with(registry, record, SymmetricKey::generate(), None)
}

/// Seal `record` under a fresh single-use key, then drop that key from
/// `registry`.
///
/// The returned key must not be used to encrypt again; the registry no
/// longer guards it.
pub fn seal_bundle_once(
    registry: &NonceRegistry,
    record: &DeliverableRecord,
) -> Result<SealedBundle> {
    let bundle = seal_bundle(registry, record)?;
    registry.forget(&bundle.key);
    Ok(bundle)
}

/// Seal `record` under a caller-supplied key and optional nonce.
///
/// For deterministic replay. The nonce is still claimed in `registry`.
pub fn seal_bundle_with(
    registry: &NonceRegistry,
    record: &DeliverableRecord,
    key: SymmetricKey,
    nonce: Option<AeadNonce>,
) -> Result<SealedBundle> {
    let canonical = canonicalize(record)?;
    let envelope = encrypt(registry, &key, canonical.as_bytes(), nonce)?;
    let proof = compute_proof_from_canonical(&canonical, record.created_at, &envelope);

    tracing::debug!(
        job = %record.job.id,
        milestone = record.job.milestone,
        files = record.deliverables.files.len(),
        anchor = %proof.ciphertext_hash,
        "bundle sealed"
    );

    Ok(SealedBundle {
        envelope,
        proof,
        key,
    })
}

/// Shareable description of a sealed bundle: proof, envelope and whether the
/// seller's own decrypt check passed. Has no key field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleSummary {
    pub proof: ProofRecord,
    pub envelope: EncryptedEnvelope,
    pub decrypt_ok: bool,
    pub note: String,
}

impl BundleSummary {
    pub fn from_sealed(bundle: &SealedBundle) -> Self {
        Self {
            proof: bundle.proof.clone(),
            envelope: bundle.envelope.clone(),
            decrypt_ok: bundle.self_check().is_verified(),
            note: "Anchor ciphertextHash on the ledger. The buyer verifies by decrypting and \
                   recomputing plaintextHash. The key travels separately."
                .into(),
        }
    }
}
