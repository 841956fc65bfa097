//! # Verification Engine
//!
//! The buyer-side (and arbiter-side) acceptance check. Decrypt, recompute
//! the plaintext digest, compare to the expected one. Nothing here mutates
//! state, so every check can be repeated with the same result.
//!
//! Outcomes are a typed [`Verification`] rather than a `bool`: a failure
//! carries its reason and the type is `#[must_use]`.

use std::fmt;

use crate::anchor::{digest_bytes, ContentDigest, ProofRecord};
use crate::canonical::{parse_canonical, CanonicalError};
use crate::crypto::cipher::{decrypt, EncryptedEnvelope};
use crate::crypto::keys::SymmetricKey;
use crate::record::DeliverableRecord;

/// Why a verification did not pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Decryption failed: wrong key or tampered envelope.
    AuthFailure,
    /// Decryption succeeded but the plaintext is not the content that was
    /// promised.
    HashMismatch {
        expected: ContentDigest,
        actual: ContentDigest,
    },
    /// The envelope's ciphertext is not the one the proof anchors.
    AnchorMismatch {
        anchored: ContentDigest,
        actual: ContentDigest,
    },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::AuthFailure => {
                f.write_str("authentication failed -- wrong key or tampered envelope")
            }
            FailureReason::HashMismatch { expected, actual } => {
                write!(f, "plaintext hash mismatch: expected {expected}, got {actual}")
            }
            FailureReason::AnchorMismatch { anchored, actual } => {
                write!(f, "ciphertext hash mismatch: anchored {anchored}, got {actual}")
            }
        }
    }
}

impl std::error::Error for FailureReason {}

/// Result of [`verify`].
#[must_use = "a failed verification must be handled"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Verified { plaintext: Vec<u8> },
    Failed(FailureReason),
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::Verified { .. })
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Verification::Verified { .. } => None,
            Verification::Failed(reason) => Some(reason),
        }
    }

    /// The recovered plaintext, or the failure reason.
    pub fn into_result(self) -> Result<Vec<u8>, FailureReason> {
        match self {
            Verification::Verified { plaintext } => Ok(plaintext),
            Verification::Failed(reason) => Err(reason),
        }
    }

    /// Parse verified plaintext back into a record.
    ///
    /// Returns `Ok(None)` for a failed verification. Fails with
    /// [`CanonicalError::NotCanonical`] when the plaintext is a valid record
    /// that was not encoded canonically, which means the seller did not use
    /// [`crate::canonical::canonicalize`] and third parties cannot recompute
    /// its digest.
    pub fn into_record(self) -> Result<Option<DeliverableRecord>, CanonicalError> {
        match self {
            Verification::Verified { plaintext } => parse_canonical(&plaintext).map(Some),
            Verification::Failed(_) => Ok(None),
        }
    }
}

/// Decrypt `envelope` and check its plaintext against `expected`.
///
/// An authentication error becomes `Failed(AuthFailure)`; a digest mismatch
/// becomes `Failed(HashMismatch)`. Digests are compared in constant time.
pub fn verify(
    envelope: &EncryptedEnvelope,
    key: &SymmetricKey,
    expected: &ContentDigest,
) -> Verification {
    let plaintext = match decrypt(envelope, key) {
        Ok(plaintext) => plaintext,
        Err(_) => {
            tracing::warn!(key = %key.fingerprint(), "envelope failed authentication");
            return Verification::Failed(FailureReason::AuthFailure);
        }
    };

    let actual = digest_bytes(&plaintext);
    if actual != *expected {
        tracing::warn!(%expected, %actual, "plaintext hash mismatch");
        return Verification::Failed(FailureReason::HashMismatch {
            expected: *expected,
            actual,
        });
    }

    tracing::debug!(plaintext_hash = %actual, len = plaintext.len(), "envelope verified");
    Verification::Verified { plaintext }
}

/// Check the envelope against a full [`ProofRecord`].
///
/// The ciphertext digest is compared to the anchored value first; a
/// mismatch fails with `AnchorMismatch` without attempting decryption.
pub fn verify_against_proof(
    envelope: &EncryptedEnvelope,
    key: &SymmetricKey,
    proof: &ProofRecord,
) -> Verification {
    let actual = digest_bytes(envelope.ciphertext());
    if actual != proof.ciphertext_hash {
        tracing::warn!(anchored = %proof.ciphertext_hash, %actual, "envelope does not match anchor");
        return Verification::Failed(FailureReason::AnchorMismatch {
            anchored: proof.ciphertext_hash,
            actual,
        });
    }
    if envelope.algorithm_tag() != proof.algorithm_tag {
        return Verification::Failed(FailureReason::AuthFailure);
    }
    verify(envelope, key, &proof.plaintext_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::compute_proof;
    use crate::canonical::canonicalize;
    use crate::crypto::{cipher, NonceRegistry};
    use crate::record::{DeliverableFile, Deliverables, JobRef};

    fn record() -> DeliverableRecord {
        DeliverableRecord::new_bundle(
            1_700_000_000,
            JobRef {
                id: "job-9".into(),
                milestone: 1,
                summary: "landing page".into(),
            },
            Deliverables {
                files: vec![
                    DeliverableFile::from_contents("index.html", b"<html></html>"),
                    DeliverableFile::from_contents("style.css", b"body{}"),
                ],
                notes: "final".into(),
            },
        )
    }

    fn sealed() -> (SymmetricKey, EncryptedEnvelope, ProofRecord) {
        let registry = NonceRegistry::new();
        let record = record();
        let canonical = canonicalize(&record).unwrap();
        let (key, envelope) = cipher::seal(&registry, canonical.as_bytes()).unwrap();
        let proof = compute_proof(&record, &envelope).unwrap();
        (key, envelope, proof)
    }

    #[test]
    fn verified_returns_plaintext() {
        let (key, envelope, proof) = sealed();
        let outcome = verify(&envelope, &key, &proof.plaintext_hash);
        assert!(outcome.is_verified());
        let plaintext = outcome.into_result().unwrap();
        assert_eq!(plaintext, canonicalize(&record()).unwrap().into_bytes());
    }

    #[test]
    fn verify_is_idempotent() {
        let (key, envelope, proof) = sealed();
        let a = verify(&envelope, &key, &proof.plaintext_hash);
        let b = verify(&envelope, &key, &proof.plaintext_hash);
        assert_eq!(a, b);
    }

    #[test]
    fn wrong_key_is_auth_failure() {
        let (_, envelope, proof) = sealed();
        let outcome = verify(&envelope, &SymmetricKey::generate(), &proof.plaintext_hash);
        assert_eq!(outcome.failure(), Some(&FailureReason::AuthFailure));
    }

    #[test]
    fn wrong_expected_hash_is_hash_mismatch() {
        let (key, envelope, proof) = sealed();
        let expected = digest_bytes(b"something else");
        match verify(&envelope, &key, &expected) {
            Verification::Failed(FailureReason::HashMismatch { expected: e, actual }) => {
                assert_eq!(e, expected);
                assert_eq!(actual, proof.plaintext_hash);
            }
            other => panic!("expected HashMismatch, got {other:?}"),
        }
    }

    #[test]
    fn against_proof_accepts_matching_envelope() {
        let (key, envelope, proof) = sealed();
        let record = verify_against_proof(&envelope, &key, &proof)
            .into_record()
            .unwrap()
            .unwrap();
        assert_eq!(record, self::record());
    }

    #[test]
    fn against_proof_rejects_swapped_envelope() {
        let (key, _, proof) = sealed();
        let registry = NonceRegistry::new();
        let other = cipher::encrypt(&registry, &key, b"another bundle", None).unwrap();
        let outcome = verify_against_proof(&other, &key, &proof);
        assert!(matches!(
            outcome,
            Verification::Failed(FailureReason::AnchorMismatch { .. })
        ));
    }

    #[test]
    fn non_canonical_plaintext_is_flagged() {
        let registry = NonceRegistry::new();
        let pretty = serde_json::to_vec_pretty(&record()).unwrap();
        let (key, envelope) = cipher::seal(&registry, &pretty).unwrap();
        let outcome = verify(&envelope, &key, &digest_bytes(&pretty));
        assert!(matches!(
            outcome.into_record(),
            Err(CanonicalError::NotCanonical)
        ));
    }

    #[test]
    fn failed_verification_has_no_record() {
        let outcome = Verification::Failed(FailureReason::AuthFailure);
        assert!(outcome.into_record().unwrap().is_none());
    }

    #[test]
    fn failure_messages_name_the_digests() {
        let reason = FailureReason::HashMismatch {
            expected: digest_bytes(b"a"),
            actual: digest_bytes(b"b"),
        };
        let message = reason.to_string();
        assert!(message.contains(&digest_bytes(b"a").to_hex()));
        assert!(message.contains(&digest_bytes(b"b").to_hex()));
    }
}
