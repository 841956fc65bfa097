//! Bond policies, release conditions and the attested proofs that satisfy
//! them.
//!
//! The core does not know how a bond is posted. It trusts one attestor per
//! policy (an Ed25519 key held by the external bond registry) and checks
//! that attestor's signature over a canonical statement:
//!
//! ```text
//! { "arbiterId", "bondPosted", "domain": "tessera/v1/condition-proof",
//!   "observedAt", "ticketId" }
//! ```
//!
//! `observedAt` is the attestor's clock, not ours. That keeps [`evaluate`]
//! a pure function: timeouts are judged against a signed timestamp.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ticket::TicketId;
use super::EscrowError;
use crate::canonical::to_canonical_vec;
use crate::config::{CONDITION_STATEMENT_DOMAIN, SIGNATURE_LENGTH};

/// Ed25519 public key of the party trusted to attest bond postings.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttestorKey(#[serde(with = "crate::encoding::hex_array")] [u8; 32]);

impl AttestorKey {
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self(key.to_bytes())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn verifying_key(&self) -> Option<VerifyingKey> {
        VerifyingKey::from_bytes(&self.0).ok()
    }
}

impl fmt::Debug for AttestorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttestorKey({})", hex::encode(self.0))
    }
}

/// Bond requirements recorded in a ticket at wrap time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BondPolicy {
    /// Smallest posted bond that satisfies a bond condition.
    pub minimum_bond: u64,
    /// Who may attest that the bond was posted.
    pub attestor: AttestorKey,
}

/// When the arbiter may recover the key.
///
/// Times are unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReleaseCondition {
    /// An attested bond of at least `minimum_bond`.
    BondPosted,
    /// Automatic disclosure once the attested time reaches `release_after`.
    TimeoutElapsed {
        #[serde(rename = "releaseAfter")]
        release_after: i64,
    },
    /// Either of the above.
    BondPostedOrTimeout {
        #[serde(rename = "releaseAfter")]
        release_after: i64,
    },
}

/// Why a reveal was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationReason {
    /// No condition proof was supplied.
    MissingProof,
    /// The proof's signature does not verify under the policy's attestor.
    BadAttestation,
    /// The proof was issued for a different ticket.
    TicketMismatch,
    /// The proof names a different arbiter than the ticket.
    ArbiterMismatch,
    /// The supplied arbiter secret does not match the ticket's public key.
    IdentityMismatch,
    BondBelowMinimum { posted: u64, required: u64 },
    TimeoutPending { observed_at: i64, release_after: i64 },
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationReason::MissingProof => f.write_str("no condition proof supplied"),
            ViolationReason::BadAttestation => f.write_str("condition proof attestation invalid"),
            ViolationReason::TicketMismatch => f.write_str("condition proof is for another ticket"),
            ViolationReason::ArbiterMismatch => {
                f.write_str("condition proof is for another arbiter")
            }
            ViolationReason::IdentityMismatch => {
                f.write_str("arbiter key does not match the ticket")
            }
            ViolationReason::BondBelowMinimum { posted, required } => {
                write!(f, "bond {posted} below required minimum {required}")
            }
            ViolationReason::TimeoutPending {
                observed_at,
                release_after,
            } => write!(
                f,
                "release timeout not reached: observed {observed_at}, releases after {release_after}"
            ),
        }
    }
}

/// A signed statement that a bond was posted (or that time has passed) for
/// one ticket and one arbiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionProof {
    pub ticket_id: TicketId,
    pub arbiter_id: String,
    /// Total bond posted so far, in the bond registry's smallest unit.
    pub bond_posted: u64,
    /// Attestor's clock, unix seconds.
    pub observed_at: i64,
    #[serde(with = "crate::encoding::hex_array")]
    pub attestation: [u8; SIGNATURE_LENGTH],
}

impl ConditionProof {
    /// Sign a condition statement. Called by the bond registry, never by
    /// the arbiter.
    pub fn attest(
        attestor: &SigningKey,
        ticket_id: TicketId,
        arbiter_id: impl Into<String>,
        bond_posted: u64,
        observed_at: i64,
    ) -> Result<Self, EscrowError> {
        let arbiter_id = arbiter_id.into();
        let message = statement(&ticket_id, &arbiter_id, bond_posted, observed_at)?;
        let signature: Signature = attestor.sign(&message);
        Ok(Self {
            ticket_id,
            arbiter_id,
            bond_posted,
            observed_at,
            attestation: signature.to_bytes(),
        })
    }

    /// Whether `attestor` signed exactly this statement. Strict verification.
    pub fn is_attested_by(&self, attestor: &AttestorKey) -> bool {
        let Some(key) = attestor.verifying_key() else {
            return false;
        };
        let Ok(message) = statement(
            &self.ticket_id,
            &self.arbiter_id,
            self.bond_posted,
            self.observed_at,
        ) else {
            return false;
        };
        let signature = Signature::from_bytes(&self.attestation);
        key.verify_strict(&message, &signature).is_ok()
    }
}

/// Canonical bytes an attestor signs.
pub fn statement(
    ticket_id: &TicketId,
    arbiter_id: &str,
    bond_posted: u64,
    observed_at: i64,
) -> Result<Vec<u8>, EscrowError> {
    let value = json!({
        "domain": CONDITION_STATEMENT_DOMAIN,
        "ticketId": ticket_id.to_string(),
        "arbiterId": arbiter_id,
        "bondPosted": bond_posted,
        "observedAt": observed_at,
    });
    to_canonical_vec(&value).map_err(|e| EscrowError::Encoding(e.to_string()))
}

/// Check `proof` against a ticket's policy and condition.
///
/// The identity check against the arbiter secret happens in
/// [`super::reveal`]; this function only sees public data.
pub fn evaluate(
    ticket_id: &TicketId,
    arbiter_id: &str,
    policy: &BondPolicy,
    condition: &ReleaseCondition,
    proof: Option<&ConditionProof>,
) -> Result<(), ViolationReason> {
    let proof = proof.ok_or(ViolationReason::MissingProof)?;
    if proof.ticket_id != *ticket_id {
        return Err(ViolationReason::TicketMismatch);
    }
    if proof.arbiter_id != arbiter_id {
        return Err(ViolationReason::ArbiterMismatch);
    }
    if !proof.is_attested_by(&policy.attestor) {
        return Err(ViolationReason::BadAttestation);
    }

    let bond_ok = proof.bond_posted >= policy.minimum_bond;
    let bond_violation = ViolationReason::BondBelowMinimum {
        posted: proof.bond_posted,
        required: policy.minimum_bond,
    };
    match *condition {
        ReleaseCondition::BondPosted if bond_ok => Ok(()),
        ReleaseCondition::BondPosted => Err(bond_violation),
        ReleaseCondition::TimeoutElapsed { release_after } => {
            if proof.observed_at >= release_after {
                Ok(())
            } else {
                Err(ViolationReason::TimeoutPending {
                    observed_at: proof.observed_at,
                    release_after,
                })
            }
        }
        ReleaseCondition::BondPostedOrTimeout { release_after } => {
            if bond_ok || proof.observed_at >= release_after {
                Ok(())
            } else {
                Err(bond_violation)
            }
        }
    }
}
