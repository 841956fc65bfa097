//! # Delivery Disputes
//!
//! A buyer who doubts a delivery opens a dispute against the bundle's
//! anchored ciphertext hash. Both sides submit evidence, an arbiter is
//! assigned, and the seller escrows the bundle key to that arbiter. Once the
//! bond registry attests that the release condition holds, the arbiter
//! recovers the key and checks the envelope against the receipt.
//!
//! ## Resolution Flow
//!
//! 1. The buyer opens a dispute on an anchored bundle.
//! 2. Either party submits evidence (digest + description).
//! 3. An arbiter is assigned; the seller calls [`Dispute::escrow_key`].
//! 4. Bonds are posted and attested by the [`crate::bond::BondRegistry`].
//! 5. The arbiter calls [`Dispute::arbitrate`]. Content that verifies
//!    against the receipt rules for the seller; anything else rules for the
//!    buyer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use tessera_protocol::anchor::{ContentDigest, ProofRecord};
use tessera_protocol::crypto::{EncryptedEnvelope, SymmetricKey};
use tessera_protocol::escrow::{
    self, ArbiterIdentity, ArbiterKeypair, ArbiterPublicKey, BondPolicy, ConditionProof,
    DisputeEscrow, EscrowError, EscrowTicket, ReleaseCondition,
};
use tessera_protocol::verify::{verify_against_proof, Verification};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during dispute operations.
#[derive(Debug, Error)]
pub enum ArbitrationError {
    /// The dispute is not in a state that allows this operation.
    #[error("invalid state: dispute is {current}, expected {expected}")]
    InvalidState { current: String, expected: String },

    /// The caller is not allowed to perform this operation.
    #[error("unauthorized: {party} may not do this")]
    Unauthorized { party: String },

    #[error("no arbiter assigned")]
    NoArbiter,

    #[error("bundle key has not been escrowed")]
    NoTicket,

    /// Posting this bond would overflow the running total.
    #[error("bond total overflow")]
    BondOverflow,

    /// The receipt presented does not anchor the disputed bundle.
    #[error("receipt anchors {presented}, dispute is about {disputed}")]
    AnchorMismatch {
        disputed: ContentDigest,
        presented: ContentDigest,
    },

    /// The receipt's plaintext digest is not the one the seller committed
    /// to when escrowing the key. No ruling is made on a contested receipt.
    #[error("contested receipt: seller committed to {committed}, receipt claims {presented}")]
    ContestedReceipt {
        committed: ContentDigest,
        presented: ContentDigest,
    },

    #[error(transparent)]
    Escrow(#[from] EscrowError),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeStatus {
    /// Opened, no evidence yet.
    Open,
    /// At least one piece of evidence submitted.
    UnderReview,
    /// The delivered content failed verification.
    ResolvedForBuyer,
    /// The delivered content matched the receipt.
    ResolvedForSeller,
    /// Withdrawn by the buyer before resolution.
    Cancelled,
}

impl DisputeStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, DisputeStatus::Open | DisputeStatus::UnderReview)
    }
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisputeStatus::Open => write!(f, "Open"),
            DisputeStatus::UnderReview => write!(f, "UnderReview"),
            DisputeStatus::ResolvedForBuyer => write!(f, "ResolvedForBuyer"),
            DisputeStatus::ResolvedForSeller => write!(f, "ResolvedForSeller"),
            DisputeStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// The arbiter's ruling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ruling {
    ForBuyer,
    ForSeller,
}

/// A piece of evidence. The payload lives off-ledger; only its digest is
/// recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub submitted_by: String,
    pub description: String,
    pub data_hash: ContentDigest,
    pub timestamp: DateTime<Utc>,
}

/// What the arbiter found when checking the delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub ruling: Ruling,
    /// Failure reason, if verification failed.
    pub detail: Option<String>,
    /// Plaintext digest the receipt promised.
    pub promised: ContentDigest,
}

/// A dispute over one anchored bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    pub id: String,
    /// The ledger-anchored ciphertext hash of the disputed bundle.
    pub bundle_anchor: ContentDigest,
    pub buyer: String,
    pub seller: String,
    pub reason: String,
    pub evidence: Vec<Evidence>,
    pub arbiter: Option<ArbiterIdentity>,
    pub ticket: Option<EscrowTicket>,
    /// Plaintext digest the seller committed to alongside the ticket.
    pub committed_plaintext: Option<ContentDigest>,
    pub finding: Option<Finding>,
    pub status: DisputeStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Dispute {
    /// Open a dispute. The buyer is the initiator.
    pub fn open(
        bundle_anchor: ContentDigest,
        buyer: impl Into<String>,
        seller: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let dispute = Self {
            id: Uuid::new_v4().to_string(),
            bundle_anchor,
            buyer: buyer.into(),
            seller: seller.into(),
            reason: reason.into(),
            evidence: Vec::new(),
            arbiter: None,
            ticket: None,
            committed_plaintext: None,
            finding: None,
            status: DisputeStatus::Open,
            created_at: Utc::now(),
            resolved_at: None,
        };
        tracing::info!(dispute = %dispute.id, anchor = %bundle_anchor, "dispute opened");
        dispute
    }

    pub fn is_party(&self, who: &str) -> bool {
        who == self.buyer || who == self.seller
    }

    fn require_active(&self) -> Result<(), ArbitrationError> {
        if self.status.is_active() {
            Ok(())
        } else {
            Err(ArbitrationError::InvalidState {
                current: self.status.to_string(),
                expected: "Open or UnderReview".into(),
            })
        }
    }

    /// Record a piece of evidence. Only the buyer or seller may submit.
    ///
    /// The first submission moves the dispute to `UnderReview`.
    pub fn submit_evidence(
        &mut self,
        party: &str,
        description: impl Into<String>,
        data_hash: ContentDigest,
    ) -> Result<(), ArbitrationError> {
        if !self.is_party(party) {
            return Err(ArbitrationError::Unauthorized {
                party: party.to_string(),
            });
        }
        self.require_active()?;

        self.evidence.push(Evidence {
            submitted_by: party.to_string(),
            description: description.into(),
            data_hash,
            timestamp: Utc::now(),
        });
        if self.status == DisputeStatus::Open {
            self.status = DisputeStatus::UnderReview;
        }
        Ok(())
    }

    /// Assign the arbiter. Replacing an arbiter after the key was escrowed
    /// is refused: the ticket is bound to the first one.
    pub fn assign_arbiter(
        &mut self,
        arbiter_id: impl Into<String>,
        public_key: ArbiterPublicKey,
    ) -> Result<(), ArbitrationError> {
        self.require_active()?;
        if self.ticket.is_some() {
            return Err(ArbitrationError::InvalidState {
                current: "key escrowed".into(),
                expected: "no escrow ticket".into(),
            });
        }
        let arbiter = ArbiterIdentity {
            id: arbiter_id.into(),
            public_key,
        };
        tracing::info!(dispute = %self.id, arbiter = %arbiter.id, "arbiter assigned");
        self.arbiter = Some(arbiter);
        Ok(())
    }

    /// Wrap the bundle key to the assigned arbiter and keep the ticket.
    ///
    /// `promised` is the seller's `plaintextHash` for the bundle. It is
    /// fixed here, before the arbiter sees any receipt, because the ledger
    /// only anchors the ciphertext hash.
    pub fn escrow_key(
        &mut self,
        key: &SymmetricKey,
        promised: ContentDigest,
        policy: BondPolicy,
        condition: ReleaseCondition,
    ) -> Result<&EscrowTicket, ArbitrationError> {
        self.require_active()?;
        let arbiter = self.arbiter.as_ref().ok_or(ArbitrationError::NoArbiter)?;
        let ticket = escrow::wrap(key, arbiter, policy, condition)?;
        self.committed_plaintext = Some(promised);
        Ok(&*self.ticket.insert(ticket))
    }

    /// Recover the key through `escrow`, check the envelope against the
    /// buyer's receipt, and rule.
    ///
    /// A policy violation leaves the dispute untouched so the arbiter can
    /// retry once the bond is posted.
    pub fn arbitrate(
        &mut self,
        escrow: &DisputeEscrow,
        arbiter_secret: &ArbiterKeypair,
        condition_proof: Option<&ConditionProof>,
        envelope: &EncryptedEnvelope,
        receipt: &ProofRecord,
    ) -> Result<Ruling, ArbitrationError> {
        self.require_active()?;
        if *receipt.anchor_hash() != self.bundle_anchor {
            return Err(ArbitrationError::AnchorMismatch {
                disputed: self.bundle_anchor,
                presented: *receipt.anchor_hash(),
            });
        }
        let ticket = self.ticket.as_ref().ok_or(ArbitrationError::NoTicket)?;
        let committed = self.committed_plaintext.ok_or(ArbitrationError::NoTicket)?;
        if receipt.plaintext_hash != committed {
            tracing::warn!(
                dispute = %self.id,
                %committed,
                presented = %receipt.plaintext_hash,
                "receipt contradicts the seller's commitment"
            );
            return Err(ArbitrationError::ContestedReceipt {
                committed,
                presented: receipt.plaintext_hash,
            });
        }
        let key = escrow.reveal(ticket, arbiter_secret, condition_proof)?;

        let (ruling, detail) = match verify_against_proof(envelope, &key, receipt) {
            Verification::Verified { .. } => (Ruling::ForSeller, None),
            Verification::Failed(reason) => (Ruling::ForBuyer, Some(reason.to_string())),
        };

        self.status = match ruling {
            Ruling::ForBuyer => DisputeStatus::ResolvedForBuyer,
            Ruling::ForSeller => DisputeStatus::ResolvedForSeller,
        };
        self.resolved_at = Some(Utc::now());
        self.finding = Some(Finding {
            ruling,
            detail,
            promised: committed,
        });
        tracing::info!(dispute = %self.id, ?ruling, "dispute resolved");
        Ok(ruling)
    }

    /// Withdraw the dispute. Only the buyer, only before resolution.
    pub fn cancel(&mut self, caller: &str) -> Result<(), ArbitrationError> {
        if caller != self.buyer {
            return Err(ArbitrationError::Unauthorized {
                party: caller.to_string(),
            });
        }
        self.require_active()?;
        self.status = DisputeStatus::Cancelled;
        self.resolved_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_protocol::anchor::digest_bytes;

    fn open() -> Dispute {
        Dispute::open(digest_bytes(b"ciphertext"), "buyer_pk", "seller_pk", "files missing")
    }

    #[test]
    fn new_dispute_is_open() {
        let d = open();
        assert_eq!(d.status, DisputeStatus::Open);
        assert!(d.evidence.is_empty());
        assert!(d.arbiter.is_none());
        assert!(d.resolved_at.is_none());
    }

    #[test]
    fn evidence_moves_to_under_review() {
        let mut d = open();
        d.submit_evidence("buyer_pk", "chat log", digest_bytes(b"log"))
            .unwrap();
        assert_eq!(d.status, DisputeStatus::UnderReview);
        d.submit_evidence("seller_pk", "upload receipt", digest_bytes(b"rcpt"))
            .unwrap();
        assert_eq!(d.evidence.len(), 2);
    }

    #[test]
    fn outsiders_cannot_submit_evidence() {
        let mut d = open();
        assert!(matches!(
            d.submit_evidence("random_pk", "doc", digest_bytes(b"x")),
            Err(ArbitrationError::Unauthorized { .. })
        ));
    }

    #[test]
    fn escrow_requires_an_arbiter() {
        let mut d = open();
        let policy = BondPolicy {
            minimum_bond: 0,
            attestor: tessera_protocol::escrow::AttestorKey::from_bytes([1; 32]),
        };
        assert!(matches!(
            d.escrow_key(
                &SymmetricKey::generate(),
                digest_bytes(b"promised"),
                policy,
                ReleaseCondition::BondPosted
            ),
            Err(ArbitrationError::NoArbiter)
        ));
    }

    #[test]
    fn only_buyer_can_cancel() {
        let mut d = open();
        assert!(d.cancel("seller_pk").is_err());
        d.cancel("buyer_pk").unwrap();
        assert_eq!(d.status, DisputeStatus::Cancelled);
        assert!(d.cancel("buyer_pk").is_err());
    }

    #[test]
    fn cancelled_dispute_takes_no_evidence() {
        let mut d = open();
        d.cancel("buyer_pk").unwrap();
        assert!(matches!(
            d.submit_evidence("buyer_pk", "late", digest_bytes(b"x")),
            Err(ArbitrationError::InvalidState { .. })
        ));
    }
}
