//! Audited reveals.
//!
//! [`DisputeEscrow`] records the first successful reveal of each ticket as a
//! [`DisclosureGrant`]. Later reveals that still satisfy the condition get
//! the same key back and leave the log untouched.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::policy::ConditionProof;
use super::ticket::{EscrowTicket, TicketId};
use super::{reveal, EscrowError};
use crate::anchor::ContentDigest;
use crate::crypto::kem::ArbiterKeypair;
use crate::crypto::keys::SymmetricKey;

/// Audit record of one ticket's disclosure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisclosureGrant {
    pub ticket_id: TicketId,
    pub arbiter_id: String,
    pub wrapped_key_digest: ContentDigest,
    /// Bond amount in the proof that unlocked the ticket.
    pub bond_posted: u64,
    pub granted_at: DateTime<Utc>,
}

/// Thread-safe disclosure log keyed by ticket.
#[derive(Debug, Default)]
pub struct DisputeEscrow {
    grants: DashMap<TicketId, DisclosureGrant>,
}

impl DisputeEscrow {
    pub fn new() -> Self {
        Self::default()
    }

    /// [`reveal`] and record the grant if this is the ticket's first
    /// successful disclosure.
    pub fn reveal(
        &self,
        ticket: &EscrowTicket,
        arbiter_secret: &ArbiterKeypair,
        proof: Option<&ConditionProof>,
    ) -> Result<SymmetricKey, EscrowError> {
        let key = reveal(ticket, arbiter_secret, proof)?;

        let ticket_id = ticket.ticket_id();
        self.grants.entry(ticket_id).or_insert_with(|| {
            tracing::info!(ticket = %ticket_id, arbiter = %ticket.arbiter_id(), "disclosure granted");
            DisclosureGrant {
                ticket_id,
                arbiter_id: ticket.arbiter_id().to_owned(),
                wrapped_key_digest: ticket.wrapped_key_digest(),
                bond_posted: proof.map(|p| p.bond_posted).unwrap_or(0),
                granted_at: Utc::now(),
            }
        });
        Ok(key)
    }

    pub fn grant(&self, ticket_id: &TicketId) -> Option<DisclosureGrant> {
        self.grants.get(ticket_id).map(|g| g.value().clone())
    }

    /// All grants, oldest first.
    pub fn grants(&self) -> Vec<DisclosureGrant> {
        let mut all: Vec<_> = self.grants.iter().map(|g| g.value().clone()).collect();
        all.sort_by(|a, b| {
            a.granted_at
                .cmp(&b.granted_at)
                .then_with(|| a.ticket_id.cmp(&b.ticket_id))
        });
        all
    }

    pub fn is_disclosed(&self, ticket_id: &TicketId) -> bool {
        self.grants.contains_key(ticket_id)
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escrow::{wrap, ArbiterIdentity, AttestorKey, BondPolicy, ReleaseCondition};
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;
    use std::sync::Arc;
    use std::thread;

    fn ticket() -> (SymmetricKey, ArbiterKeypair, SigningKey, EscrowTicket) {
        let key = SymmetricKey::generate();
        let arbiter = ArbiterKeypair::generate();
        let attestor = SigningKey::generate(&mut OsRng);
        let ticket = wrap(
            &key,
            &ArbiterIdentity {
                id: "arb-1".into(),
                public_key: arbiter.public_key(),
            },
            BondPolicy {
                minimum_bond: 10,
                attestor: AttestorKey::from_verifying_key(&attestor.verifying_key()),
            },
            ReleaseCondition::BondPosted,
        )
        .unwrap();
        (key, arbiter, attestor, ticket)
    }

    #[test]
    fn repeated_reveal_adds_one_grant() {
        let (key, arbiter, attestor, ticket) = ticket();
        let proof = ConditionProof::attest(&attestor, ticket.ticket_id(), "arb-1", 10, 0).unwrap();
        let escrow = DisputeEscrow::new();

        let first = escrow.reveal(&ticket, &arbiter, Some(&proof)).unwrap();
        let granted = escrow.grant(&ticket.ticket_id()).unwrap();
        let second = escrow.reveal(&ticket, &arbiter, Some(&proof)).unwrap();

        assert_eq!(first, key);
        assert_eq!(second, key);
        assert_eq!(escrow.len(), 1);
        assert_eq!(escrow.grant(&ticket.ticket_id()).unwrap(), granted);
        assert_eq!(granted.bond_posted, 10);
        assert_eq!(granted.wrapped_key_digest, ticket.wrapped_key_digest());
    }

    #[test]
    fn refused_reveal_records_nothing() {
        let (_, arbiter, _, ticket) = ticket();
        let escrow = DisputeEscrow::new();
        assert!(escrow.reveal(&ticket, &arbiter, None).is_err());
        assert!(escrow.is_empty());
        assert!(!escrow.is_disclosed(&ticket.ticket_id()));
    }

    #[test]
    fn concurrent_reveals_share_one_grant() {
        let (key, arbiter, attestor, ticket) = ticket();
        let proof = ConditionProof::attest(&attestor, ticket.ticket_id(), "arb-1", 50, 0).unwrap();
        let escrow = Arc::new(DisputeEscrow::new());
        let shared = Arc::new((arbiter, ticket, proof));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let escrow = Arc::clone(&escrow);
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    let (arbiter, ticket, proof) = &*shared;
                    escrow.reveal(ticket, arbiter, Some(proof)).unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), key);
        }
        assert_eq!(escrow.grants().len(), 1);
    }
}
