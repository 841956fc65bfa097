//! # Bond Registry
//!
//! Tracks bonds posted against disputes and attests them for escrow
//! release. The registry's Ed25519 key is the `attestor` a seller names in
//! the [`BondPolicy`] when escrowing a bundle key; the core's `reveal`
//! trusts nothing else.
//!
//! All amounts are in the registry's smallest unit and use checked
//! arithmetic.

use std::collections::HashMap;

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

use tessera_protocol::escrow::{AttestorKey, BondPolicy, ConditionProof};

use crate::dispute::{ArbitrationError, Dispute};

/// Posted bonds per dispute and party, plus the attestation key.
pub struct BondRegistry {
    signing_key: SigningKey,
    /// dispute id -> party -> amount
    posted: HashMap<String, HashMap<String, u64>>,
}

impl BondRegistry {
    pub fn new() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        Self {
            signing_key,
            posted: HashMap::new(),
        }
    }

    /// Public key to name as the attestor in a [`BondPolicy`].
    pub fn attestor(&self) -> AttestorKey {
        AttestorKey::from_verifying_key(&self.signing_key.verifying_key())
    }

    /// Convenience: a policy requiring `minimum_bond`, attested by this
    /// registry.
    pub fn policy(&self, minimum_bond: u64) -> BondPolicy {
        BondPolicy {
            minimum_bond,
            attestor: self.attestor(),
        }
    }

    /// Add `amount` to `party`'s bond on `dispute`. Returns the dispute's
    /// new total.
    ///
    /// # Errors
    ///
    /// - [`ArbitrationError::Unauthorized`] if `party` is not buyer or seller.
    /// - [`ArbitrationError::InvalidState`] if the dispute is closed.
    /// - [`ArbitrationError::BondOverflow`] if a total would overflow.
    pub fn post_bond(
        &mut self,
        dispute: &Dispute,
        party: &str,
        amount: u64,
    ) -> Result<u64, ArbitrationError> {
        if !dispute.is_party(party) {
            return Err(ArbitrationError::Unauthorized {
                party: party.to_string(),
            });
        }
        if !dispute.status.is_active() {
            return Err(ArbitrationError::InvalidState {
                current: dispute.status.to_string(),
                expected: "Open or UnderReview".into(),
            });
        }

        let current_total = self.total_posted(&dispute.id);
        let new_total = current_total
            .checked_add(amount)
            .ok_or(ArbitrationError::BondOverflow)?;

        let by_party = self.posted.entry(dispute.id.clone()).or_default();
        let slot = by_party.entry(party.to_string()).or_insert(0);
        *slot = slot
            .checked_add(amount)
            .ok_or(ArbitrationError::BondOverflow)?;

        tracing::info!(dispute = %dispute.id, party, amount, total = new_total, "bond posted");
        Ok(new_total)
    }

    /// Total bonded on a dispute across both parties.
    pub fn total_posted(&self, dispute_id: &str) -> u64 {
        self.posted
            .get(dispute_id)
            .map(|by_party| by_party.values().fold(0u64, |acc, v| acc.saturating_add(*v)))
            .unwrap_or(0)
    }

    /// Bond posted by one party.
    pub fn posted_by(&self, dispute_id: &str, party: &str) -> u64 {
        self.posted
            .get(dispute_id)
            .and_then(|by_party| by_party.get(party))
            .copied()
            .unwrap_or(0)
    }

    /// Sign a condition proof for the dispute's escrow ticket at
    /// `observed_at` (unix seconds, this registry's clock).
    pub fn attest(
        &self,
        dispute: &Dispute,
        observed_at: i64,
    ) -> Result<ConditionProof, ArbitrationError> {
        let ticket = dispute.ticket.as_ref().ok_or(ArbitrationError::NoTicket)?;
        let proof = ConditionProof::attest(
            &self.signing_key,
            ticket.ticket_id(),
            ticket.arbiter_id(),
            self.total_posted(&dispute.id),
            observed_at,
        )?;
        Ok(proof)
    }
}

impl Default for BondRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BondRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BondRegistry")
            .field("attestor", &self.attestor())
            .field("disputes", &self.posted.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_protocol::anchor::digest_bytes;

    fn dispute() -> Dispute {
        Dispute::open(digest_bytes(b"ct"), "buyer_pk", "seller_pk", "late")
    }

    #[test]
    fn bonds_accumulate_across_parties() {
        let mut registry = BondRegistry::new();
        let d = dispute();
        assert_eq!(registry.post_bond(&d, "buyer_pk", 300).unwrap(), 300);
        assert_eq!(registry.post_bond(&d, "seller_pk", 200).unwrap(), 500);
        assert_eq!(registry.post_bond(&d, "buyer_pk", 50).unwrap(), 550);
        assert_eq!(registry.posted_by(&d.id, "buyer_pk"), 350);
        assert_eq!(registry.total_posted(&d.id), 550);
    }

    #[test]
    fn overflow_is_refused() {
        let mut registry = BondRegistry::new();
        let d = dispute();
        registry.post_bond(&d, "buyer_pk", u64::MAX).unwrap();
        assert!(matches!(
            registry.post_bond(&d, "seller_pk", 1),
            Err(ArbitrationError::BondOverflow)
        ));
        assert_eq!(registry.posted_by(&d.id, "seller_pk"), 0);
    }

    #[test]
    fn outsiders_cannot_post() {
        let mut registry = BondRegistry::new();
        assert!(matches!(
            registry.post_bond(&dispute(), "someone", 10),
            Err(ArbitrationError::Unauthorized { .. })
        ));
    }

    #[test]
    fn attest_requires_a_ticket() {
        let registry = BondRegistry::new();
        assert!(matches!(
            registry.attest(&dispute(), 0),
            Err(ArbitrationError::NoTicket)
        ));
    }
}
