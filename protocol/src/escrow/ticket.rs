//! Escrow tickets: a bundle key wrapped to one arbiter, plus the policy
//! that gates its release.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::policy::{BondPolicy, ReleaseCondition};
use super::EscrowError;
use crate::anchor::{digest_bytes, ContentDigest};
use crate::canonical::to_canonical_vec;
use crate::crypto::kem::{ArbiterPublicKey, WrappedKey};

/// Unique ticket identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(Uuid);

impl TicketId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for TicketId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// The arbiter a key is wrapped for: an id assigned by the dispute
/// workflow and the arbiter's X25519 public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbiterIdentity {
    pub id: String,
    pub public_key: ArbiterPublicKey,
}

/// A bundle key wrapped for one arbiter.
///
/// Every field except `wrapped_key` is authenticated as associated data of
/// the wrap, so editing the policy, condition or arbiter after the fact
/// makes [`super::reveal`] fail with `Authentication`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowTicket {
    pub(super) ticket_id: TicketId,
    pub(super) arbiter: ArbiterIdentity,
    pub(super) bond_policy: BondPolicy,
    pub(super) release_condition: ReleaseCondition,
    pub(super) wrapped_key: WrappedKey,
}

impl EscrowTicket {
    pub fn ticket_id(&self) -> TicketId {
        self.ticket_id
    }

    pub fn arbiter_id(&self) -> &str {
        &self.arbiter.id
    }

    pub fn arbiter(&self) -> &ArbiterIdentity {
        &self.arbiter
    }

    pub fn bond_policy(&self) -> &BondPolicy {
        &self.bond_policy
    }

    pub fn release_condition(&self) -> &ReleaseCondition {
        &self.release_condition
    }

    pub fn wrapped_key(&self) -> &WrappedKey {
        &self.wrapped_key
    }

    /// Digest of the wrapped key ciphertext. Identifies the exact disclosure
    /// artifact in audit records without revealing anything.
    pub fn wrapped_key_digest(&self) -> ContentDigest {
        digest_bytes(self.wrapped_key.ciphertext())
    }
}

/// Canonical header bound into the wrap as associated data.
pub(super) fn header_bytes(
    ticket_id: &TicketId,
    arbiter: &ArbiterIdentity,
    policy: &BondPolicy,
    condition: &ReleaseCondition,
) -> Result<Vec<u8>, EscrowError> {
    let value = serde_json::json!({
        "ticketId": ticket_id,
        "arbiter": arbiter,
        "bondPolicy": policy,
        "releaseCondition": condition,
    });
    to_canonical_vec(&value).map_err(|e| EscrowError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escrow::policy::AttestorKey;

    fn identity() -> ArbiterIdentity {
        ArbiterIdentity {
            id: "arb-1".into(),
            public_key: ArbiterPublicKey::from_bytes([9; 32]),
        }
    }

    fn policy() -> BondPolicy {
        BondPolicy {
            minimum_bond: 100,
            attestor: AttestorKey::from_bytes([4; 32]),
        }
    }

    #[test]
    fn ticket_id_parses_back() {
        let id = TicketId::new();
        assert_eq!(id.to_string().parse::<TicketId>().unwrap(), id);
        assert!("not-a-uuid".parse::<TicketId>().is_err());
    }

    #[test]
    fn header_is_deterministic() {
        let id = TicketId::new();
        let a = header_bytes(&id, &identity(), &policy(), &ReleaseCondition::BondPosted).unwrap();
        let b = header_bytes(&id, &identity(), &policy(), &ReleaseCondition::BondPosted).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn header_covers_every_field() {
        let id = TicketId::new();
        let base = header_bytes(&id, &identity(), &policy(), &ReleaseCondition::BondPosted).unwrap();

        let mut other_policy = policy();
        other_policy.minimum_bond = 1;
        let mut other_arbiter = identity();
        other_arbiter.id = "arb-2".into();

        let variants = [
            header_bytes(&TicketId::new(), &identity(), &policy(), &ReleaseCondition::BondPosted),
            header_bytes(&id, &other_arbiter, &policy(), &ReleaseCondition::BondPosted),
            header_bytes(&id, &identity(), &other_policy, &ReleaseCondition::BondPosted),
            header_bytes(
                &id,
                &identity(),
                &policy(),
                &ReleaseCondition::TimeoutElapsed { release_after: 0 },
            ),
        ];
        for variant in variants {
            assert_ne!(variant.unwrap(), base);
        }
    }
}
