//! # Dispute Escrow
//!
//! Conditional disclosure of a bundle key to a designated arbiter.
//!
//! [`wrap`] encapsulates the key to the arbiter's X25519 public key and
//! records the bond policy and release condition in an [`EscrowTicket`].
//! [`reveal`] gives the key back only to the holder of the matching secret,
//! and only with a [`ConditionProof`] that satisfies the policy.
//!
//! ## Order of checks in `reveal`
//!
//! 1. The arbiter secret matches the ticket's public key.
//! 2. The condition proof exists, targets this ticket and arbiter, carries a
//!    valid attestation and satisfies the release condition.
//! 3. Only then is the key decapsulated.
//!
//! Policy failures are [`EscrowError::PolicyViolation`] and can be retried
//! once the condition holds. Decapsulation failure is
//! [`EscrowError::Authentication`] and will not change on retry.
//!
//! [`DisputeEscrow`] wraps `reveal` with an audit log of disclosure grants.

mod policy;
mod registry;
mod ticket;

pub use policy::{
    evaluate, statement, AttestorKey, BondPolicy, ConditionProof, ReleaseCondition,
    ViolationReason,
};
pub use registry::{DisclosureGrant, DisputeEscrow};
pub use ticket::{ArbiterIdentity, EscrowTicket, TicketId};

pub use crate::crypto::kem::{ArbiterKeypair, ArbiterPublicKey};

use thiserror::Error;

use crate::crypto::cipher::CipherError;
use crate::crypto::kem::{unwrap_key, wrap_key};
use crate::crypto::keys::SymmetricKey;

/// Errors from the dispute escrow.
#[derive(Debug, Error)]
pub enum EscrowError {
    /// The release condition is not met. Recoverable: satisfy the condition
    /// and retry.
    #[error("escrow policy violation: {0}")]
    PolicyViolation(ViolationReason),

    /// The wrapped key did not decapsulate.
    #[error("escrow authentication failed")]
    Authentication,

    /// The arbiter public key cannot receive a wrapped key.
    #[error("invalid arbiter public key")]
    InvalidArbiterKey,

    #[error("escrow encoding error: {0}")]
    Encoding(String),
}

impl From<ViolationReason> for EscrowError {
    fn from(reason: ViolationReason) -> Self {
        EscrowError::PolicyViolation(reason)
    }
}

/// Wrap `key` so only `arbiter` can recover it, under `policy` and
/// `condition`.
///
/// The caller still holds `key` afterwards and should drop it once the
/// ticket and the buyer's copy are out.
pub fn wrap(
    key: &SymmetricKey,
    arbiter: &ArbiterIdentity,
    policy: BondPolicy,
    condition: ReleaseCondition,
) -> Result<EscrowTicket, EscrowError> {
    let ticket_id = TicketId::new();
    let header = ticket::header_bytes(&ticket_id, arbiter, &policy, &condition)?;
    let wrapped_key = wrap_key(key, &arbiter.public_key, &header).map_err(|e| match e {
        CipherError::EncryptFailed => EscrowError::InvalidArbiterKey,
        _ => EscrowError::Authentication,
    })?;

    tracing::debug!(
        ticket = %ticket_id,
        arbiter = %arbiter.id,
        minimum_bond = policy.minimum_bond,
        "escrow ticket wrapped"
    );

    Ok(EscrowTicket {
        ticket_id,
        arbiter: arbiter.clone(),
        bond_policy: policy,
        release_condition: condition,
        wrapped_key,
    })
}

/// Recover the key from `ticket`.
///
/// Pure: the same inputs always produce the same result, and a successful
/// reveal returns the same key every time.
///
/// # Errors
///
/// - [`EscrowError::PolicyViolation`] when the arbiter secret belongs to a
///   different arbiter, or `proof` is missing, forged, for another ticket or
///   arbiter, or does not meet the release condition.
/// - [`EscrowError::Authentication`] when the wrapped key or any ticket
///   field was tampered with.
pub fn reveal(
    ticket: &EscrowTicket,
    arbiter_secret: &ArbiterKeypair,
    proof: Option<&ConditionProof>,
) -> Result<SymmetricKey, EscrowError> {
    if arbiter_secret.public_key() != ticket.arbiter.public_key {
        tracing::warn!(ticket = %ticket.ticket_id, "reveal refused: arbiter identity mismatch");
        return Err(ViolationReason::IdentityMismatch.into());
    }

    if let Err(reason) = evaluate(
        &ticket.ticket_id,
        &ticket.arbiter.id,
        &ticket.bond_policy,
        &ticket.release_condition,
        proof,
    ) {
        tracing::warn!(ticket = %ticket.ticket_id, %reason, "reveal refused");
        return Err(reason.into());
    }

    let header = ticket::header_bytes(
        &ticket.ticket_id,
        &ticket.arbiter,
        &ticket.bond_policy,
        &ticket.release_condition,
    )?;
    let key = unwrap_key(&ticket.wrapped_key, arbiter_secret, &header).map_err(|_| {
        tracing::warn!(ticket = %ticket.ticket_id, "wrapped key failed to decapsulate");
        EscrowError::Authentication
    })?;

    tracing::debug!(ticket = %ticket.ticket_id, arbiter = %ticket.arbiter.id, "escrow key revealed");
    Ok(key)
}
