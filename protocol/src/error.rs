use thiserror::Error;

use crate::canonical::CanonicalError;
use crate::crypto::cipher::CipherError;
use crate::crypto::keys::KeyError;
use crate::escrow::EscrowError;
use crate::ledger::LedgerError;
use crate::verify::FailureReason;

/// Umbrella error for callers driving the whole pipeline.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Canonical(#[from] CanonicalError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Escrow(#[from] EscrowError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("verification failed: {0}")]
    Verification(#[from] FailureReason),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
