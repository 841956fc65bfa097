//! # Ledger Submission
//!
//! The core computes the anchor; something else publishes it. This module
//! is the narrow interface to that something else, plus the retry loop the
//! caller wraps around it.
//!
//! Only [`LedgerError::Unavailable`] is retried. A rejection is final, and
//! nothing cryptographic is ever retried here.

use std::fmt;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::anchor::ContentDigest;
use crate::config::{LEDGER_BASE_DELAY, LEDGER_MAX_DELAY, LEDGER_MAX_RETRIES};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Identifier the ledger assigns to an anchoring transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Transient: the ledger could not be reached or is overloaded.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger refused the submission. Retrying will not help.
    #[error("ledger rejected submission: {0}")]
    Rejected(String),
}

impl LedgerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Unavailable(_))
    }
}

/// Anything that can publish an anchor hash.
pub trait LedgerSubmitter {
    fn submit(&self, hash: &ContentDigest) -> Result<TransactionId, LedgerError>;
}

impl<T: LedgerSubmitter + ?Sized> LedgerSubmitter for &T {
    fn submit(&self, hash: &ContentDigest) -> Result<TransactionId, LedgerError> {
        (**self).submit(hash)
    }
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// Exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: LEDGER_MAX_RETRIES,
            base_delay: LEDGER_BASE_DELAY,
            max_delay: LEDGER_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Submit `hash`, sleeping between retries of `Unavailable` errors.
pub fn submit_with_backoff<S: LedgerSubmitter>(
    submitter: &S,
    hash: &ContentDigest,
    policy: &RetryPolicy,
) -> Result<TransactionId, LedgerError> {
    submit_with_backoff_using(submitter, hash, policy, thread::sleep)
}

/// [`submit_with_backoff`] with an injectable sleep, for callers that
/// schedule delays themselves.
pub fn submit_with_backoff_using<S, F>(
    submitter: &S,
    hash: &ContentDigest,
    policy: &RetryPolicy,
    mut sleep: F,
) -> Result<TransactionId, LedgerError>
where
    S: LedgerSubmitter,
    F: FnMut(Duration),
{
    let mut attempt = 0;
    loop {
        match submitter.submit(hash) {
            Ok(tx) => {
                tracing::debug!(%hash, tx = %tx, attempts = attempt + 1, "anchor submitted");
                return Ok(tx);
            }
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    "ledger submission failed, retrying in {delay:?}: {e}"
                );
                sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// InMemoryLedger
// ---------------------------------------------------------------------------

/// One anchored hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub transaction_id: TransactionId,
    pub hash: ContentDigest,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct LedgerState {
    entries: Vec<LedgerEntry>,
    fail_next: u32,
}

/// Append-only in-process ledger for tests and the CLI demo.
///
/// Submitting a hash that is already anchored returns the original
/// transaction id.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` submissions fail with `Unavailable`.
    pub fn fail_next(&self, n: u32) {
        self.state.lock().fail_next = n;
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.state.lock().entries.clone()
    }

    pub fn lookup(&self, hash: &ContentDigest) -> Option<LedgerEntry> {
        self.state
            .lock()
            .entries
            .iter()
            .find(|e| e.hash == *hash)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LedgerSubmitter for InMemoryLedger {
    fn submit(&self, hash: &ContentDigest) -> Result<TransactionId, LedgerError> {
        let mut state = self.state.lock();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(LedgerError::Unavailable("simulated outage".into()));
        }
        if let Some(existing) = state.entries.iter().find(|e| e.hash == *hash) {
            return Ok(existing.transaction_id.clone());
        }
        let transaction_id = TransactionId(format!("tx-{:08}", state.entries.len() + 1));
        state.entries.push(LedgerEntry {
            transaction_id: transaction_id.clone(),
            hash: *hash,
            recorded_at: Utc::now(),
        });
        Ok(transaction_id)
    }
}
