// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Tessera Protocol: Core Library
//!
//! Verifiable, privacy-preserving delivery receipts. A seller seals a
//! deliverable record; one 32-byte digest goes on a public ledger; the buyer
//! (or, in a dispute, an arbiter) decrypts and checks the content against it.
//! Nobody else learns what was delivered.
//!
//! ## Pipeline
//!
//! ```text
//! DeliverableRecord ─canonicalize─▶ CanonicalBytes ─encrypt─▶ EncryptedEnvelope
//!                                        │                         │
//!                                        └──────compute_proof──────┘
//!                                                    │
//!                                               ProofRecord ─anchor_hash─▶ ledger
//! ```
//!
//! On the receiving side: `verify` (or `verify_against_proof`) decrypts and
//! recomputes the plaintext digest. The dispute path wraps the bundle key to
//! an arbiter with `escrow::wrap` and releases it with `escrow::reveal`
//! once an attested bond proof satisfies the ticket's policy.
//!
//! ## Modules
//!
//! - **record** / **canonical**: the deliverable record and its unique byte
//!   encoding.
//! - **crypto**: AES-256-GCM envelopes, keys, the nonce registry, X25519 key
//!   wrapping, hashes.
//! - **anchor**: digests and the proof record.
//! - **verify**: the acceptance check.
//! - **escrow**: bonded key disclosure to arbiters.
//! - **ledger**: the submission interface and its retry loop.
//! - **bundle**: the whole seller-side pipeline in one call.
//! - **config**: protocol constants.
//!
//! Every operation is synchronous and CPU-bound. The only shared mutable
//! state is the [`crypto::NonceRegistry`] the caller passes in.

pub mod anchor;
pub mod bundle;
pub mod canonical;
pub mod config;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod escrow;
pub mod ledger;
pub mod record;
pub mod verify;

pub use anchor::{compute_proof, digest, digest_bytes, ContentDigest, ProofRecord};
pub use bundle::{seal_bundle, seal_bundle_once, seal_bundle_with, BundleSummary, SealedBundle};
pub use canonical::{canonicalize, canonicalize_json, CanonicalBytes, CanonicalError};
pub use crypto::{
    decrypt, encrypt, AeadNonce, AlgorithmTag, CipherError, EncryptedEnvelope, NonceRegistry,
    SymmetricKey,
};
pub use error::{ProtocolError, Result};
pub use escrow::{reveal, wrap, DisputeEscrow, EscrowError, EscrowTicket};
pub use ledger::{submit_with_backoff, InMemoryLedger, LedgerError, LedgerSubmitter, TransactionId};
pub use record::{DeliverableFile, DeliverableRecord, Deliverables, JobRef};
pub use verify::{verify, verify_against_proof, FailureReason, Verification};
