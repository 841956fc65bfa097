// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Tessera Arbitration
//!
//! The dispute workflow that sits on top of the protocol's escrow:
//!
//! - **Disputes**: a buyer contests an anchored bundle, both sides submit
//!   evidence hashes, an arbiter is assigned and the seller escrows the
//!   bundle key to that arbiter.
//! - **Bonds**: parties post bonds; the registry signs the condition proofs
//!   that unlock escrow tickets.
//! - **Rulings**: the arbiter reveals the key, verifies the envelope against
//!   the buyer's receipt, and rules on what the content shows.
//!
//! ## Design Principles
//!
//! 1. Bond arithmetic is checked. Overflow is an error, never a wrap.
//! 2. State transitions are explicit enum variants.
//! 3. A policy violation leaves a dispute untouched so it can be retried.
//! 4. Every public type is serde-serializable for storage and transport.

pub mod bond;
pub mod dispute;

pub use bond::BondRegistry;
pub use dispute::{ArbitrationError, Dispute, DisputeStatus, Evidence, Finding, Ruling};
