//! # Protocol Configuration & Constants
//!
//! Every magic number in Tessera lives here. If you're hardcoding a constant
//! somewhere else, move it here.
//!
//! Several of these values are baked into ciphertexts and anchored hashes.
//! Changing a context string or algorithm tag after bundles have been anchored
//! makes those bundles unverifiable, so treat this file as a wire format.

use std::time::Duration;

/// Receipt format version. Bump when any wire constant below changes.
pub const PROTOCOL_VERSION: &str = "tessera-receipts/1";

// ---------------------------------------------------------------------------
// Record Format
// ---------------------------------------------------------------------------

/// Default `kind` tag for deliverable records produced by the seller side.
pub const DEFAULT_RECORD_KIND: &str = "deliverable_bundle";

/// Length of a hex-encoded SHA-256 content hash inside a record.
pub const CONTENT_HASH_HEX_LENGTH: usize = 64;

// ---------------------------------------------------------------------------
// Symmetric Encryption
// ---------------------------------------------------------------------------

/// Wire identifier for AES-256-GCM with a 96-bit nonce and 128-bit tag.
/// Also fed to the AEAD as associated data, so relabelling an envelope
/// breaks authentication.
pub const AEAD_V1_TAG: &str = "AEAD-v1";

/// AES-256-GCM key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. Twelve. Not 16.
pub const AES_NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const AES_TAG_LENGTH: usize = 16;

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Hash used for every anchored or disclosed digest.
pub const DIGEST_ALGORITHM: &str = "SHA-256";

/// Digest output length in bytes.
pub const DIGEST_LENGTH: usize = 32;

/// BLAKE3 derive-key context for symmetric key fingerprints. The nonce
/// registry indexes by fingerprint and never sees raw key bytes.
pub const KEY_FINGERPRINT_CONTEXT: &str = "tessera v1 symmetric key fingerprint";

// ---------------------------------------------------------------------------
// Dispute Escrow
// ---------------------------------------------------------------------------

/// Key agreement for wrapping symmetric keys to an arbiter.
pub const KEY_AGREEMENT_ALGORITHM: &str = "X25519";

/// BLAKE3 derive-key context for the key-encryption key of an escrow ticket.
pub const ESCROW_KEK_CONTEXT: &str = "tessera v1 escrow key-encryption key";

/// Domain prefix for the statement a bond attestor signs.
pub const CONDITION_STATEMENT_DOMAIN: &str = "tessera/v1/condition-proof";

/// X25519 public/secret key length in bytes.
pub const X25519_KEY_LENGTH: usize = 32;

/// Ed25519 signature length in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

// ---------------------------------------------------------------------------
// Ledger Submission
// ---------------------------------------------------------------------------

/// Number of retries after the first failed submission.
pub const LEDGER_MAX_RETRIES: u32 = 3;

/// First backoff delay; doubles on every retry (200ms, 400ms, 800ms).
pub const LEDGER_BASE_DELAY: Duration = Duration::from_millis(200);

/// Upper bound on any single backoff delay.
pub const LEDGER_MAX_DELAY: Duration = Duration::from_secs(5);
