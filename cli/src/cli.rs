//! # CLI Interface
//!
//! Defines the command-line argument structure for `tessera` using `clap`
//! derive. Subcommands: `demo`, `seal`, `verify`, `digest` and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Tessera delivery receipts.
///
/// Seals a deliverable record into an encrypted envelope plus a proof
/// record whose ciphertext hash is what goes on the ledger, and verifies a
/// delivered envelope against that proof.
#[derive(Parser, Debug)]
#[command(
    name = "tessera",
    about = "Seal and verify private delivery receipts",
    version,
    propagate_version = true
)]
pub struct TesseraCli {
    /// Log output format: `pretty` or `json`.
    #[arg(
        long,
        global = true,
        env = "TESSERA_LOG_FORMAT",
        default_value = "pretty",
        value_parser = parse_log_format
    )]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the `tessera` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Seal the built-in sample record and write a shareable bundle summary.
    Demo(DemoArgs),
    /// Seal a record read from a JSON file.
    Seal(SealArgs),
    /// Decrypt an envelope and check it against its proof record.
    Verify(VerifyArgs),
    /// Print the SHA-256 of a record file's canonical form.
    Digest(DigestArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `demo` subcommand.
#[derive(Parser, Debug)]
pub struct DemoArgs {
    /// Directory that receives `encrypted-bundle.sample.json`.
    #[arg(long, short = 'o', env = "TESSERA_OUT_DIR", default_value = ".")]
    pub out_dir: PathBuf,
}

/// Arguments for the `seal` subcommand.
#[derive(Parser, Debug)]
pub struct SealArgs {
    /// Deliverable record as JSON. Field order does not matter.
    #[arg(long, short = 'r')]
    pub record: PathBuf,

    /// Directory for the envelope, proof and key files.
    ///
    /// Created if it does not exist.
    #[arg(long, short = 'o', env = "TESSERA_OUT_DIR", default_value = ".")]
    pub out_dir: PathBuf,
}

/// Arguments for the `verify` subcommand.
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Envelope JSON as written by `seal`.
    #[arg(long, short = 'e')]
    pub envelope: PathBuf,

    /// Proof record JSON as written by `seal`.
    #[arg(long, short = 'p')]
    pub proof: PathBuf,

    /// File holding the base64 symmetric key.
    #[arg(long, short = 'k')]
    pub key: PathBuf,
}

/// Arguments for the `digest` subcommand.
#[derive(Parser, Debug)]
pub struct DigestArgs {
    /// Deliverable record as JSON.
    pub file: PathBuf,
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    match s.to_ascii_lowercase().as_str() {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("unknown log format '{other}', expected pretty or json")),
    }
}
