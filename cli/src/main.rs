// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Tessera CLI
//!
//! Entry point for the `tessera` binary. Parses arguments, initializes
//! logging and runs one subcommand:
//!
//! - `demo`    : seal the sample record, write a key-free bundle summary
//! - `seal`    : seal a record file into envelope, proof and key files
//! - `verify`  : decrypt an envelope and check it against its proof
//! - `digest`  : print the canonical SHA-256 of a record file
//! - `version` : print build version information

mod cli;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;

use cli::{Commands, TesseraCli};

const DEFAULT_LOG_FILTER: &str = "tessera_cli=info,tessera_protocol=info";

fn main() -> Result<()> {
    let cli = TesseraCli::parse();

    if let Commands::Version = cli.command {
        print_version();
        return Ok(());
    }

    logging::init_logging(DEFAULT_LOG_FILTER, cli.log_format);

    match cli.command {
        Commands::Demo(args) => {
            let out = commands::demo(&args.out_dir)?;
            println!("Sample bundle written.");
            println!("  Summary     : {}", out.summary_path.display());
            println!("  Decrypt ok  : {}", out.decrypt_ok);
            println!("  Anchor hash : {}", out.anchor);
            Ok(())
        }
        Commands::Seal(args) => {
            let out = commands::seal(&args.record, &args.out_dir)?;
            println!("Record sealed.");
            println!("  Envelope    : {}", out.envelope_path.display());
            println!("  Proof       : {}", out.proof_path.display());
            println!("  Key         : {} (send separately)", out.key_path.display());
            println!("  Anchor hash : {}", out.anchor);
            Ok(())
        }
        Commands::Verify(args) => {
            let record = commands::verify(&args.envelope, &args.proof, &args.key)?;
            println!(
                "verified: job {} milestone {} ({} files)",
                record.job.id,
                record.job.milestone,
                record.deliverables.files.len()
            );
            Ok(())
        }
        Commands::Digest(args) => {
            println!("{}", commands::digest_file(&args.file)?);
            Ok(())
        }
        Commands::Version => Ok(()),
    }
}

/// Prints version information to stdout.
fn print_version() {
    println!("tessera  {}", env!("CARGO_PKG_VERSION"));
    println!("protocol {}", tessera_protocol::config::PROTOCOL_VERSION);
    println!("aead     {}", tessera_protocol::config::AEAD_V1_TAG);
}
