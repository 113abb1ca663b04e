//! ARRAS Evidence Core: Demo CLI
//!
//! Walks a real-estate deposit contract through the evidence core: hash-chained
//! events, a sealed mandate attestation and an evidentiary certificate.  Uses
//! the in-process mock timestamp authority unless `[tsa] endpoint` is set in
//! the configuration file.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- ledger --export events.json
//!   cargo run -p demo -- verify events.json
//!   cargo run -p demo -- --config arras.toml certificate

mod scenarios;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use arras_contracts::{config::ArrasConfig, error::ArrasResult, ids::ContractId};

use scenarios::Demo;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "demo",
    about = "ARRAS evidence core demo",
    long_about = "Runs ARRAS evidence scenarios showing hash-chained events,\n\
                  fail-closed mandate sealing and fail-open certificate sealing."
)]
struct Cli {
    /// TOML configuration file.  Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the ledger, mandate and certificate scenarios in sequence.
    RunAll,
    /// Append a contract lifecycle and verify its chain.
    Ledger {
        /// Write the resulting events as JSON.
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Create a sealed mandate attestation (and a refused one with the mock).
    Mandate,
    /// Generate sealed and unsealed certificates.
    Certificate,
    /// Verify an exported event list offline.
    Verify {
        /// JSON file written by `ledger --export`.
        events: PathBuf,
        /// Contract the events belong to.
        #[arg(long, default_value = "arr-2026-0117")]
        contract: String,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=info to see every state change.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    match run(cli) {
        Ok(()) => {
            println!();
            println!("Done.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> ArrasResult<()> {
    let config = match &cli.config {
        Some(path) => ArrasConfig::from_file(path)?,
        None => ArrasConfig::default(),
    };

    // Offline verification needs no store or authority.
    let demo = move || Demo::new(config);
    match cli.command {
        Command::RunAll => scenarios::run_all(&demo()?),
        Command::Ledger { export } => scenarios::ledger(&demo()?, export.as_deref()),
        Command::Mandate => scenarios::mandate(&demo()?),
        Command::Certificate => scenarios::certificate(&demo()?),
        Command::Verify { events, contract } => {
            scenarios::verify(&events, &ContractId::new(contract.as_str()))
        }
    }
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("ARRAS Evidence Core");
    println!("===================");
    println!();
    println!("  [1] Every action is an event hashed onto its contract's chain");
    println!("  [2] Mandates are sealed by a timestamp authority or not stored at all");
    println!("  [3] Certificates are always recorded, sealed when the authority answers");
}
