// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # dCent CLI
//!
//! Entry point for the `dcent` binary. Parses CLI arguments, initializes
//! logging, opens the sled store in the data directory, runs one command
//! and prints its result as pretty JSON on stdout.
//!
//! - `keygen`, `keys`: local key material
//! - `fund`, `set-balance`, `balance`: collateral balances
//! - `create`, `vote`, `decrypt`, `verify`: bilateral contracts
//! - `list`: every stored contract
//! - `multisig create|sign|break|verify`: multisig contracts
//! - `trust [peer]`: trust scores

mod cli;
mod commands;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;

use cli::DcentCli;
use commands::App;

fn main() -> Result<()> {
    let cli = DcentCli::parse();
    logging::init_logging(logging::DEFAULT_FILTER, cli.log_format);

    let app = App::open(&cli.data_dir)?;
    let output = commands::run(&app, cli.command)?;

    let rendered = serde_json::to_string_pretty(&output).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}
