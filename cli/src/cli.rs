//! # CLI Interface
//!
//! Defines the command-line argument structure for `dcent` using `clap`
//! derive.
//!
//! Peers can be named by their `dcent1…` address or by a keystore label.

use clap::{Args, Parser, Subcommand};
use dcent_contracts::Vote;
use std::path::PathBuf;

use crate::logging::LogFormat;

/// dCent contract ledger.
///
/// Creates and settles bilateral and multisig contracts between local
/// peers, tracks their collateral, and scores peer trust. Every command
/// prints its result as JSON on stdout.
#[derive(Parser, Debug)]
#[command(name = "dcent", about = "dCent contract ledger", version, propagate_version = true)]
pub struct DcentCli {
    /// Directory holding the sled database.
    ///
    /// Created on first use if it does not exist.
    #[arg(
        long,
        short = 'd',
        env = "DCENT_DATA_DIR",
        default_value = ".dcent",
        global = true
    )]
    pub data_dir: PathBuf,

    /// Log output format on stderr.
    #[arg(
        long,
        env = "DCENT_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Pretty,
        global = true
    )]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate and store key material for a new peer.
    Keygen {
        /// Label to refer to the peer by.
        #[arg(long)]
        label: Option<String>,
    },
    /// List stored peers. Secrets are never printed.
    Keys,
    /// Add collateral to a peer's balance.
    Fund(BalanceArgs),
    /// Overwrite a peer's balance.
    SetBalance(BalanceArgs),
    /// Show one peer's balance, or every balance.
    Balance {
        peer: Option<String>,
    },
    /// Create a bilateral contract.
    Create(CreateArgs),
    /// Vote on a bilateral contract as one of its parties.
    Vote {
        contract_id: String,
        peer: String,
        /// `active` (fulfilled) or `broken`.
        vote: Vote,
    },
    /// Decrypt a bilateral contract's content as one of its parties.
    Decrypt { contract_id: String, peer: String },
    /// Check a bilateral contract's signature.
    Verify { contract_id: String },
    /// List every stored contract.
    List,
    /// Multisig contract operations.
    #[command(subcommand)]
    Multisig(MultisigCommands),
    /// Trust scores for one peer, or for every peer with contracts.
    Trust(TrustArgs),
}

/// A peer and an amount.
#[derive(Args, Debug)]
pub struct BalanceArgs {
    pub peer: String,
    pub amount: u64,
}

/// Arguments for `create`.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Author and payer of the collateral.
    #[arg(long)]
    pub from: String,

    /// Counterparty and recipient of the collateral.
    #[arg(long)]
    pub to: String,

    /// Plaintext terms. Stored encrypted.
    #[arg(long)]
    pub content: String,

    /// Nominal value of the agreement.
    #[arg(long, default_value_t = 0)]
    pub amount: u64,

    /// Stake to lock from `--from`. 0 means none.
    #[arg(long, default_value_t = 0)]
    pub collateral: u64,
}

/// Multisig subcommands.
#[derive(Subcommand, Debug)]
pub enum MultisigCommands {
    /// Create a multisig contract.
    Create(MultisigCreateArgs),
    /// Sign a contract's terms, counting as an `active` vote.
    Sign { contract_id: String, peer: String },
    /// Vote `broken` on a contract.
    Break { contract_id: String, peer: String },
    /// Check every recorded signature.
    Verify { contract_id: String },
}

/// Arguments for `multisig create`.
#[derive(Args, Debug)]
pub struct MultisigCreateArgs {
    /// A participant. Repeat for each one; at least two distinct peers.
    #[arg(long = "participant", required = true)]
    pub participants: Vec<String>,

    /// `active` votes needed to activate.
    #[arg(long)]
    pub threshold: usize,

    /// Plaintext terms, readable by every participant.
    #[arg(long)]
    pub content: String,

    #[arg(long, default_value_t = 0)]
    pub amount: u64,

    /// A peer that stakes `--collateral`. Repeatable.
    #[arg(long = "from-peer")]
    pub from_peers: Vec<String>,

    /// A peer paid on activation. Repeatable.
    #[arg(long = "to-peer")]
    pub to_peers: Vec<String>,

    /// Stake per payer. 0 means none.
    #[arg(long, default_value_t = 0)]
    pub collateral: u64,
}

/// Arguments for `trust`. Unset parameters keep their defaults.
#[derive(Args, Debug)]
pub struct TrustArgs {
    pub peer: Option<String>,

    #[arg(long)]
    pub max_trust: Option<u32>,

    #[arg(long)]
    pub k: Option<f64>,

    #[arg(long)]
    pub alpha: Option<f64>,

    #[arg(long)]
    pub beta: Option<f64>,

    #[arg(long)]
    pub gamma: Option<f64>,

    #[arg(long)]
    pub delta: Option<f64>,
}
