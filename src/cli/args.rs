//! CLI argument definitions using clap
//!
//! Commands:
//! - btrfstxn init --config <path>
//! - btrfstxn write --config <path> <file> [--content <text>]
//! - btrfstxn read --config <path> <file>
//! - btrfstxn remove --config <path> <file>
//! - btrfstxn status --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// btrfstxn - Transactional filesystem layer over btrfs subvolume snapshots
#[derive(Parser, Debug)]
#[command(name = "btrfstxn")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a managed root (runs crash recovery if needed)
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./btrfstxn.json")]
        config: PathBuf,
    },

    /// Write a file inside a write transaction and commit it
    Write {
        /// Path to configuration file
        #[arg(long, default_value = "./btrfstxn.json")]
        config: PathBuf,

        /// Relative filename inside the transaction
        file: String,

        /// Content to write; read from stdin when omitted
        #[arg(long)]
        content: Option<String>,
    },

    /// Read a file through a read-only transaction and print it
    Read {
        /// Path to configuration file
        #[arg(long, default_value = "./btrfstxn.json")]
        config: PathBuf,

        /// Relative filename inside the transaction
        file: String,
    },

    /// Remove a file inside a write transaction and commit it
    Remove {
        /// Path to configuration file
        #[arg(long, default_value = "./btrfstxn.json")]
        config: PathBuf,

        /// Relative filename inside the transaction
        file: String,
    },

    /// Report the on-disk state of the managed root
    Status {
        /// Path to configuration file
        #[arg(long, default_value = "./btrfstxn.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
