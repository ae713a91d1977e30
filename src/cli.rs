//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Unit agent relation tooling
#[derive(Parser, Debug)]
#[command(name = "uniter")]
#[command(version)]
#[command(about = "Inspect and dry-run a unit agent's relation state")]
#[command(
    long_about = "uniter reads the durable relation records a unit agent keeps on disk and replays the relation hook ordering against a remote snapshot without touching the controller or the disk."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Where the durable relation records live.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct StateSource {
    /// Relations state directory
    #[arg(long)]
    pub relations_dir: Option<PathBuf>,

    /// Agent configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List every durable relation record
    State {
        #[command(flatten)]
        source: StateSource,

        /// Print JSON instead of text
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the hooks that would run to reach a remote snapshot
    Plan {
        #[command(flatten)]
        source: StateSource,

        /// Remote snapshot document (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Only plan this relation
        #[arg(short, long)]
        relation: Option<u64>,

        /// Print JSON instead of text
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}
