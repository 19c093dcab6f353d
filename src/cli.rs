//! Command-line interface for deadwood.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use deadwood::passes::DceStrategy;

#[derive(Parser)]
#[command(name = "deadwood")]
#[command(about = "Liveness analysis and dead code elimination for SSA IR", long_about = None)]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the live-in set of every instruction
    Liveness {
        file: PathBuf,

        /// Skip structural validation
        #[arg(long)]
        no_validate: bool,
    },

    /// Remove dead instructions and print the resulting IR
    Dce {
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = Strategy::Liveness)]
        strategy: Strategy,

        /// Stop after this many rounds even if more code could be removed
        #[arg(long, value_name = "N")]
        max_rounds: Option<usize>,

        /// Print live-in sets to stderr before eliminating
        #[arg(long)]
        print_liveness: bool,

        /// Skip structural validation
        #[arg(long)]
        no_validate: bool,
    },

    /// Parse and validate only
    Check { file: PathBuf },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Strategy {
    Liveness,
    UseChain,
}

impl From<Strategy> for DceStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Liveness => DceStrategy::Liveness,
            Strategy::UseChain => DceStrategy::UseChain,
        }
    }
}
