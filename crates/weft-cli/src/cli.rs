//! CLI argument definitions for weft.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "weft",
    version,
    about = "Git-first package manager for header-based projects",
    long_about = "Weft resolves dependency versions against a metadata registry, fetches \
                  exact commits from Git, and assembles the headers your compiler needs."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve dependencies, update Weft.lock and assemble headers
    Install {
        /// Install exactly what Weft.lock pins
        #[arg(long)]
        locked: bool,
    },

    /// Display the dependency tree
    Tree {
        /// Maximum depth to display
        #[arg(short, long)]
        depth: Option<usize>,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}
