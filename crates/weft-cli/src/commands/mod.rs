//! Command dispatch and handler modules.

mod install;
mod tree;

use std::path::PathBuf;

use miette::Result;
use weft_core::manifest::{Manifest, MANIFEST_FILE};
use weft_util::errors::WeftError;

use crate::cli::{Cli, Command};

/// Route a parsed CLI invocation to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Install { locked } => install::exec(locked).await,
        Command::Tree { depth } => tree::exec(depth).await,
    }
}

/// The current directory, provided it holds a manifest.
fn project_root() -> Result<PathBuf> {
    let root = std::env::current_dir().map_err(WeftError::Io)?;
    if !Manifest::exists_in(&root) {
        return Err(WeftError::Manifest {
            message: format!("No {MANIFEST_FILE} found in current directory"),
        }
        .into());
    }
    Ok(root)
}
