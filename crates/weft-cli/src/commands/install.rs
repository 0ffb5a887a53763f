//! Handler for `weft install`.

use miette::Result;
use weft_core::manifest::IncludeMode;
use weft_ops::ops_install::{self, InstallOptions};

pub async fn exec(locked: bool) -> Result<()> {
    let project_root = super::project_root()?;
    let report = ops_install::install(&project_root, &InstallOptions { locked }).await?;

    print!("{}", report.tree);
    let what = match report.assembly.mode {
        IncludeMode::Flat => "flat header",
        IncludeMode::Include => "mirrored header",
    };
    let count = report.assembly.outputs.len();
    println!(
        "{} {count} {what}{}",
        console::style("Generated").green().bold(),
        if count == 1 { "" } else { "s" }
    );
    Ok(())
}
