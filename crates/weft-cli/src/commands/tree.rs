//! Handler for `weft tree`.

use miette::Result;
use weft_ops::ops_tree::{self, TreeOptions};

pub async fn exec(depth: Option<usize>) -> Result<()> {
    let project_root = super::project_root()?;
    let rendered = ops_tree::tree(&project_root, &TreeOptions { depth }).await?;
    print!("{rendered}");
    Ok(())
}
