use anyhow::{Context, Result};

use super::RunContext;

pub fn execute(ctx: &RunContext) -> Result<()> {
    let total = ctx
        .provider()
        .count_accounts()
        .context("Failed to count accounts")?;
    println!("{}", total);
    Ok(())
}
