//! Cache Command
//!
//! Inspect and maintain the analysis result cache.
//!
//! Usage:
//!   promptlens cache stats [--json]
//!   promptlens cache sweep
//!   promptlens cache clear

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::Result;

pub async fn stats(json: bool) -> Result<()> {
    let ctx = CommandContext::load()?;
    let stats = ctx.result_cache().stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let output = Output::new();
    output.section("Result Cache");
    println!("  Entries:   {}", stats.entries);
    println!(
        "  Expired:   {} (retention {} days)",
        stats.expired, ctx.config.cache.retention_days
    );
    if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
        println!("  Oldest:    {}", oldest.format("%Y-%m-%d %H:%M UTC"));
        println!("  Newest:    {}", newest.format("%Y-%m-%d %H:%M UTC"));
    }
    if !ctx.config.cache.enabled {
        output.warning("Caching is disabled in configuration");
    }
    Ok(())
}

pub async fn sweep() -> Result<()> {
    let ctx = CommandContext::load()?;
    let removed = ctx.result_cache().sweep().await?;
    Output::new().success(&format!("Removed {} expired cache entries", removed));
    Ok(())
}

pub async fn clear() -> Result<()> {
    let ctx = CommandContext::load()?;
    let removed = ctx.result_cache().clear().await?;

    let output = Output::new();
    if removed > 0 {
        output.success(&format!("Cleared {} cache entries", removed));
    } else {
        output.info("No cache entries to clear");
    }
    Ok(())
}
