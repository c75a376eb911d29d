//! Limit Command
//!
//! Reports (or consumes) today's analysis quota for a fingerprint.

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::gate::{ClientTraits, Fingerprint, QuotaLimiter};
use crate::types::Result;

pub async fn run(fingerprint: Option<String>, consume: bool, json: bool) -> Result<()> {
    let ctx = CommandContext::load()?;
    let quota = QuotaLimiter::new(ctx.store.clone(), ctx.config.gate.daily_limit);

    let fingerprint = fingerprint
        .map(Fingerprint::from_raw)
        .unwrap_or_else(|| Fingerprint::from_traits(&ClientTraits::local()));
    let status = quota.check(&fingerprint, consume).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let output = Output::new();
    let summary = format!(
        "{}: {}/{} analyses used today",
        fingerprint, status.usage, status.limit
    );
    if status.blocked {
        output.warning(&format!("{} (limit reached)", summary));
    } else {
        output.info(&summary);
    }
    Ok(())
}
