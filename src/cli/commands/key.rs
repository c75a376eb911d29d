//! Key Command
//!
//! Saves the analysis service API key in the local store. A saved key takes
//! precedence over `analysis.api_key` and `PROMPTLENS_API_KEY`.

use serde_json::Value;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, mask_key};
use crate::constants::settings;
use crate::types::{LensError, Result};

pub async fn set(key: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        return Err(LensError::Config("API key must not be empty".to_string()));
    }

    let ctx = CommandContext::load()?;
    ctx.store.set_one(settings::API_KEY, Value::from(key)).await?;
    Output::new().success(&format!("Saved API key {}", mask_key(key)));
    Ok(())
}

pub async fn show() -> Result<()> {
    let ctx = CommandContext::load()?;
    let output = Output::new();

    match ctx.saved_api_key().await? {
        Some(key) => output.info(&format!("Saved API key: {}", mask_key(&key))),
        None => output.info("No API key saved"),
    }
    Ok(())
}

pub async fn clear() -> Result<()> {
    let ctx = CommandContext::load()?;
    ctx.store.remove(&[settings::API_KEY.to_string()]).await?;
    Output::new().success("Removed saved API key");
    Ok(())
}
