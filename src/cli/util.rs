//! CLI Common Utilities
//!
//! Shared initialization and context management for CLI commands.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::ai::provider::create_service;
use crate::ai::tokenizer::Tokenizer;
use crate::analysis::PromptAnalyzer;
use crate::cache::ResultCache;
use crate::config::{Config, ConfigLoader};
use crate::constants::settings;
use crate::storage::{SharedStore, open_store};
use crate::types::{LensError, Result};

/// Command execution context
///
/// Loaded configuration plus the opened key-value store. Created via
/// `CommandContext::load()` for commands that touch persisted state.
#[derive(Clone)]
pub struct CommandContext {
    pub config: Config,
    pub store: SharedStore,
}

impl CommandContext {
    pub fn load() -> Result<Self> {
        let config = ConfigLoader::load()?;
        let store = open_store(&config.storage)?;
        Ok(Self { config, store })
    }

    /// API key saved with `key set`, if any
    pub async fn saved_api_key(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get_one(settings::API_KEY)
            .await?
            .and_then(|value| match value {
                Value::String(key) if !key.is_empty() => Some(key),
                _ => None,
            }))
    }

    /// Analyzer wired to the HTTP service, the configured tokenizer and this
    /// context's store
    pub async fn analyzer(&self) -> Result<PromptAnalyzer> {
        let api_key = self.saved_api_key().await?;
        let service = create_service(&self.config.analysis, api_key)?;
        let tokenizer = Arc::new(Tokenizer::new(self.config.analysis.encoding));

        Ok(PromptAnalyzer::new(
            &self.config,
            tokenizer,
            service,
            self.store.clone(),
        ))
    }

    pub fn result_cache(&self) -> ResultCache {
        ResultCache::new(self.store.clone(), self.config.cache.retention())
    }
}

/// Prompt text from the positional argument or `--file`
pub fn read_input(text: Option<String>, file: Option<&Path>) -> Result<String> {
    match (text, file) {
        (Some(_), Some(_)) => Err(LensError::Config(
            "Pass either prompt text or --file, not both".to_string(),
        )),
        (Some(text), None) => Ok(text),
        (None, Some(path)) => Ok(std::fs::read_to_string(path)?),
        (None, None) => Err(LensError::Config(
            "No prompt given: pass text or --file".to_string(),
        )),
    }
}

/// Key shown as its first and last four characters
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}
