//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/promptlens/) and project (.promptlens/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{cache, gate, network, planner};
use crate::types::{LensError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Token thresholds for chunk planning
    pub planner: PlannerConfig,

    /// Analysis service settings
    pub analysis: AnalysisConfig,

    /// Rate and quota gate settings
    pub gate: GateConfig,

    /// Result cache settings
    pub cache: CacheConfig,

    /// Persistence settings
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            planner: PlannerConfig::default(),
            analysis: AnalysisConfig::default(),
            gate: GateConfig::default(),
            cache: CacheConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `LensError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        self.planner.validate()?;

        if !(0.0..=2.0).contains(&self.analysis.temperature) {
            return Err(LensError::Config(format!(
                "Analysis temperature must be between 0.0 and 2.0, got {}",
                self.analysis.temperature
            )));
        }

        if self.analysis.request_timeout_secs == 0 {
            return Err(LensError::Config(
                "Analysis request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if url::Url::parse(&self.analysis.endpoint).is_err() {
            return Err(LensError::Config(format!(
                "Analysis endpoint is not a valid URL: {}",
                self.analysis.endpoint
            )));
        }

        if self.gate.daily_limit == 0 {
            return Err(LensError::Config(
                "Gate daily_limit must be greater than 0".to_string(),
            ));
        }

        if self.cache.sweep_interval_secs == 0 {
            return Err(LensError::Config(
                "Cache sweep_interval_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Planner Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Prompt length considered well-sized (passthrough band is ±25%)
    pub optimal_len: usize,

    /// Window size for chunking; prompts this long or longer are chunked
    pub max_single_call_len: usize,

    /// Prompts at or above this many tokens are rejected
    pub hard_token_limit: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            optimal_len: planner::DEFAULT_OPTIMAL_LEN,
            max_single_call_len: planner::DEFAULT_MAX_SINGLE_CALL_LEN,
            hard_token_limit: planner::DEFAULT_HARD_TOKEN_LIMIT,
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.optimal_len == 0 || self.max_single_call_len == 0 || self.hard_token_limit == 0 {
            return Err(LensError::Config(
                "Planner thresholds must be greater than 0".to_string(),
            ));
        }

        if self.max_single_call_len >= self.hard_token_limit {
            return Err(LensError::Config(format!(
                "Planner max_single_call_len ({}) must be below hard_token_limit ({})",
                self.max_single_call_len, self.hard_token_limit
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Analysis Service Configuration
// =============================================================================

/// BPE encoding used for token counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenEncoding {
    #[default]
    Cl100kBase,
    O200kBase,
    P50kBase,
}

impl std::fmt::Display for TokenEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenEncoding::Cl100kBase => write!(f, "cl100k_base"),
            TokenEncoding::O200kBase => write!(f, "o200k_base"),
            TokenEncoding::P50kBase => write!(f, "p50k_base"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Analysis service URL
    pub endpoint: String,

    /// Model requested from the service
    pub model: String,

    /// Temperature for generation (0.0 = deterministic)
    pub temperature: f32,

    /// Maximum tokens the service may generate per call
    pub max_tokens: usize,

    /// Per-call timeout in seconds
    pub request_timeout_secs: u64,

    /// Template name sent with every request
    pub template: String,

    /// Tokenizer encoding
    pub encoding: TokenEncoding,

    /// API key; never serialized to output
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("template", &self.template)
            .field("encoding", &self.encoding)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: network::DEFAULT_ENDPOINT.to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 1024,
            request_timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            template: "prompt-optimizer".to_string(),
            encoding: TokenEncoding::default(),
            api_key: None,
        }
    }
}

impl AnalysisConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// =============================================================================
// Gate Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Minimum spacing between calls from one identity (milliseconds)
    pub cooldown_ms: u64,

    /// Consuming calls per fingerprint per day
    pub daily_limit: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: gate::DEFAULT_COOLDOWN_MS,
            daily_limit: gate::DEFAULT_DAILY_LIMIT,
        }
    }
}

impl GateConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

// =============================================================================
// Cache Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Consult and populate the result cache
    pub enabled: bool,

    /// Entry retention in days (default: 7)
    pub retention_days: u64,

    /// Seconds between housekeeping sweeps
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: cache::DEFAULT_RETENTION_DAYS,
            sweep_interval_secs: cache::DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl CacheConfig {
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path; `None` keeps everything in memory
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from(".promptlens/store.db")),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
