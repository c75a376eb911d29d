//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Chunk planner thresholds (in model tokens)
pub mod planner {
    /// Prompt length considered already well-sized
    pub const DEFAULT_OPTIMAL_LEN: usize = 150;

    /// Largest prompt sent as a single service call
    pub const DEFAULT_MAX_SINGLE_CALL_LEN: usize = 3000;

    /// Prompts at or above this size are rejected outright
    pub const DEFAULT_HARD_TOKEN_LIMIT: usize = 32_000;

    /// Lower edge of the passthrough band, as a fraction of the optimal length
    pub const PASSTHROUGH_LOWER: f64 = 0.75;

    /// Upper edge of the passthrough band, as a fraction of the optimal length
    pub const PASSTHROUGH_UPPER: f64 = 1.25;
}

/// Response validation constants
pub mod validation {
    /// Suggestions kept from a single service response
    pub const MAX_SUGGESTIONS: usize = 3;

    /// Maximum accuracy score
    pub const MAX_ACCURACY: u8 = 100;

    /// How deep provider wrapper fields are unwrapped
    pub const MAX_UNWRAP_DEPTH: usize = 4;
}

/// Aggregation constants
pub mod aggregation {
    /// Separator between chunk rewordings
    pub const REWORD_SEPARATOR: &str = "\n\n";
}

/// Request gate constants
pub mod gate {
    /// Minimum spacing between calls from one identity (milliseconds)
    pub const DEFAULT_COOLDOWN_MS: u64 = 1000;

    /// Consuming calls allowed per fingerprint per calendar day
    pub const DEFAULT_DAILY_LIMIT: u32 = 10;

    /// Storage key prefix for usage counters
    pub const USAGE_KEY_PREFIX: &str = "limit_";

    /// Hex characters kept from the fingerprint digest
    pub const FINGERPRINT_HEX_LEN: usize = 16;
}

/// Cache constants
pub mod cache {
    /// Storage key prefix for cached results
    pub const KEY_PREFIX: &str = "cache_";

    /// Cache entry retention (days)
    pub const DEFAULT_RETENTION_DAYS: u64 = 7;

    /// Interval between housekeeping sweeps (seconds)
    pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
}

/// Persisted settings keys
pub mod settings {
    /// Saved analysis service API key
    pub const API_KEY: &str = "apiKey";
}

/// HTTP/Network constants
pub mod network {
    /// Default per-request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 10;

    /// Default analysis endpoint
    pub const DEFAULT_ENDPOINT: &str = "http://localhost:8787/analyze";
}
