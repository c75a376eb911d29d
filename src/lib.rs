//! promptlens - Token-Aware Prompt Analysis
//!
//! Scores a prompt, suggests improvements and proposes a rewording by calling
//! a remote analysis service. Prompts too long for one call are split into
//! token windows and analyzed in sequence, and the per-chunk answers are
//! folded into one result.
//!
//! ## Core Features
//!
//! - **Chunk Planning**: token-count driven passthrough/single/chunked/reject
//! - **Response Recovery**: malformed, wrapped or block-quoted answers are
//!   normalized instead of failing the analysis
//! - **Request Gates**: per-caller cooldown and a persisted daily quota
//! - **Result Cache**: exact-text cache with periodic retention sweeps
//!
//! ## Quick Start
//!
//! ```ignore
//! use promptlens::{Config, PromptAnalyzer, PromptRequest, Tokenizer};
//! use promptlens::ai::create_service;
//! use promptlens::storage::open_store;
//!
//! let config = Config::default();
//! let analyzer = PromptAnalyzer::new(
//!     &config,
//!     Tokenizer::shared(),
//!     create_service(&config.analysis, None)?,
//!     open_store(&config.storage)?,
//! );
//! let result = analyzer.analyze(&prompt).await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: tokenizer, analysis service client, response validation
//! - [`analysis`]: chunk planner, aggregator and the gated entry point
//! - [`gate`]: cooldown and daily quota
//! - [`cache`]: result cache
//! - [`storage`]: key-value persistence (SQLite or in-memory)
//! - [`config`]: layered configuration

pub mod ai;
pub mod analysis;
pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod gate;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{ErrorKind, ErrorReport, LensError, Result, ResultExt};

// Data Model
pub use types::{CallerId, ChunkPosition, ChunkRequest, UnifiedResult};

// Storage
pub use storage::{KeyValueStore, MemoryStore, SharedStore, SqliteStore};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use analysis::{ChunkAggregator, ChunkPlan, ChunkPlanner, PromptAnalyzer, PromptRequest, Strategy};
pub use cache::ResultCache;
pub use gate::{ClientTraits, Fingerprint, QuotaLimiter, QuotaStatus, RateLimiter};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    AnalysisService, CanonicalResult, HttpAnalysisService, ResponseValidator, SharedService,
    SharedTokenizer, Tokenizer, Validation,
};
