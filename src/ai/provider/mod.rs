//! Analysis Service Abstraction
//!
//! Defines the `AnalysisService` trait: one call per chunk request, returning
//! the raw provider-shaped JSON. Normalization is left to the response
//! validator so every backend shares one set of recovery rules.
//!
//! ## Modules
//!
//! - `http`: JSON-over-HTTP client for the remote analysis endpoint

mod http;

pub use http::HttpAnalysisService;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::AnalysisConfig;
use crate::types::{ChunkRequest, Result};

/// Shared analysis service for concurrent access across analyses.
pub type SharedService = Arc<dyn AnalysisService>;

/// Remote evaluator for one prompt or chunk
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Send one request and return the raw response body.
    ///
    /// Non-2xx responses and transport failures surface as
    /// `LensError::Upstream`.
    async fn analyze(&self, request: &ChunkRequest) -> Result<Value>;

    /// Service name for logging
    fn name(&self) -> &str;
}

/// Create the HTTP analysis service from configuration.
///
/// `api_key` overrides `config.api_key` (e.g. a key saved in the store).
pub fn create_service(config: &AnalysisConfig, api_key: Option<String>) -> Result<SharedService> {
    let mut config = config.clone();
    if api_key.is_some() {
        config.api_key = api_key;
    }
    Ok(Arc::new(HttpAnalysisService::new(config)?))
}
