//! Prompt Analyzer
//!
//! Caller-facing entry point. Wraps the chunk aggregator in the request gates
//! and the result cache.
//!
//! ## Gate Order
//!
//! 1. Empty prompt → `EmptyPrompt`
//! 2. Rate limiter → `RateLimited`
//! 3. Cache lookup; a hit returns immediately and consumes no quota
//! 4. Tokenize and plan; `Reject` → `InputTooLarge`, `Passthrough` returns
//!    without quota use
//! 5. Quota consume → `QuotaExceeded` when blocked
//! 6. Aggregate
//! 7. Cache the result
//!
//! The cache is advisory: a failed lookup counts as a miss and a failed write
//! is logged, never returned.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::aggregator::ChunkAggregator;
use super::planner::{ChunkPlan, ChunkPlanner, Strategy};
use crate::ai::provider::SharedService;
use crate::ai::tokenizer::SharedTokenizer;
use crate::cache::ResultCache;
use crate::config::Config;
use crate::gate::{Fingerprint, QuotaLimiter, QuotaStatus, RateLimiter};
use crate::storage::SharedStore;
use crate::types::{CallerId, LensError, Result, UnifiedResult};

/// One caller-facing analysis request
#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub text: String,
    /// Identity for the cooldown gate (e.g. a tab or session id)
    pub caller: CallerId,
    /// Key for the daily quota
    pub fingerprint: Fingerprint,
}

pub struct PromptAnalyzer {
    tokenizer: SharedTokenizer,
    planner: ChunkPlanner,
    aggregator: ChunkAggregator,
    rate_limiter: Arc<RateLimiter>,
    quota: QuotaLimiter,
    cache: Option<Arc<ResultCache>>,
    shutdown: CancellationToken,
}

impl PromptAnalyzer {
    pub fn new(
        config: &Config,
        tokenizer: SharedTokenizer,
        service: SharedService,
        store: SharedStore,
    ) -> Self {
        let aggregator = ChunkAggregator::new(tokenizer.clone(), service)
            .with_request_timeout(config.analysis.request_timeout());

        let cache = config
            .cache
            .enabled
            .then(|| Arc::new(ResultCache::new(store.clone(), config.cache.retention())));

        Self {
            tokenizer,
            planner: ChunkPlanner::new(config.planner),
            aggregator,
            rate_limiter: Arc::new(RateLimiter::new(config.gate.cooldown())),
            quota: QuotaLimiter::new(store, config.gate.daily_limit),
            cache,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    /// Periodic upkeep until the handle is aborted: forget callers whose
    /// cooldown has passed and sweep expired cache entries. The first tick
    /// runs immediately.
    pub fn spawn_housekeeping(&self, interval: Duration) -> JoinHandle<()> {
        let rate_limiter = self.rate_limiter.clone();
        let cache = self.cache.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let pruned = rate_limiter.prune();
                if pruned > 0 {
                    debug!("Pruned {} idle caller(s) from the rate limiter", pruned);
                }
                if let Some(cache) = &cache {
                    cache.sweep_logged().await;
                }
            }
        })
    }

    /// Cancelling this token aborts every in-flight analysis
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Token count and plan for `text`, without any service call
    pub async fn plan(&self, text: &str) -> Result<ChunkPlan> {
        let token_count = self.tokenizer.count(text).await?;
        Ok(self.planner.plan(token_count))
    }

    /// Analyze `text` with no gates or cache
    pub async fn analyze(&self, text: &str) -> Result<UnifiedResult> {
        let tokens = self.tokenizer.encode(text).await?;
        let plan = self.planner.plan(tokens.len());
        debug!(
            "Planned {} tokens as {} ({} chunk(s))",
            plan.token_count, plan.strategy, plan.chunk_count
        );

        self.aggregator
            .run(text, &tokens, &plan, &self.shutdown.child_token())
            .await
    }

    /// Gated, cached analysis
    pub async fn analyze_prompt(&self, request: &PromptRequest) -> Result<UnifiedResult> {
        self.analyze_prompt_with(request, &self.shutdown.child_token())
            .await
    }

    /// Gated, cached analysis that also stops when `cancel` fires
    pub async fn analyze_prompt_with(
        &self,
        request: &PromptRequest,
        cancel: &CancellationToken,
    ) -> Result<UnifiedResult> {
        let text = request.text.as_str();
        if text.trim().is_empty() {
            return Err(LensError::EmptyPrompt);
        }

        self.rate_limiter.check(&request.caller)?;

        if let Some(cache) = &self.cache {
            match cache.get(text).await {
                Ok(Some(hit)) => {
                    info!("Served analysis from cache ({} tokens)", hit.token_count);
                    return Ok(hit);
                }
                Ok(None) => {}
                Err(e) => warn!("Cache lookup failed, analyzing anyway: {}", e),
            }
        }

        let tokens = self.tokenizer.encode(text).await?;
        let plan = self.planner.plan(tokens.len());
        debug!(
            "Planned {} tokens as {} ({} chunk(s))",
            plan.token_count, plan.strategy, plan.chunk_count
        );

        match plan.strategy {
            Strategy::Reject => {
                return Err(LensError::InputTooLarge {
                    token_count: plan.token_count,
                    limit: plan.token_limit,
                });
            }
            Strategy::Passthrough => return Ok(UnifiedResult::already_optimal(plan.token_count)),
            Strategy::Single | Strategy::Chunked => {}
        }

        let status = self.quota.check(&request.fingerprint, true).await?;
        if status.blocked {
            return Err(LensError::QuotaExceeded {
                usage: status.usage,
                limit: status.limit,
            });
        }

        let result = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                Err(LensError::Cancelled("analyzer shut down".to_string()))
            }
            result = self.aggregator.run(text, &tokens, &plan, cancel) => result,
        }?;

        if let Some(cache) = &self.cache
            && let Err(e) = cache.put(text, &result).await
        {
            warn!("Failed to cache analysis result: {}", e);
        }
        Ok(result)
    }

    /// Report (and optionally consume) today's quota for `fingerprint`
    pub async fn check_limit(&self, fingerprint: &Fingerprint, consume: bool) -> Result<QuotaStatus> {
        self.quota.check(fingerprint, consume).await
    }
}
