//! Chunk Aggregator
//!
//! Executes a `ChunkPlan` against the analysis service and folds the
//! per-chunk canonical results into one `UnifiedResult`.
//!
//! ## Execution
//! - Chunks are sent strictly in index order, one in flight at a time
//! - Chunk text is the decoded token window, so every chunk fits the window
//! - Each call runs under the per-call timeout and the caller's cancellation
//!   token
//!
//! ## Folding
//! - accuracy: equal-weighted mean of chunk scores, one decimal place
//! - suggestions: ordered union, first occurrence wins
//! - reword: every chunk reword, in index order, joined by a blank line
//!
//! Any failed call aborts the whole run. Calls that already completed are
//! not retried.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::planner::{ChunkPlan, Strategy};
use crate::ai::provider::SharedService;
use crate::ai::timeout::guarded;
use crate::ai::tokenizer::SharedTokenizer;
use crate::ai::validation::{CanonicalResult, ResponseValidator, Validation};
use crate::constants::aggregation::REWORD_SEPARATOR;
use crate::constants::network;
use crate::types::{ChunkRequest, LensError, Result, UnifiedResult};

pub struct ChunkAggregator {
    tokenizer: SharedTokenizer,
    service: SharedService,
    validator: ResponseValidator,
    request_timeout: Duration,
}

impl ChunkAggregator {
    pub fn new(tokenizer: SharedTokenizer, service: SharedService) -> Self {
        Self {
            tokenizer,
            service,
            validator: ResponseValidator::new(),
            request_timeout: Duration::from_secs(network::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Run `plan` for `text`, whose encoding is `tokens`
    pub async fn run(
        &self,
        text: &str,
        tokens: &[u32],
        plan: &ChunkPlan,
        cancel: &CancellationToken,
    ) -> Result<UnifiedResult> {
        match plan.strategy {
            Strategy::Reject => Err(LensError::InputTooLarge {
                token_count: plan.token_count,
                limit: plan.token_limit,
            }),
            Strategy::Passthrough => Ok(UnifiedResult::already_optimal(plan.token_count)),
            Strategy::Single => {
                let start = Instant::now();
                let result = self
                    .dispatch(ChunkRequest::single(text), cancel)
                    .await
                    .map_err(|e| abort(0, 1, start, e))?;

                info!(
                    "Analyzed {} tokens in one call ({}ms)",
                    plan.token_count,
                    start.elapsed().as_millis()
                );
                Ok(UnifiedResult {
                    accuracy: f64::from(result.accuracy()),
                    suggestions: result.suggestions().to_vec(),
                    reword: result.reword().to_string(),
                    was_chunked: false,
                    token_count: plan.token_count,
                    chunk_count: 1,
                    already_optimal: false,
                })
            }
            Strategy::Chunked => self.run_chunked(tokens, plan, cancel).await,
        }
    }

    async fn run_chunked(
        &self,
        tokens: &[u32],
        plan: &ChunkPlan,
        cancel: &CancellationToken,
    ) -> Result<UnifiedResult> {
        let start = Instant::now();
        let total = plan.chunk_count;
        let mut results = Vec::with_capacity(total);

        for (index, window) in plan.boundaries.iter().enumerate() {
            let chunk_text = self
                .tokenizer
                .decode(&tokens[window.clone()])
                .await
                .map_err(|e| abort(index, total, start, e))?;

            let request = ChunkRequest::chunk(chunk_text, index, total);
            debug!(
                "Dispatching chunk {}/{} ({}, {} tokens)",
                index + 1,
                total,
                request.position,
                window.len()
            );

            let result = self
                .dispatch(request, cancel)
                .await
                .map_err(|e| abort(index, total, start, e))?;
            results.push(result);
        }

        let unified = fold(&results, plan.token_count);
        info!(
            "Analyzed {} tokens in {} chunks ({}ms, accuracy {:.1})",
            plan.token_count,
            total,
            start.elapsed().as_millis(),
            unified.accuracy
        );
        Ok(unified)
    }

    /// One guarded service call, validated
    async fn dispatch(
        &self,
        request: ChunkRequest,
        cancel: &CancellationToken,
    ) -> Result<CanonicalResult> {
        let raw = guarded(
            self.request_timeout,
            cancel,
            self.service.analyze(&request),
            "analysis request",
        )
        .await?;

        match self.validator.validate(&raw) {
            Validation::Canonical(result) => Ok(result),
            Validation::Recovered { result, reason } => {
                warn!(
                    "Chunk {}/{} response recovered as zero result: {}",
                    request.index + 1,
                    request.total,
                    reason
                );
                Ok(result)
            }
        }
    }
}

/// Wrap a call failure; cancellation passes through untouched
fn abort(chunk_index: usize, total_chunks: usize, start: Instant, err: LensError) -> LensError {
    match err {
        LensError::Cancelled(_) => err,
        source => LensError::AnalysisFailed {
            chunk_index,
            total_chunks,
            elapsed: start.elapsed(),
            source: Box::new(source),
        },
    }
}

/// Fold chunk results in index order
fn fold(results: &[CanonicalResult], token_count: usize) -> UnifiedResult {
    let count = results.len();
    let mean: f64 = results
        .iter()
        .map(|r| f64::from(r.accuracy()) / count as f64)
        .sum();

    let mut seen = HashSet::new();
    let suggestions = results
        .iter()
        .flat_map(|r| r.suggestions())
        .filter(|s| seen.insert(s.as_str()))
        .cloned()
        .collect();

    let reword = results
        .iter()
        .map(|r| r.reword())
        .collect::<Vec<_>>()
        .join(REWORD_SEPARATOR);

    UnifiedResult {
        accuracy: (mean * 10.0).round() / 10.0,
        suggestions,
        reword,
        was_chunked: true,
        token_count,
        chunk_count: count,
        already_optimal: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::tokenizer::Tokenizer;
    use crate::analysis::planner::ChunkPlanner;
    use crate::config::{PlannerConfig, TokenEncoding};
    use crate::testing::{CharLoader, ScriptedService, provider_payload, text_of_len};
    use crate::types::ChunkPosition;
    use serde_json::json;
    use std::sync::Arc;

    fn tokenizer() -> SharedTokenizer {
        Arc::new(Tokenizer::with_loader(
            TokenEncoding::default(),
            Arc::new(CharLoader::new()),
        ))
    }

    fn planner() -> ChunkPlanner {
        ChunkPlanner::new(PlannerConfig {
            optimal_len: 10,
            max_single_call_len: 100,
            hard_token_limit: 1000,
        })
    }

    async fn run_text(
        service: Arc<ScriptedService>,
        text: &str,
    ) -> Result<UnifiedResult> {
        let tokenizer = tokenizer();
        let tokens = tokenizer.encode(text).await?;
        let plan = planner().plan(tokens.len());
        ChunkAggregator::new(tokenizer, service)
            .run(text, &tokens, &plan, &CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn test_passthrough_makes_no_call() {
        let service = Arc::new(ScriptedService::fixed(90, &[], "x"));
        let result = run_text(service.clone(), &text_of_len(10)).await.unwrap();

        assert!(result.already_optimal);
        assert_eq!(result.token_count, 10);
        assert_eq!(result.accuracy, 0.0);
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn test_single_maps_one_to_one() {
        let service = Arc::new(ScriptedService::fixed(72, &["Add detail"], " Rewritten "));
        let text = text_of_len(50);
        let result = run_text(service.clone(), &text).await.unwrap();

        assert_eq!(result.accuracy, 72.0);
        assert_eq!(result.suggestions, vec!["Add detail"]);
        assert_eq!(result.reword, "Rewritten");
        assert!(!result.was_chunked);
        assert_eq!(result.chunk_count, 1);

        let requests = service.recorded();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].position, ChunkPosition::None);
        assert_eq!(requests[0].text, text);
    }

    #[tokio::test]
    async fn test_chunked_positions_and_text() {
        let service = Arc::new(ScriptedService::fixed(80, &[], "r"));
        // 2.3x the window
        let text = text_of_len(230);
        let result = run_text(service.clone(), &text).await.unwrap();

        assert!(result.was_chunked);
        assert_eq!(result.chunk_count, 3);
        assert_eq!(result.token_count, 230);

        let requests = service.recorded();
        let positions: Vec<_> = requests.iter().map(|r| r.position).collect();
        assert_eq!(
            positions,
            vec![ChunkPosition::Begin, ChunkPosition::Middle, ChunkPosition::End]
        );
        assert!(requests.iter().all(|r| r.total == 3));
        assert_eq!(requests[2].text.chars().count(), 30);

        let rejoined: String = requests.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(rejoined, text);
    }

    #[tokio::test]
    async fn test_accuracy_is_equal_weighted() {
        let service = Arc::new(ScriptedService::new(|req| {
            let accuracy = if req.index == 0 { 0 } else { 100 };
            Ok(provider_payload(accuracy, &[], "r"))
        }));
        // 0 and 100 over two chunks of unequal size still average to 50.0
        let result = run_text(service, &text_of_len(110)).await.unwrap();
        assert_eq!(result.accuracy, 50.0);
    }

    #[tokio::test]
    async fn test_accuracy_rounds_to_one_decimal() {
        let service = Arc::new(ScriptedService::new(|req| {
            let accuracy = [70, 71, 71][req.index];
            Ok(provider_payload(accuracy, &[], "r"))
        }));
        let result = run_text(service, &text_of_len(250)).await.unwrap();
        // 212 / 3 = 70.666...
        assert_eq!(result.accuracy, 70.7);
    }

    #[tokio::test]
    async fn test_suggestions_union_and_reword_join() {
        let service = Arc::new(ScriptedService::new(|req| {
            Ok(match req.index {
                0 => provider_payload(60, &["a", "b"], "first"),
                1 => provider_payload(60, &["b", "c"], ""),
                _ => provider_payload(60, &["d", "a"], "third"),
            })
        }));
        let result = run_text(service, &text_of_len(300)).await.unwrap();

        assert_eq!(result.suggestions, vec!["a", "b", "c", "d"]);
        // the empty middle reword keeps its slot in reading order
        assert_eq!(result.reword, "first\n\n\n\nthird");
    }

    #[tokio::test]
    async fn test_malformed_chunk_degrades_instead_of_failing() {
        let service = Arc::new(ScriptedService::new(|req| {
            Ok(match req.index {
                0 => provider_payload(90, &["keep"], "ok"),
                _ => json!({ "unexpected": true }),
            })
        }));
        let result = run_text(service, &text_of_len(200)).await.unwrap();
        assert_eq!(result.accuracy, 45.0);
        assert_eq!(result.suggestions, vec!["keep"]);
        assert_eq!(result.reword, "ok\n\n");
    }

    #[tokio::test]
    async fn test_failure_aborts_with_chunk_detail() {
        let service = Arc::new(ScriptedService::new(|req| {
            if req.index == 1 {
                Err(LensError::upstream(Some(500), "boom"))
            } else {
                Ok(provider_payload(80, &[], "r"))
            }
        }));
        let err = run_text(service.clone(), &text_of_len(300)).await.unwrap_err();

        match err {
            LensError::AnalysisFailed {
                chunk_index,
                total_chunks,
                source,
                ..
            } => {
                assert_eq!(chunk_index, 1);
                assert_eq!(total_chunks, 3);
                assert!(matches!(*source, LensError::Upstream { status: Some(500), .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // the third chunk is never sent
        assert_eq!(service.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_call_timeout() {
        let service = Arc::new(
            ScriptedService::fixed(80, &[], "r").with_delay(Duration::from_secs(120)),
        );
        let tokenizer = tokenizer();
        let text = text_of_len(50);
        let tokens = tokenizer.encode(&text).await.unwrap();
        let plan = planner().plan(tokens.len());

        let err = ChunkAggregator::new(tokenizer, service)
            .with_request_timeout(Duration::from_secs(5))
            .run(&text, &tokens, &plan, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            LensError::AnalysisFailed { source, .. } => {
                assert!(matches!(*source, LensError::Timeout { .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let service = Arc::new(ScriptedService::fixed(80, &[], "r"));
        let tokenizer = tokenizer();
        let text = text_of_len(300);
        let tokens = tokenizer.encode(&text).await.unwrap();
        let plan = planner().plan(tokens.len());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = ChunkAggregator::new(tokenizer, service.clone())
            .run(&text, &tokens, &plan, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, LensError::Cancelled(_)));
        assert_eq!(service.calls(), 0);
    }
}
