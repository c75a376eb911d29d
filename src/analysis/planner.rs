//! Chunk Planner
//!
//! Decides how a prompt of a given token count is sent to the analysis
//! service, and where chunk boundaries fall.
//!
//! ## Decision Order (first match wins)
//!
//! | Condition                          | Strategy      |
//! |------------------------------------|---------------|
//! | `t >= hard_token_limit`            | `Reject`      |
//! | `0.75·optimal <= t <= 1.25·optimal`| `Passthrough` |
//! | `t >= max_single_call_len`         | `Chunked`     |
//! | otherwise                          | `Single`      |
//!
//! Chunked plans use fixed windows of `max_single_call_len` tokens; only the
//! last window may be shorter. Windows are token-indexed so every chunk fits
//! the remote model's limit exactly.

use serde::Serialize;
use std::ops::Range;

use crate::config::PlannerConfig;
use crate::constants::planner::{PASSTHROUGH_LOWER, PASSTHROUGH_UPPER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Too long to analyze at all
    Reject,
    /// Already well-sized; no service call
    Passthrough,
    Single,
    Chunked,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Reject => write!(f, "reject"),
            Strategy::Passthrough => write!(f, "passthrough"),
            Strategy::Single => write!(f, "single"),
            Strategy::Chunked => write!(f, "chunked"),
        }
    }
}

/// How one prompt will be analyzed.
///
/// `boundaries` always partitions `[0, token_count)`: contiguous, in order,
/// non-overlapping. Non-chunked strategies carry the single range `0..t`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPlan {
    pub strategy: Strategy,
    pub token_count: usize,
    pub chunk_count: usize,
    pub boundaries: Vec<Range<usize>>,
    /// Hard limit the plan was made against
    pub token_limit: usize,
}

impl ChunkPlan {
    fn whole(strategy: Strategy, token_count: usize, token_limit: usize) -> Self {
        Self {
            strategy,
            token_count,
            chunk_count: 1,
            boundaries: vec![0..token_count],
            token_limit,
        }
    }

    pub fn is_chunked(&self) -> bool {
        self.strategy == Strategy::Chunked
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkPlanner {
    config: PlannerConfig,
}

impl ChunkPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn plan(&self, token_count: usize) -> ChunkPlan {
        let PlannerConfig {
            optimal_len,
            max_single_call_len,
            hard_token_limit,
        } = self.config;

        if token_count >= hard_token_limit {
            return ChunkPlan::whole(Strategy::Reject, token_count, hard_token_limit);
        }

        let t = token_count as f64;
        let optimal = optimal_len as f64;
        if t >= optimal * PASSTHROUGH_LOWER && t <= optimal * PASSTHROUGH_UPPER {
            return ChunkPlan::whole(Strategy::Passthrough, token_count, hard_token_limit);
        }

        if token_count >= max_single_call_len {
            let boundaries: Vec<Range<usize>> = (0..token_count)
                .step_by(max_single_call_len)
                .map(|start| start..(start + max_single_call_len).min(token_count))
                .collect();
            return ChunkPlan {
                strategy: Strategy::Chunked,
                token_count,
                chunk_count: boundaries.len(),
                boundaries,
                token_limit: hard_token_limit,
            };
        }

        ChunkPlan::whole(Strategy::Single, token_count, hard_token_limit)
    }
}
