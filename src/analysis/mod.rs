//! Prompt Analysis Pipeline
//!
//! - `planner`: token count → strategy and chunk windows
//! - `aggregator`: sequential per-chunk calls folded into one result
//! - `orchestrator`: gates, cache and the caller-facing entry points

mod aggregator;
mod orchestrator;
mod planner;

pub use aggregator::ChunkAggregator;
pub use orchestrator::{PromptAnalyzer, PromptRequest};
pub use planner::{ChunkPlan, ChunkPlanner, Strategy};
