//! Analysis Response Validation
//!
//! Turns raw service output into a `CanonicalResult`:
//! - JSON repair for fenced, truncated, or prose-wrapped responses
//! - Provider envelope unwrapping
//! - Field normalization (accuracy clamp, suggestion limits, trimmed reword)
//!
//! ## Design Philosophy
//! - Never fail: unusable responses degrade to the zero result
//! - Recovery is reported, so callers can log it

mod json_repair;
mod response;

pub use json_repair::JsonRepairer;
pub use response::{CanonicalResult, RecoveryReason, ResponseValidator, Validation, validate};
