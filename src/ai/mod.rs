//! AI Integration Layer
//!
//! Tokenization, the remote analysis service, and response normalization.

pub mod provider;
pub mod timeout;
pub mod tokenizer;
pub mod validation;

pub use provider::{AnalysisService, HttpAnalysisService, SharedService, create_service};
pub use timeout::{guarded, with_timeout};
pub use tokenizer::{SharedTokenizer, Tokenizer};
pub use validation::{CanonicalResult, RecoveryReason, ResponseValidator, Validation, validate};
