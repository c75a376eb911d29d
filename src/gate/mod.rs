//! Request Gates
//!
//! Advisory checks evaluated before any analysis reaches the service:
//! - `RateLimiter`: fixed cooldown per caller identity (in memory)
//! - `QuotaLimiter`: daily consuming-call count per fingerprint (persisted)

mod fingerprint;
mod quota;
mod rate_limiter;

pub use fingerprint::{ClientTraits, Fingerprint};
pub use quota::{QuotaLimiter, QuotaStatus};
pub use rate_limiter::RateLimiter;
