pub mod analyze;
pub mod cache;
pub mod config;
pub mod key;
pub mod limit;
pub mod plan;
