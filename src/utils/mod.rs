//! Utility modules shared by the scheduler and pipeline

pub mod cron_helper;
pub mod rate_limiter;

pub use rate_limiter::RateLimiter;
