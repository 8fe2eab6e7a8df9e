//! Resilience module
//!
//! Protects the storage channel from abuse:
//! - Sliding-window rate limiting per principal
//! - Verification challenges with an expiry window

pub mod rate_limit;
pub mod verification;

pub use rate_limit::{RateLimitConfig, RateLimitResult, RateLimitStats, RateLimiter};
pub use verification::{is_fresh, VerificationGate};
