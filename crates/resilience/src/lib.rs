// crates/resilience/src/lib.rs
//! Resilience patterns for fault-tolerant sync
//!
//! This module provides:
//! - Exponential backoff schedules for retrying failed mutations
//! - Bounded execution of remote calls
//!
//! # Example
//!
//! ```rust
//! use fairway_resilience::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(5)
//!     .with_initial_delay(Duration::from_millis(500))
//!     .with_max_delay(Duration::from_secs(60));
//!
//! assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
//! assert!(policy.is_exhausted(5));
//! ```

mod error;
mod retry;
mod timeout;

pub use error::{ResilienceError, ResilienceResult};
pub use retry::RetryPolicy;
pub use timeout::{with_timeout, Timeout};
