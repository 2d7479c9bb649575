//! # Utility Modules
//!
//! Supporting utilities for logging, timing, nonces and metrics.
//!
//! ## Components
//! - **Logging**: Structured logging setup on top of `tracing-subscriber`
//! - **Timeout**: Timing defaults and async timeout wrappers
//! - **Nonce**: Request nonces in UUID form
//! - **Metrics**: Thread-safe observability counters

pub mod logging;
pub mod metrics;
pub mod nonce;
pub mod timeout;

pub use metrics::{Metrics, MetricsSnapshot};
