//! vidrelay infrastructure library
//!
//! Shared infrastructure used by the pipeline binary:
//! - Telemetry initialization (tracing subscriber, pretty or JSON output)
//! - HTTP client for the transcoding worker pool

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "worker-pool")]
pub mod worker_pool;

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry, DEFAULT_FILTER};

#[cfg(feature = "worker-pool")]
pub use worker_pool::HttpWorkerPool;
