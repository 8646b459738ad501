//! Telemetry initialization
//!
//! Structured logging through `tracing`. The filter comes from `RUST_LOG` when set.

mod init_basic;

pub use init_basic::{init_telemetry, shutdown_telemetry, DEFAULT_FILTER};
