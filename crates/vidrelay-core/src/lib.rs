//! vidrelay core library
//!
//! Domain models, the asset identity scheme, the error taxonomy and configuration
//! shared by every vidrelay component.

pub mod config;
pub mod constants;
pub mod error;
pub mod factory;
pub mod identity;
pub mod models;
pub mod worker_pool;

// Re-export commonly used types
pub use config::{AdmissionConfig, LogFormat, QueueConfig, QueueEndpoint, StorageBackend, WorkerConfig};
pub use error::{ErrorMetadata, Fault, LogLevel, PipelineError};
pub use factory::create_task;
pub use identity::{generate_upload_key, AssetIdentity};
pub use models::*;
pub use worker_pool::{WorkerPool, WorkerPoolError};
