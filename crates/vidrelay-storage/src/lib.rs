//! vidrelay storage library
//!
//! Object storage used by the pipeline: the transport bucket that receives uploads and
//! the content bucket the transcoder writes its outputs to. Both are addressed by keys of
//! the form `{ownerId}/{assetId}/...`.
//!
//! Keys must not contain `..` or a leading `/`.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod scratch;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use scratch::{ScratchFile, ScratchSpace};
pub use traits::{Storage, StorageError, StorageResult};
pub use vidrelay_core::StorageBackend;
