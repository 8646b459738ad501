//! Data models for the pipeline
//!
//! Stage state machine, asset record, task descriptors, typed metadata and the
//! object-store notification envelope.

mod asset;
mod metadata;
mod notification;
mod stage;
mod task;

pub use asset::*;
pub use metadata::*;
pub use notification::*;
pub use stage::*;
pub use task::*;
