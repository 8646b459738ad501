//! vidrelay content inspection
//!
//! Probing media is delegated to an external inspector program. This crate defines the
//! [`ContentInspector`] seam the validation stage calls and a process-backed
//! implementation of it.

pub mod inspector;
pub mod process;

pub use inspector::{ContentInspector, InspectorError};
pub use process::ProcessInspector;
