//! Services shared by the stage handlers.
//!
//! Built once at process start and handed to every handler; tests build it from
//! in-memory fakes.

use std::sync::Arc;

use vidrelay_db::ProgressLedger;
use vidrelay_processing::ContentInspector;
use vidrelay_storage::{ScratchSpace, Storage};

use crate::admission::AdmissionController;
use crate::queue::MessageQueue;

#[derive(Clone)]
pub struct PipelineContext {
    pub ledger: Arc<dyn ProgressLedger>,
    /// Bucket that receives uploads.
    pub transport: Arc<dyn Storage>,
    /// Bucket the transcoder writes its outputs to.
    pub content: Arc<dyn Storage>,
    pub scratch: ScratchSpace,
    pub inspector: Arc<dyn ContentInspector>,
    pub admission: Arc<AdmissionController>,
    pub validation_queue: Arc<dyn MessageQueue>,
    pub dispatch_queue: Arc<dyn MessageQueue>,
    pub cdn_domain: String,
    /// Objects under an asset prefix that are not transcoder outputs.
    pub completion_marker_objects: u64,
}
