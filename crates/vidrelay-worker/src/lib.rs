//! vidrelay worker library
//!
//! Queue-driven stage handlers (intake, validation, dispatch, completion), their
//! escalation counterparts, admission control in front of the worker pool, and the
//! consumer runtime that drives them.

pub mod admission;
pub mod batch;
pub mod consumer;
pub mod context;
pub mod escalation;
pub mod handlers;
pub mod queue;
pub mod setup;

pub use admission::AdmissionController;
pub use batch::{BatchHandler, BatchItemFailure, BatchResponse};
pub use consumer::{ConsumerConfig, PollSummary, QueueConsumer};
pub use context::PipelineContext;
pub use escalation::EscalationPolicy;
pub use queue::{InMemoryQueue, MessageQueue, MessageSource, QueueError, QueueMessage, SqsQueue};
