//! Error types module
//!
//! `PipelineError` is the single error type seen by stage and escalation handlers.
//! Collaborator crates (ledger, storage, queue, inspector) define their own error enums
//! and convert into it, keeping the retryable/non-retryable distinction intact.
//!
//! Classification drives the batch partial-failure protocol:
//! - client faults are logged and dropped (never redelivered),
//! - recoverable server faults are reported for redelivery.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io;

use crate::models::Stage;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like malformed notifications
    Debug,
    /// Warning level - for recoverable issues like backpressure
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Which side of the contract caused the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Client,
    Server,
}

impl Display for Fault {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Fault::Client => write!(f, "client"),
            Fault::Server => write!(f, "server"),
        }
    }
}

/// Metadata describing how an error is treated by the pipeline.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "LEDGER_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether the caller or the service is at fault
    fn fault(&self) -> Fault;

    /// Whether redelivering the message can succeed
    fn is_recoverable(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Invalid stage transition: {from} -> {to}")]
    InvalidTransition { from: Stage, to: Stage },

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Content inspector error: {0}")]
    Inspector(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for PipelineError {
    fn from(err: io::Error) -> Self {
        PipelineError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::MalformedMessage(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, fault, recoverable, log_level).
fn pipeline_error_static_metadata(err: &PipelineError) -> (&'static str, Fault, bool, LogLevel) {
    match err {
        PipelineError::MalformedKey(_) => ("MALFORMED_KEY", Fault::Client, false, LogLevel::Debug),
        PipelineError::MalformedMessage(_) => {
            ("MALFORMED_MESSAGE", Fault::Client, false, LogLevel::Debug)
        }
        PipelineError::InvalidTransition { .. } => {
            ("INVALID_TRANSITION", Fault::Client, false, LogLevel::Warn)
        }
        PipelineError::Ledger(_) => ("LEDGER_ERROR", Fault::Server, true, LogLevel::Error),
        PipelineError::Storage(_) => ("STORAGE_ERROR", Fault::Server, true, LogLevel::Error),
        PipelineError::Queue(_) => ("QUEUE_ERROR", Fault::Server, true, LogLevel::Error),
        PipelineError::Inspector(_) => ("INSPECTOR_ERROR", Fault::Server, true, LogLevel::Error),
        PipelineError::WorkerPool(_) => ("WORKER_POOL_ERROR", Fault::Server, true, LogLevel::Warn),
        PipelineError::Internal(_) | PipelineError::InternalWithSource { .. } => {
            ("INTERNAL_ERROR", Fault::Server, true, LogLevel::Error)
        }
    }
}

impl PipelineError {
    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for PipelineError {
    fn error_code(&self) -> &'static str {
        pipeline_error_static_metadata(self).0
    }

    fn fault(&self) -> Fault {
        pipeline_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        pipeline_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        pipeline_error_static_metadata(self).3
    }
}
