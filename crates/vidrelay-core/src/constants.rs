//! Fixed strings recorded on asset progress.

/// Stored in `StageRecord::error` when there is nothing to report.
pub const NO_ERROR: &str = "N.A";

/// Recorded on `postProcessingValidation` when the output count does not match.
pub const COUNT_MISMATCH: &str = "Count Match Issue";

/// Recorded on `accepted` when the worker pool declined a submission.
pub const SUBMISSION_DECLINED: &str = "Worker pool declined submission";

pub const INTAKE_ESCALATION_MESSAGE: &str = "Post Upload Check Failed, Try Again!";
pub const VALIDATION_ESCALATION_MESSAGE: &str =
    "Validation Failed, Because of Unknown Reasons Try Again";
pub const DISPATCH_ESCALATION_MESSAGE: &str = "Unable to Assign Processing Job, Please Try Again!";
pub const COMPLETION_ESCALATION_MESSAGE: &str = "Completion Failed, We are sorry!";
