//! Job Outcome Types
//!
//! This module defines the payload of a `JOB_RESULT` envelope: either the
//! tool's result value or a tagged failure.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::JobRelayError;

/// Tool result value (JSON)
///
/// The result is passed through the coordinator untouched, so it can carry
/// any JSON-serializable data.
pub type ToolResult = serde_json::Value;

/// Why a job produced no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No code source knows the requested tool
    UnknownTool,
    /// The tool was found but could not be instantiated
    LoadFailure,
    /// The tool was invoked and failed
    ToolExecution,
    /// The coordinator has no registered workers
    NoWorkersAvailable,
    /// The load balancer selected a worker the registry does not know
    RegistryInconsistency,
    /// The selected worker could not be reached or did not answer
    WorkerUnreachable,
    /// A peer sent something that does not follow the protocol
    Protocol,
    /// Anything else
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::UnknownTool => "unknown_tool",
            FailureKind::LoadFailure => "load_failure",
            FailureKind::ToolExecution => "tool_execution",
            FailureKind::NoWorkersAvailable => "no_workers_available",
            FailureKind::RegistryInconsistency => "registry_inconsistency",
            FailureKind::WorkerUnreachable => "worker_unreachable",
            FailureKind::Protocol => "protocol",
            FailureKind::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The reply to a `JOB_REQUEST`.
///
/// # Outcome Flow
///
/// 1. The worker executes the job and wraps the result (or the error) in a
///    `JobOutcome`
/// 2. The outcome travels back to the coordinator inside a `JOB_RESULT`
///    envelope
/// 3. The coordinator forwards that envelope to the client unchanged
///
/// When the coordinator cannot reach a worker at all, it produces the
/// failure outcome itself.
///
/// # Example
///
/// ```
/// use jobrelay_common::protocol::{FailureKind, JobOutcome};
/// use serde_json::json;
///
/// let ok = JobOutcome::success(json!(42));
/// assert_eq!(ok.into_result().unwrap(), json!(42));
///
/// let failed = JobOutcome::failure(FailureKind::UnknownTool, "Nope");
/// assert!(failed.into_result().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Success { result: ToolResult },
    Failure { kind: FailureKind, message: String },
}

impl JobOutcome {
    pub fn success(result: ToolResult) -> Self {
        JobOutcome::Success { result }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        JobOutcome::Failure {
            kind,
            message: message.into(),
        }
    }

    /// Builds the failure outcome describing `error`.
    pub fn from_error(error: &JobRelayError) -> Self {
        JobOutcome::failure(error.failure_kind(), error.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success { .. })
    }

    /// Converts the outcome into the tool's result, or `JobFailed`.
    pub fn into_result(self) -> Result<ToolResult, JobRelayError> {
        match self {
            JobOutcome::Success { result } => Ok(result),
            JobOutcome::Failure { kind, message } => Err(JobRelayError::JobFailed { kind, message }),
        }
    }
}
