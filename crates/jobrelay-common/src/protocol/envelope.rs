//! Envelope Types
//!
//! Every exchange on the wire is one [`Envelope`]: a `kind` tag plus a
//! payload whose type is fixed by the kind.
//!
//! | kind | payload | direction |
//! |------|---------|-----------|
//! | `REGISTER_WORKER` | [`ConnectivityInfo`] | worker → coordinator |
//! | `JOB_REQUEST` | [`Job`] | client → coordinator → worker |
//! | `JOB_RESULT` | [`JobOutcome`] | worker → coordinator → client |

use serde::{Deserialize, Serialize};
use std::fmt;

use super::connectivity::ConnectivityInfo;
use super::job::Job;
use super::outcome::JobOutcome;

/// The `kind` tag of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    RegisterWorker,
    JobRequest,
    JobResult,
}

impl MessageKind {
    pub const ALL: [MessageKind; 3] = [
        MessageKind::RegisterWorker,
        MessageKind::JobRequest,
        MessageKind::JobResult,
    ];

    /// The tag as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::RegisterWorker => "REGISTER_WORKER",
            MessageKind::JobRequest => "JOB_REQUEST",
            MessageKind::JobResult => "JOB_RESULT",
        }
    }

    /// Parses a wire tag; `None` for anything unrecognized.
    pub fn from_wire(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol message.
///
/// Serialized as `{"kind": "...", "payload": ...}`.
///
/// # Example
///
/// ```
/// use jobrelay_common::protocol::{Envelope, Job, MessageKind};
/// use serde_json::json;
///
/// let envelope = Envelope::JobRequest(Job::new("Echo", json!(42)));
/// assert_eq!(envelope.kind(), MessageKind::JobRequest);
///
/// let wire = serde_json::to_value(&envelope).unwrap();
/// assert_eq!(wire["kind"], "JOB_REQUEST");
/// assert_eq!(wire["payload"]["toolName"], "Echo");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Envelope {
    RegisterWorker(ConnectivityInfo),
    JobRequest(Job),
    JobResult(JobOutcome),
}

impl Envelope {
    pub fn kind(&self) -> MessageKind {
        match self {
            Envelope::RegisterWorker(_) => MessageKind::RegisterWorker,
            Envelope::JobRequest(_) => MessageKind::JobRequest,
            Envelope::JobResult(_) => MessageKind::JobResult,
        }
    }
}
