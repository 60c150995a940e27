pub mod connectivity;
pub mod envelope;
pub mod error;
pub mod job;
pub mod outcome;


pub use connectivity::ConnectivityInfo;
pub use envelope::{Envelope, MessageKind};
pub use error::{JobRelayError, Result};
pub use job::{Job, ToolName, ToolParameter};
pub use outcome::{FailureKind, JobOutcome, ToolResult};
