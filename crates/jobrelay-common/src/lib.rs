//! jobrelay Common Types and Transport
//!
//! This crate provides the protocol definitions, TCP transport layer and
//! configuration files shared by every jobrelay process.
//!
//! # Overview
//!
//! jobrelay is a distributed job-execution system: a coordinator accepts jobs
//! from clients, picks a registered worker round-robin, forwards the job and
//! relays the worker's outcome back. This crate contains the pieces all
//! three roles agree on:
//!
//! - **Protocol Layer**: Envelope, Job, ConnectivityInfo, JobOutcome and the error taxonomy
//! - **Transport Layer**: TCP with one envelope exchange per connection
//! - **Configuration**: properties files with environment overrides
//!
//! # Architecture
//!
//! The system uses a simple wire protocol:
//! - **Serialization**: JSON, `{"kind": ..., "payload": ...}`
//! - **Message Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//! - **Max Message Size**: 100 MB (prevents memory exhaustion)
//!
//! # Components
//!
//! - [`protocol`] - Core protocol types (Envelope, Job, JobOutcome, errors)
//! - [`transport`] - TCP transport and codec implementations
//! - [`config`] - Properties files
//!
//! # Example
//!
//! ```
//! use jobrelay_common::{Envelope, Job, JobOutcome};
//! use serde_json::json;
//!
//! // What a client sends
//! let request = Envelope::JobRequest(Job::new("Echo", json!(42)));
//!
//! // What it gets back
//! let reply = Envelope::JobResult(JobOutcome::success(json!(42)));
//! ```

pub mod config;
pub mod protocol;
pub mod transport;

pub use protocol::*;
