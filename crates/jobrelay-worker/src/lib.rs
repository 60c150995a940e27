//! JobRelay Worker
//!
//! Executes jobs forwarded by the coordinator. Tools are resolved by name
//! through a [`CodeSource`], instantiated once by the [`CodeLoader`] and then
//! shared by every job that names them.
//!
//! Tools come in two flavours: native Rust implementations of [`Tool`], and
//! JavaScript scripts run by [`ScriptTool`] on the Boa engine.

pub mod builtin;
pub mod code_source;
pub mod loader;
pub mod runtime;
pub mod server;
pub mod tool;
pub mod worker;

pub use code_source::{Artifact, BuiltinSource, CodeSource, DirectorySource, HttpSource, LayeredSource};
pub use loader::CodeLoader;
pub use runtime::ScriptTool;
pub use server::WorkerServer;
pub use tool::{factory, Tool, ToolFactory};
pub use worker::{RegistrationRetry, Worker, WorkerConfig};
