use std::sync::Arc;

use jobrelay_common::protocol::error::Result;
use jobrelay_common::{ToolParameter, ToolResult};

/// A named executable capability.
///
/// One loaded instance is shared by every connection that asks for its name,
/// and may be executed from several blocking threads at once. Implementations
/// must be stateless or synchronize internally.
pub trait Tool: Send + Sync {
    fn execute(&self, parameter: ToolParameter) -> Result<ToolResult>;
}

/// Builds a fresh tool instance.
pub type ToolFactory = Arc<dyn Fn() -> Result<Arc<dyn Tool>> + Send + Sync>;

impl<F> Tool for F
where
    F: Fn(ToolParameter) -> Result<ToolResult> + Send + Sync,
{
    fn execute(&self, parameter: ToolParameter) -> Result<ToolResult> {
        self(parameter)
    }
}

/// Wraps a constructor for a tool type into a [`ToolFactory`].
pub fn factory<T, F>(build: F) -> ToolFactory
where
    T: Tool + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Arc::new(move || Ok(Arc::new(build()) as Arc<dyn Tool>))
}
