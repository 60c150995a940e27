use std::sync::Arc;

use boa_engine::{js_string, object::JsObject, value::JsValue, Context, Source};
use jobrelay_common::protocol::error::{JobRelayError, Result};
use jobrelay_common::{ToolParameter, ToolResult};
use tracing::debug;

use crate::runtime::conversions::{js_value_to_json, json_to_js_value};
use crate::tool::Tool;

/// A tool written in JavaScript.
///
/// The script must define a global `execute(parameter)` function.
///
/// Boa's `Context` is not thread-safe, so the tool keeps only the source and
/// evaluates it in a fresh context on every call. One instance can therefore
/// be executed from several threads at once.
#[derive(Debug, Clone)]
pub struct ScriptTool {
    name: String,
    source: Arc<str>,
}

impl ScriptTool {
    /// Checks that the script evaluates and defines a callable `execute`.
    ///
    /// # Errors
    /// `LoadFailure` if evaluation throws or `execute` is missing or not a
    /// function.
    pub fn compile(name: impl Into<String>, source: Arc<str>) -> Result<Self> {
        let name = name.into();
        let mut ctx = Context::default();
        Self::prepare(&mut ctx, &source).map_err(|reason| JobRelayError::load_failure(&name, reason))?;

        debug!(tool = %name, bytes = source.len(), "Script compiled");
        Ok(Self { name, source })
    }

    /// Evaluates the script in `ctx` and returns its `execute` function.
    fn prepare(ctx: &mut Context, source: &str) -> std::result::Result<JsObject, String> {
        ctx.eval(Source::from_bytes(source))
            .map_err(|e| format!("script evaluation failed: {}", e))?;

        let global = ctx.global_object();
        let execute = global
            .get(js_string!("execute"), ctx)
            .map_err(|e| format!("cannot read execute: {}", e))?;

        match execute.as_object() {
            Some(function) if function.is_callable() => Ok(function.clone()),
            _ => Err("script does not define a function execute(parameter)".to_string()),
        }
    }
}

impl Tool for ScriptTool {
    fn execute(&self, parameter: ToolParameter) -> Result<ToolResult> {
        let mut ctx = Context::default();
        let function = Self::prepare(&mut ctx, &self.source).map_err(JobRelayError::ToolExecution)?;

        let argument = json_to_js_value(parameter, &mut ctx)?;
        let result = function
            .call(&JsValue::undefined(), &[argument], &mut ctx)
            .map_err(|e| JobRelayError::ToolExecution(format!("{} threw: {}", self.name, e)))?;

        js_value_to_json(result, &mut ctx)
    }
}
