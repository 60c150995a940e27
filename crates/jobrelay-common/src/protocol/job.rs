use serde::{Deserialize, Serialize};

pub type ToolName = String;
pub type ToolParameter = serde_json::Value;

/// A request to run one tool with one parameter.
///
/// Jobs are built once per client request and travel
/// client → coordinator → worker without being modified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    tool_name: ToolName,
    parameter: ToolParameter,
}

impl Job {
    pub fn new(tool_name: impl Into<String>, parameter: ToolParameter) -> Self {
        Job {
            tool_name: tool_name.into(),
            parameter,
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn parameter(&self) -> &ToolParameter {
        &self.parameter
    }

    pub fn into_parts(self) -> (ToolName, ToolParameter) {
        (self.tool_name, self.parameter)
    }
}
