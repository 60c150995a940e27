pub mod conversions;
pub mod script;

pub use script::ScriptTool;
