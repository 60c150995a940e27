//! Tools compiled into the worker

use jobrelay_common::protocol::error::{JobRelayError, Result};
use jobrelay_common::{ToolParameter, ToolResult};
use serde_json::Value;

use crate::tool::Tool;

/// `execute(x) = x`
#[derive(Debug, Default, Clone, Copy)]
pub struct Echo;

impl Tool for Echo {
    fn execute(&self, parameter: ToolParameter) -> Result<ToolResult> {
        Ok(parameter)
    }
}

/// `execute(n) = fib(n)` with `fib(0) = 0`, `fib(1) = 1`.
///
/// Accepts a non-negative integer, or a string holding one.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fibonacci;

impl Fibonacci {
    pub fn compute(n: u64) -> Result<u64> {
        if n == 0 {
            return Ok(0);
        }
        let (mut previous, mut current) = (0u64, 1u64);
        for _ in 1..n {
            let next = previous.checked_add(current).ok_or_else(|| {
                JobRelayError::ToolExecution(format!("fib({}) overflows a 64-bit integer", n))
            })?;
            previous = current;
            current = next;
        }
        Ok(current)
    }

    fn parse(parameter: &Value) -> Result<u64> {
        let parsed = match parameter {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| {
            JobRelayError::ToolExecution(format!(
                "Fibonacci expects a non-negative integer, got {}",
                parameter
            ))
        })
    }
}

impl Tool for Fibonacci {
    fn execute(&self, parameter: ToolParameter) -> Result<ToolResult> {
        let n = Self::parse(&parameter)?;
        Ok(Value::from(Self::compute(n)?))
    }
}
