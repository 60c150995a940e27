use std::fmt;
use std::str::FromStr;

use jobrelay_common::protocol::error::{JobRelayError, Result};

/// How the rotation treats a name that registers again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationPolicy {
    /// Each name appears in the rotation once.
    #[default]
    Deduplicate,
    /// Every registration appends, so a re-registered name is selected
    /// proportionally more often.
    Append,
}

impl RotationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RotationPolicy::Deduplicate => "dedupe",
            RotationPolicy::Append => "append",
        }
    }
}

impl fmt::Display for RotationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RotationPolicy {
    type Err = JobRelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dedupe" | "deduplicate" => Ok(RotationPolicy::Deduplicate),
            "append" => Ok(RotationPolicy::Append),
            other => Err(JobRelayError::Configuration(format!(
                "unknown rotation policy '{}' (expected 'dedupe' or 'append')",
                other
            ))),
        }
    }
}

/// Round-robin load balancer over worker names
///
/// Names are kept in registration order. `next_worker` takes `&mut self`, so
/// the caller's lock covers reading the length, advancing the cursor and
/// reading the name as one step. Adding a worker never resets the cursor.
#[derive(Debug, Default)]
pub struct LoadBalancer {
    workers: Vec<String>,
    /// Index of the last worker served
    cursor: Option<usize>,
    policy: RotationPolicy,
}

impl LoadBalancer {
    pub fn new(policy: RotationPolicy) -> Self {
        Self {
            workers: Vec::new(),
            cursor: None,
            policy,
        }
    }

    /// Add a worker to the rotation
    ///
    /// Returns `false` when the policy deduplicates and the name is already
    /// present.
    pub fn add_worker(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.policy == RotationPolicy::Deduplicate && self.workers.contains(&name) {
            return false;
        }
        self.workers.push(name);
        true
    }

    /// Get the next worker using round-robin
    pub fn next_worker(&mut self) -> Result<String> {
        if self.workers.is_empty() {
            return Err(JobRelayError::NoWorkersAvailable);
        }

        let index = match self.cursor {
            Some(last) => (last + 1) % self.workers.len(),
            None => 0,
        };
        self.cursor = Some(index);
        Ok(self.workers[index].clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.workers.iter().any(|w| w == name)
    }

    /// Number of rotation entries (counts duplicates under `Append`)
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Snapshot of the rotation in order
    pub fn workers(&self) -> Vec<String> {
        self.workers.clone()
    }
}
