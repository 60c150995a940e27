//! Key/value configuration files
//!
//! Every jobrelay process reads its connectivity settings from small
//! properties files:
//!
//! ```text
//! # worker.properties
//! NAME=alpha
//! HOST=127.0.0.1
//! PORT=9001
//! ```
//!
//! Lines are `key=value` or `key: value`. Blank lines and lines starting with
//! `#` or `!` are ignored; keys and values are trimmed.
//!
//! ## Environment Overrides
//!
//! After a file is loaded, `JOBRELAY_<ROLE>_<KEY>` variables take precedence
//! over file values, e.g. `JOBRELAY_WORKER_PORT=9100` or
//! `JOBRELAY_COORDINATOR_HOST=10.0.0.2`.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::protocol::error::{JobRelayError, Result};

/// Host key.
pub const HOST: &str = "HOST";
/// Port key.
pub const PORT: &str = "PORT";
/// Worker name key.
pub const NAME: &str = "NAME";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "JOBRELAY";

/// Which process a properties file describes.
///
/// The role selects the environment override namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Coordinator,
    Worker,
    CodeSource,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Coordinator => "COORDINATOR",
            Role::Worker => "WORKER",
            Role::CodeSource => "CODE_SOURCE",
        }
    }

    /// Environment variable that overrides `key` for this role.
    pub fn env_key(&self, key: &str) -> String {
        format!("{}_{}_{}", ENV_PREFIX, self.as_str(), key.to_ascii_uppercase())
    }
}

/// Parsed properties file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: HashMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses properties text.
    ///
    /// Later occurrences of a key overwrite earlier ones. A non-comment line
    /// without a separator is a configuration error.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = HashMap::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let split_at = line.find(['=', ':']).ok_or_else(|| {
                JobRelayError::Configuration(format!(
                    "line {}: expected 'key=value', got '{}'",
                    index + 1,
                    line
                ))
            })?;

            let key = line[..split_at].trim();
            let value = line[split_at + 1..].trim();
            if key.is_empty() {
                return Err(JobRelayError::Configuration(format!(
                    "line {}: empty key",
                    index + 1
                )));
            }
            entries.insert(key.to_string(), value.to_string());
        }

        Ok(Self { entries })
    }

    /// Reads and parses a properties file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            JobRelayError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let props = Self::parse(&text)
            .map_err(|e| JobRelayError::Configuration(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), keys = props.entries.len(), "Loaded properties");
        Ok(props)
    }

    /// Reads a properties file, then applies the process environment for `role`.
    pub fn load_for(path: impl AsRef<Path>, role: Role) -> Result<Self> {
        let mut props = Self::load(path)?;
        props.overlay_env(role);
        Ok(props)
    }

    /// Applies `JOBRELAY_<ROLE>_<KEY>` overrides from the process environment.
    pub fn overlay_env(&mut self, role: Role) {
        self.overlay_with(role, |name| std::env::var(name).ok());
    }

    /// Applies overrides for the recognized keys using `lookup` to resolve
    /// environment variable names.
    pub fn overlay_with<F>(&mut self, role: Role, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in [HOST, PORT, NAME] {
            let env_key = role.env_key(key);
            if let Some(value) = lookup(&env_key) {
                debug!(%env_key, "Environment override");
                self.entries.insert(key.to_string(), value.trim().to_string());
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns the value for `key`, treating an empty value as missing.
    pub fn require(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(JobRelayError::Configuration(format!(
                "missing required key '{}'",
                key
            ))),
        }
    }

    /// Returns `key`, or `default` when it is absent or empty.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.get(key) {
            Some(value) if !value.is_empty() => value,
            _ => default,
        }
    }

    /// Parses the required `PORT` key.
    pub fn port(&self) -> Result<u16> {
        let raw = self.require(PORT)?;
        raw.parse::<u16>()
            .map_err(|_| JobRelayError::Configuration(format!("invalid port '{}'", raw)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
