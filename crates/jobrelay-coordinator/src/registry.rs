use std::collections::HashMap;

use jobrelay_common::protocol::error::{JobRelayError, Result};
use jobrelay_common::ConnectivityInfo;

/// Worker name to endpoint mapping, built from registrations.
///
/// Grows only. A later registration under the same name overwrites the
/// endpoint.
#[derive(Debug, Default)]
pub struct Registry {
    workers: HashMap<String, ConnectivityInfo>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the entry for `info`'s name.
    ///
    /// Returns the endpoint previously registered under that name, if any.
    /// Connectivity info without a name cannot be registered.
    pub fn register(&mut self, info: ConnectivityInfo) -> Result<Option<ConnectivityInfo>> {
        let name = info
            .name()
            .ok_or_else(|| {
                JobRelayError::Protocol(format!("Registration from {} carries no worker name", info))
            })?
            .to_string();

        Ok(self.workers.insert(name, info))
    }

    pub fn lookup(&self, name: &str) -> Option<&ConnectivityInfo> {
        self.workers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.workers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workers.keys().cloned().collect();
        names.sort();
        names
    }
}
