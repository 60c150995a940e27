use serde::{Deserialize, Serialize};
use std::fmt;

/// A reachable TCP endpoint.
///
/// Workers carry a name; the coordinator's own endpoint (as seen from a
/// worker or client) has none.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ConnectivityInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    host: String,
    port: u16,
}

impl ConnectivityInfo {
    /// Endpoint of a named worker.
    pub fn worker(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: Some(name.into()),
            host: host.into(),
            port,
        }
    }

    /// Anonymous endpoint (the coordinator, a code source).
    pub fn endpoint(host: impl Into<String>, port: u16) -> Self {
        Self {
            name: None,
            host: host.into(),
            port,
        }
    }

    /// The worker name, if present and non-empty.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, suitable for connecting.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ConnectivityInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}@{}:{}", name, self.host, self.port),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}
