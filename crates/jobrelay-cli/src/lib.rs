//! # JobRelay CLI
//!
//! Turns properties files and command-line flags into the configurations of
//! the three `jobrelay` processes:
//!
//! - `jobrelay coordinator`: accepts registrations and relays jobs
//! - `jobrelay worker`: registers with a coordinator and executes jobs
//! - `jobrelay submit`: submits one job and prints the raw JSON result

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use jobrelay_common::config::{Properties, HOST, NAME};
use jobrelay_common::protocol::error::{JobRelayError, Result};
use jobrelay_common::{ConnectivityInfo, ToolParameter};
use jobrelay_coordinator::{CoordinatorConfig, RotationPolicy};
use jobrelay_worker::worker::DEFAULT_ADVERTISED_HOST;
use jobrelay_worker::{BuiltinSource, DirectorySource, HttpSource, LayeredSource, RegistrationRetry, WorkerConfig};

/// Coordinator settings: `PORT` is required, `HOST` is the bind host.
pub fn coordinator_config(
    props: &Properties,
    rotation: Option<RotationPolicy>,
    forward_timeout_ms: Option<u64>,
) -> Result<CoordinatorConfig> {
    let mut config = CoordinatorConfig::new(props.port()?);
    if let Some(host) = props.get(HOST) {
        config = config.with_bind_host(host);
    }
    if let Some(rotation) = rotation {
        config = config.with_rotation(rotation);
    }
    if let Some(ms) = forward_timeout_ms {
        if ms == 0 {
            return Err(JobRelayError::Configuration(
                "forward timeout must be positive".to_string(),
            ));
        }
        config = config.with_forward_timeout(Duration::from_millis(ms));
    }
    Ok(config)
}

/// Address a client or worker uses to reach the coordinator.
///
/// `HOST` defaults to loopback, since the coordinator's own `HOST` is usually
/// a bind address.
pub fn coordinator_endpoint(props: &Properties) -> Result<ConnectivityInfo> {
    let host = props.get_or(HOST, DEFAULT_ADVERTISED_HOST);
    let host = if host == "0.0.0.0" { DEFAULT_ADVERTISED_HOST } else { host };
    Ok(ConnectivityInfo::endpoint(host, props.port()?))
}

/// Worker settings from its own file and the coordinator's.
pub fn worker_config(
    worker: &Properties,
    coordinator: &Properties,
    register_attempts: Option<u32>,
) -> Result<WorkerConfig> {
    let name = worker.require(NAME)?;
    let mut config = WorkerConfig::new(name, worker.port()?, coordinator_endpoint(coordinator)?);
    if let Some(host) = worker.get(HOST) {
        config = config.with_advertised_host(host);
    }
    if let Some(attempts) = register_attempts {
        config = config.with_retry(RegistrationRetry {
            max_attempts: attempts,
            ..RegistrationRetry::default()
        });
    }
    config.validate()?;
    Ok(config)
}

/// The worker's code source: built-in tools first, then the scripts
/// directory, then the HTTP code server.
pub fn code_source(scripts: Option<&Path>, code_server: Option<&Properties>) -> Result<LayeredSource> {
    let mut source = LayeredSource::new().with(BuiltinSource::with_defaults());

    if let Some(dir) = scripts {
        if !dir.is_dir() {
            return Err(JobRelayError::Configuration(format!(
                "scripts directory {} does not exist",
                dir.display()
            )));
        }
        source.push(Arc::new(DirectorySource::new(dir)));
    }

    if let Some(props) = code_server {
        let host = props.require(HOST)?;
        source.push(Arc::new(HttpSource::new(host, props.port()?)));
    }

    Ok(source)
}

/// Parses a job parameter given on the command line.
pub fn parse_parameter(text: &str) -> Result<ToolParameter> {
    serde_json::from_str(text)
        .map_err(|e| JobRelayError::Configuration(format!("parameter is not valid JSON: {}", e)))
}
