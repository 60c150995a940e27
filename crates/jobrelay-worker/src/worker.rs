use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use jobrelay_common::protocol::error::{JobRelayError, Result};
use jobrelay_common::transport::TcpTransport;
use jobrelay_common::{ConnectivityInfo, Envelope, FailureKind, Job, JobOutcome};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::loader::CodeLoader;

/// Default host a worker binds on.
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
/// Default host a worker advertises to the coordinator.
pub const DEFAULT_ADVERTISED_HOST: &str = "127.0.0.1";

/// Exponential backoff for registering with the coordinator.
#[derive(Debug, Clone)]
pub struct RegistrationRetry {
    /// Total attempts, including the first
    ///
    /// Default: 5
    pub max_attempts: u32,
    /// Wait after the first failed attempt
    ///
    /// Default: 100ms
    pub initial_backoff: Duration,
    /// Cap on a single wait
    ///
    /// Default: 5s
    pub max_backoff: Duration,
    /// Growth factor between waits
    ///
    /// Default: 2.0
    pub multiplier: f64,
}

impl Default for RegistrationRetry {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RegistrationRetry {
    /// Wait after `failed` unsuccessful attempts (1-based).
    pub fn backoff(&self, failed: u32) -> Duration {
        let factor = self.multiplier.powi(failed.saturating_sub(1) as i32);
        let millis = self.initial_backoff.as_millis() as f64 * factor;
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Configuration for a worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name the worker registers under
    pub name: String,
    /// Host the coordinator should connect to
    ///
    /// Default: `127.0.0.1`
    pub advertised_host: String,
    /// Host to bind the listening socket on
    ///
    /// Default: `0.0.0.0`
    pub bind_host: String,
    /// Listening port; 0 picks an ephemeral port, which is then advertised
    pub port: u16,
    /// Where to register
    pub coordinator: ConnectivityInfo,
    pub retry: RegistrationRetry,
}

impl WorkerConfig {
    pub fn new(name: impl Into<String>, port: u16, coordinator: ConnectivityInfo) -> Self {
        Self {
            name: name.into(),
            advertised_host: DEFAULT_ADVERTISED_HOST.to_string(),
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port,
            coordinator,
            retry: RegistrationRetry::default(),
        }
    }

    pub fn with_advertised_host(mut self, host: impl Into<String>) -> Self {
        self.advertised_host = host.into();
        self
    }

    pub fn with_bind_host(mut self, host: impl Into<String>) -> Self {
        self.bind_host = host.into();
        self
    }

    pub fn with_retry(mut self, retry: RegistrationRetry) -> Self {
        self.retry = retry;
        self
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    /// Checks the settings that would make the worker unreachable or
    /// unregistrable.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(JobRelayError::Configuration("worker name must not be empty".to_string()));
        }
        if self.advertised_host.trim().is_empty() {
            return Err(JobRelayError::Configuration("advertised host must not be empty".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(JobRelayError::Configuration(
                "registration needs at least one attempt".to_string(),
            ));
        }
        Ok(())
    }
}

/// Executes jobs against the tools its loader resolves.
///
/// Shared by every connection the worker accepts.
pub struct Worker {
    name: String,
    loader: Arc<CodeLoader>,
}

impl Worker {
    pub fn new(name: impl Into<String>, loader: Arc<CodeLoader>) -> Self {
        Self {
            name: name.into(),
            loader,
        }
    }

    /// Resolves the job's tool and runs it on the blocking pool.
    ///
    /// Every failure becomes a failure outcome, including a panicking tool.
    pub async fn execute_job(&self, job: Job) -> JobOutcome {
        let (tool_name, parameter) = job.into_parts();

        let tool = match self.loader.resolve(&tool_name).await {
            Ok(tool) => tool,
            Err(e) => {
                warn!(worker = %self.name, tool = %tool_name, error = %e, "Cannot resolve tool");
                return JobOutcome::from_error(&e);
            }
        };

        match tokio::task::spawn_blocking(move || tool.execute(parameter)).await {
            Ok(Ok(result)) => {
                debug!(worker = %self.name, tool = %tool_name, "Job completed");
                JobOutcome::success(result)
            }
            Ok(Err(e)) => {
                warn!(worker = %self.name, tool = %tool_name, error = %e, "Tool failed");
                let message = match e {
                    JobRelayError::ToolExecution(message) => message,
                    other => other.to_string(),
                };
                JobOutcome::failure(FailureKind::ToolExecution, message)
            }
            Err(join_error) if join_error.is_panic() => {
                let payload = join_error.into_panic();
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(worker = %self.name, tool = %tool_name, %detail, "Tool panicked");
                JobOutcome::failure(
                    FailureKind::ToolExecution,
                    format!("tool {} panicked: {}", tool_name, detail),
                )
            }
            Err(join_error) => JobOutcome::failure(
                FailureKind::Internal,
                format!("tool task did not complete: {}", join_error),
            ),
        }
    }

    /// Handles one accepted connection: one `JOB_REQUEST` in, one
    /// `JOB_RESULT` out.
    ///
    /// Any other kind is a protocol error and gets no reply.
    pub async fn handle_connection<S>(&self, stream: &mut S, peer: SocketAddr) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let envelope = TcpTransport::receive_envelope(stream).await?;
        debug!(worker = %self.name, %peer, kind = %envelope.kind(), "Envelope received");

        match envelope {
            Envelope::JobRequest(job) => {
                let outcome = self.execute_job(job).await;
                TcpTransport::send_envelope(stream, &Envelope::JobResult(outcome)).await
            }
            other => Err(JobRelayError::Protocol(format!(
                "{} is not accepted by a worker",
                other.kind()
            ))),
        }
    }
}
