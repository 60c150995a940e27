use std::net::SocketAddr;
use std::time::Duration;

use jobrelay_common::protocol::error::{JobRelayError, Result};
use jobrelay_common::transport::TcpTransport;
use jobrelay_common::{ConnectivityInfo, Envelope, Job, JobOutcome};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::load_balancer::{LoadBalancer, RotationPolicy};
use crate::registry::Registry;

/// Default bind host for the coordinator.
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Configuration for a coordinator process.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Host to bind the listening socket on
    ///
    /// Default: `0.0.0.0`
    pub bind_host: String,
    /// Listening port; 0 picks an ephemeral port
    pub port: u16,
    /// Treatment of workers that register again under a known name
    ///
    /// Default: `RotationPolicy::Deduplicate`
    pub rotation: RotationPolicy,
    /// Upper bound on one forwarded round trip to a worker
    ///
    /// `None` waits for as long as the worker takes.
    /// Default: `None`
    pub forward_timeout: Option<Duration>,
}

impl CoordinatorConfig {
    pub fn new(port: u16) -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port,
            rotation: RotationPolicy::default(),
            forward_timeout: None,
        }
    }

    pub fn with_bind_host(mut self, host: impl Into<String>) -> Self {
        self.bind_host = host.into();
        self
    }

    pub fn with_rotation(mut self, rotation: RotationPolicy) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_forward_timeout(mut self, timeout: Duration) -> Self {
        self.forward_timeout = Some(timeout);
        self
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

/// jobrelay Coordinator - registers workers and relays jobs to them.
///
/// The coordinator owns exactly one [`Registry`] and one [`LoadBalancer`].
/// Every accepted connection is handled against a shared reference to it.
///
/// # Connection Handling
///
/// Each connection carries one envelope exchange:
///
/// 1. **REGISTER_WORKER**: the worker is added to the registry and to the
///    rotation; no reply is sent
/// 2. **JOB_REQUEST**: a worker is picked round-robin, the job is forwarded on
///    a fresh connection, and the worker's `JOB_RESULT` is written back to the
///    client. When no result can be obtained the coordinator writes its own
///    failure result instead
/// 3. **JOB_RESULT** or an unrecognized kind: protocol error, the connection
///    is dropped without a reply
///
/// # Locking
///
/// Registration holds the registry write lock while it appends to the
/// rotation, so a name that can be selected is always registered. Selection
/// takes only the balancer lock to advance the cursor, then a registry read
/// lock for the lookup.
pub struct Coordinator {
    registry: RwLock<Registry>,
    load_balancer: Mutex<LoadBalancer>,
    forward_timeout: Option<Duration>,
}

impl Coordinator {
    /// Creates a coordinator with an empty registry.
    pub fn new(config: &CoordinatorConfig) -> Self {
        Self {
            registry: RwLock::new(Registry::new()),
            load_balancer: Mutex::new(LoadBalancer::new(config.rotation)),
            forward_timeout: config.forward_timeout,
        }
    }

    /// Registers a worker and makes it eligible for dispatch.
    pub async fn register_worker(&self, info: ConnectivityInfo) -> Result<()> {
        let mut registry = self.registry.write().await;
        let previous = registry.register(info.clone())?;

        // Checked by Registry::register
        let name = info.name().unwrap_or_default();
        let added = self.load_balancer.lock().await.add_worker(name);

        match previous {
            Some(old) => info!(worker = %info, previous = %old, added_to_rotation = added, "Worker re-registered"),
            None => info!(worker = %info, "Worker registered"),
        }
        Ok(())
    }

    /// Picks the next worker round-robin and resolves its endpoint.
    ///
    /// # Errors
    /// - `NoWorkersAvailable` if nothing has registered yet
    /// - `RegistryInconsistency` if the rotation names an unregistered worker
    pub async fn select_worker(&self) -> Result<ConnectivityInfo> {
        let name = self.load_balancer.lock().await.next_worker()?;

        let registry = self.registry.read().await;
        match registry.lookup(&name) {
            Some(info) => Ok(info.clone()),
            None => {
                error!(worker = %name, "Selected worker is missing from the registry");
                Err(JobRelayError::RegistryInconsistency(name))
            }
        }
    }

    /// Relays one job to the next worker and returns its outcome.
    ///
    /// Never fails: errors on the coordinator side become failure outcomes.
    pub async fn dispatch(&self, job: Job) -> JobOutcome {
        let tool = job.tool_name().to_string();

        let target = match self.select_worker().await {
            Ok(target) => target,
            Err(e) => {
                warn!(%tool, error = %e, "No worker for job");
                return JobOutcome::from_error(&e);
            }
        };

        debug!(%tool, worker = %target, "Forwarding job");
        match self.forward(&target, &Envelope::JobRequest(job)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(%tool, worker = %target, error = %e, "Forwarding failed");
                JobOutcome::from_error(&e)
            }
        }
    }

    /// Sends `request` to `target` on a fresh connection and waits for its result.
    async fn forward(&self, target: &ConnectivityInfo, request: &Envelope) -> Result<JobOutcome> {
        let round_trip = async {
            let mut stream = TcpTransport::connect(&target.addr()).await?;
            TcpTransport::exchange(&mut stream, request).await
        };

        let reply = match self.forward_timeout {
            Some(limit) => tokio::time::timeout(limit, round_trip)
                .await
                .map_err(|_| JobRelayError::Timeout(limit.as_millis() as u64))??,
            None => round_trip.await?,
        };

        match reply {
            Envelope::JobResult(outcome) => Ok(outcome),
            other => Err(JobRelayError::InvalidResponse(format!(
                "worker {} replied with {} instead of JOB_RESULT",
                target,
                other.kind()
            ))),
        }
    }

    /// Handles one accepted connection.
    ///
    /// Returns an error for anything that ends the exchange without a
    /// reply: decode failures, unknown kinds and misdirected kinds.
    pub async fn handle_connection<S>(&self, stream: &mut S, peer: SocketAddr) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let envelope = TcpTransport::receive_envelope(stream).await?;
        debug!(%peer, kind = %envelope.kind(), "Envelope received");

        match envelope {
            Envelope::RegisterWorker(info) => self.register_worker(info).await,
            Envelope::JobRequest(job) => {
                let outcome = self.dispatch(job).await;
                TcpTransport::send_envelope(stream, &Envelope::JobResult(outcome)).await
            }
            Envelope::JobResult(_) => Err(JobRelayError::Protocol(
                "JOB_RESULT is not accepted by the coordinator".to_string(),
            )),
        }
    }

    /// Rotation snapshot in selection order.
    pub async fn workers(&self) -> Vec<String> {
        self.load_balancer.lock().await.workers()
    }

    /// Current endpoint registered for `name`.
    pub async fn lookup(&self, name: &str) -> Option<ConnectivityInfo> {
        self.registry.read().await.lookup(name).cloned()
    }

    pub async fn worker_count(&self) -> usize {
        self.registry.read().await.len()
    }
}
