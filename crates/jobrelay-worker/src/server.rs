//! TCP server for a worker
//!
//! The worker binds first, then registers, then serves. Binding first means
//! the coordinator can never select a worker that is not yet accepting.

use std::net::SocketAddr;
use std::sync::Arc;

use jobrelay_common::protocol::error::{JobRelayError, Result};
use jobrelay_common::transport::{TcpServer, TcpTransport};
use jobrelay_common::{ConnectivityInfo, Envelope};
use tracing::{error, info, warn};

use crate::loader::CodeLoader;
use crate::worker::{RegistrationRetry, Worker, WorkerConfig};

/// A bound worker, ready to register and serve.
pub struct WorkerServer {
    worker: Arc<Worker>,
    server: TcpServer,
    identity: ConnectivityInfo,
    coordinator: ConnectivityInfo,
    retry: RegistrationRetry,
}

impl WorkerServer {
    /// Validates `config` and binds the listening socket.
    pub async fn bind(config: WorkerConfig, loader: Arc<CodeLoader>) -> Result<Self> {
        config.validate()?;

        let server = TcpServer::bind(&config.bind_addr()).await?;
        let port = server.local_addr()?.port();
        let identity = ConnectivityInfo::worker(&config.name, &config.advertised_host, port);

        info!(
            worker = %identity,
            source = %loader.source().describe(),
            "Worker listening"
        );

        Ok(Self {
            worker: Arc::new(Worker::new(config.name, loader)),
            server,
            identity,
            coordinator: config.coordinator,
            retry: config.retry,
        })
    }

    /// What this worker registers: its name, advertised host and bound port.
    pub fn identity(&self) -> &ConnectivityInfo {
        &self.identity
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.server.local_addr()
    }

    /// Sends `REGISTER_WORKER` to the coordinator, retrying with backoff.
    ///
    /// # Errors
    /// `Connection` once every attempt has failed.
    pub async fn register(&self) -> Result<()> {
        let envelope = Envelope::RegisterWorker(self.identity.clone());
        let attempts = self.retry.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            match Self::send_registration(&self.coordinator, &envelope).await {
                Ok(()) => {
                    info!(worker = %self.identity, coordinator = %self.coordinator, attempt, "Registered");
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    let wait = self.retry.backoff(attempt);
                    warn!(
                        coordinator = %self.coordinator,
                        attempt,
                        retry_in_ms = wait.as_millis() as u64,
                        error = %e,
                        "Registration failed"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(coordinator = %self.coordinator, attempts, error = %e, "Giving up on registration");
                    return Err(JobRelayError::Connection(format!(
                        "could not register with {} after {} attempts: {}",
                        self.coordinator, attempts, e
                    )));
                }
            }
        }
    }

    async fn send_registration(coordinator: &ConnectivityInfo, envelope: &Envelope) -> Result<()> {
        let mut stream = TcpTransport::connect(&coordinator.addr()).await?;
        TcpTransport::send_envelope(&mut stream, envelope).await
    }

    /// Accepts job connections forever.
    pub async fn serve(self) -> Result<()> {
        let worker = self.worker;
        self.server
            .run_with_handler(move |mut stream, peer| {
                let worker = worker.clone();
                async move { worker.handle_connection(&mut stream, peer).await }
            })
            .await
    }

    /// Registers, then serves. Registration failure aborts startup.
    pub async fn run(self) -> Result<()> {
        self.register().await?;
        self.serve().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code_source::BuiltinSource;
    use jobrelay_common::{Job, JobOutcome};
    use serde_json::json;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn loader() -> Arc<CodeLoader> {
        Arc::new(CodeLoader::new(Arc::new(BuiltinSource::with_defaults())))
    }

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    fn config(name: &str, coordinator_port: u16) -> WorkerConfig {
        WorkerConfig::new(name, 0, ConnectivityInfo::endpoint("127.0.0.1", coordinator_port))
            .with_bind_host("127.0.0.1")
    }

    #[tokio::test]
    async fn test_ephemeral_port_is_advertised() {
        let server = WorkerServer::bind(config("alpha", 1), loader()).await.unwrap();
        let bound = server.local_addr().unwrap().port();

        assert_ne!(bound, 0);
        assert_eq!(server.identity().port(), bound);
        assert_eq!(server.identity().name(), Some("alpha"));
        assert_eq!(server.identity().host(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_empty_name_is_configuration_error() {
        let result = WorkerServer::bind(config("", 1), loader()).await;
        assert!(matches!(result, Err(JobRelayError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_register_sends_identity() {
        let coordinator = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = coordinator.local_addr().unwrap().port();

        let server = WorkerServer::bind(config("alpha", port), loader()).await.unwrap();
        let expected = server.identity().clone();

        let (registered, received) = tokio::join!(server.register(), async {
            let (mut stream, _) = coordinator.accept().await.unwrap();
            TcpTransport::receive_envelope(&mut stream).await.unwrap()
        });

        registered.unwrap();
        assert_eq!(received, Envelope::RegisterWorker(expected));
    }

    #[tokio::test]
    async fn test_register_gives_up_after_attempts() {
        let retry = RegistrationRetry {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(5),
            ..RegistrationRetry::default()
        };
        let server = WorkerServer::bind(config("alpha", closed_port()).with_retry(retry), loader())
            .await
            .unwrap();

        assert!(matches!(
            server.register().await,
            Err(JobRelayError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_register_retries_until_coordinator_appears() {
        let port = closed_port();
        let retry = RegistrationRetry {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(50),
            multiplier: 1.0,
        };
        let server = WorkerServer::bind(config("late", port).with_retry(retry), loader())
            .await
            .unwrap();

        let coordinator = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
            let (mut stream, _) = listener.accept().await.unwrap();
            TcpTransport::receive_envelope(&mut stream).await.unwrap()
        });

        server.register().await.unwrap();
        let received = coordinator.await.unwrap();
        assert!(matches!(received, Envelope::RegisterWorker(info) if info.name() == Some("late")));
    }

    #[tokio::test]
    async fn test_serve_answers_jobs() {
        let server = WorkerServer::bind(config("alpha", 1), loader()).await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(server.serve());

        for n in [5, 10] {
            let mut stream = TcpTransport::connect(&addr).await.unwrap();
            let reply = TcpTransport::exchange(&mut stream, &Envelope::JobRequest(Job::new("Fibonacci", json!(n))))
                .await
                .unwrap();
            let expected = if n == 5 { json!(5) } else { json!(55) };
            assert_eq!(reply, Envelope::JobResult(JobOutcome::success(expected)));
        }
    }
}
