//! TCP server for the coordinator
//!
//! Binds the listening socket and runs the accept loop, handing every
//! connection to the shared [`Coordinator`].

use std::net::SocketAddr;
use std::sync::Arc;

use jobrelay_common::protocol::error::Result;
use jobrelay_common::transport::TcpServer;
use tracing::info;

use crate::coordinator::{Coordinator, CoordinatorConfig};

/// A bound coordinator, ready to accept connections.
pub struct CoordinatorServer {
    coordinator: Arc<Coordinator>,
    server: TcpServer,
}

impl CoordinatorServer {
    /// Binds the listening socket described by `config`.
    ///
    /// Binding happens here rather than in [`run`](Self::run) so callers can
    /// read the actual port before the loop starts.
    pub async fn bind(config: &CoordinatorConfig) -> Result<Self> {
        let server = TcpServer::bind(&config.bind_addr()).await?;
        let coordinator = Arc::new(Coordinator::new(config));

        info!(
            addr = %server.local_addr()?,
            rotation = %config.rotation,
            forward_timeout_ms = config.forward_timeout.map(|t| t.as_millis() as u64),
            "Coordinator listening"
        );

        Ok(Self { coordinator, server })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.server.local_addr()
    }

    /// Shared handle, usable for introspection while the server runs.
    pub fn coordinator(&self) -> Arc<Coordinator> {
        self.coordinator.clone()
    }

    /// Accepts connections forever.
    pub async fn run(self) -> Result<()> {
        let coordinator = self.coordinator;
        self.server
            .run_with_handler(move |mut stream, peer| {
                let coordinator = coordinator.clone();
                async move { coordinator.handle_connection(&mut stream, peer).await }
            })
            .await
    }
}
