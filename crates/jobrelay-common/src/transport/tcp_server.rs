use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::protocol::error::{JobRelayError, Result};

/// Async TCP accept loop shared by the coordinator and workers.
///
/// Each accepted connection is handed to the handler on its own task, so one
/// slow or misbehaving peer never holds up the others. Handler errors are
/// logged and the connection dropped; they never stop the loop.
pub struct TcpServer {
    listener: TcpListener,
}

impl TcpServer {
    /// Creates a new TCP server bound to the specified address.
    ///
    /// # Arguments
    /// * `bind_addr` - The address to bind to (e.g., "0.0.0.0:8000"); port 0
    ///   picks an ephemeral port
    pub async fn bind(bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr).await.map_err(|e| {
            JobRelayError::Connection(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;

        Ok(Self { listener })
    }

    /// Gets the actual bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| JobRelayError::Connection(format!("Failed to get local addr: {}", e)))
    }

    /// Runs the accept loop forever with the given connection handler.
    ///
    /// A failed `accept` is logged and the loop continues.
    pub async fn run_with_handler<F, Fut>(self, handler: F) -> Result<()>
    where
        F: Fn(TcpStream, SocketAddr) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handler = Arc::new(handler);

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            debug!(%peer_addr, "Connection accepted");

            let handler = handler.clone();
            tokio::spawn(async move {
                if let Err(e) = handler(stream, peer_addr).await {
                    warn!(%peer_addr, error = %e, "Connection dropped");
                }
            });
        }
    }
}
