use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::error::{JobRelayError, Result};
use crate::protocol::Envelope;
use crate::transport::codec::JsonCodec;

/// Maximum message size (100 MB)
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// Async TCP transport for jobrelay envelopes.
///
/// Used by every role: the coordinator for both its inbound and its
/// forwarding connections, workers for registration and job handling, and
/// clients for submission. The read/write helpers are generic over the
/// stream so handlers can be driven by in-memory pipes in tests.
///
/// # Wire Protocol
///
/// Messages are sent with a 4-byte length prefix (big-endian u32) followed
/// by the JSON-encoded envelope:
///
/// ```text
/// [4-byte length] [JSON data]
/// ```
///
/// No timeouts are applied here; callers that want one wrap the call in
/// `tokio::time::timeout`.
///
/// # Example
///
/// ```no_run
/// use jobrelay_common::transport::TcpTransport;
/// use jobrelay_common::protocol::{Envelope, Job};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut stream = TcpTransport::connect("127.0.0.1:8000").await?;
///
/// let request = Envelope::JobRequest(Job::new("Echo", json!(42)));
/// let reply = TcpTransport::exchange(&mut stream, &request).await?;
/// # Ok(())
/// # }
/// ```
pub struct TcpTransport;

impl TcpTransport {
    /// Connects to a remote endpoint.
    ///
    /// The address may resolve to several socket addresses; each is tried in
    /// turn until one accepts.
    pub async fn connect(addr: &str) -> Result<TcpStream> {
        let socket_addrs = tokio::net::lookup_host(addr)
            .await
            .map_err(|e| JobRelayError::Connection(format!("Invalid address '{}': {}", addr, e)))?;

        let mut last_err = None;
        for socket_addr in socket_addrs {
            match TcpStream::connect(socket_addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }

        Err(JobRelayError::Connection(format!(
            "Failed to connect to {}: {}",
            addr,
            last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no addresses resolved".to_string())
        )))
    }

    /// Sends one envelope and waits for one envelope in reply.
    pub async fn exchange<S>(stream: &mut S, envelope: &Envelope) -> Result<Envelope>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        Self::send_envelope(stream, envelope).await?;
        Self::receive_envelope(stream).await
    }

    /// Encodes and sends one envelope.
    pub async fn send_envelope<W>(stream: &mut W, envelope: &Envelope) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let encoded = JsonCodec::encode_envelope(envelope)?;
        Self::send_message(stream, &encoded).await
    }

    /// Receives and decodes one envelope.
    pub async fn receive_envelope<R>(stream: &mut R) -> Result<Envelope>
    where
        R: AsyncRead + Unpin,
    {
        let data = Self::receive_message(stream).await?;
        JsonCodec::decode_envelope(&data)
    }

    /// Sends a message with length prefix.
    ///
    /// Wire format: `[4-byte length as u32 big-endian] + [data]`
    pub async fn send_message<W>(stream: &mut W, data: &[u8]) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if data.len() > MAX_MESSAGE_SIZE {
            return Err(JobRelayError::Protocol(format!(
                "Message too large: {} bytes (max {} bytes)",
                data.len(),
                MAX_MESSAGE_SIZE
            )));
        }
        let len = data.len() as u32;

        stream
            .write_all(&len.to_be_bytes())
            .await
            .map_err(|e| Self::map_io_error(e, "writing length prefix"))?;

        stream
            .write_all(data)
            .await
            .map_err(|e| Self::map_io_error(e, "writing data"))?;

        stream
            .flush()
            .await
            .map_err(|e| Self::map_io_error(e, "flushing stream"))?;

        Ok(())
    }

    /// Receives a message with length prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The peer closes before a full frame arrives
    /// - The announced length exceeds the maximum size (100 MB)
    /// - Reading from the stream fails
    pub async fn receive_message<R>(stream: &mut R) -> Result<Vec<u8>>
    where
        R: AsyncRead + Unpin,
    {
        let mut len_buf = [0u8; 4];
        stream
            .read_exact(&mut len_buf)
            .await
            .map_err(|e| Self::map_io_error(e, "reading length prefix"))?;

        let len = u32::from_be_bytes(len_buf) as usize;

        // Validate length to prevent allocation of excessively large buffers
        if len > MAX_MESSAGE_SIZE {
            return Err(JobRelayError::Protocol(format!(
                "Message too large: {} bytes (max {} bytes)",
                len, MAX_MESSAGE_SIZE
            )));
        }

        let mut buf = vec![0u8; len];
        stream
            .read_exact(&mut buf)
            .await
            .map_err(|e| Self::map_io_error(e, "reading data"))?;

        Ok(buf)
    }

    /// Map IO errors to appropriate JobRelayError variants
    ///
    /// - Peer closed / reset -> `Connection`
    /// - Timeouts -> `Timeout`
    /// - Other IO errors -> `Io`
    fn map_io_error(err: std::io::Error, context: &str) -> JobRelayError {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                JobRelayError::Connection(format!("{}: connection closed by peer", context))
            }
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::NotConnected => {
                JobRelayError::Connection(format!("{}: connection lost", context))
            }
            std::io::ErrorKind::TimedOut => JobRelayError::Timeout(0),
            _ => JobRelayError::Io(err),
        }
    }
}
