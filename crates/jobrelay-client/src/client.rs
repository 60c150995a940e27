use std::time::Duration;

use jobrelay_common::protocol::error::{JobRelayError, Result};
use jobrelay_common::transport::TcpTransport;
use jobrelay_common::{Envelope, Job, JobOutcome, ToolParameter, ToolResult};
use tracing::debug;

/// Submits jobs to a coordinator
///
/// Opens a fresh TCP connection per job, so clones can submit in parallel.
#[derive(Debug, Clone)]
pub struct JobRelayClient {
    coordinator_addr: String,
    timeout: Option<Duration>,
}

impl JobRelayClient {
    /// Create a client for the coordinator at `coordinator_addr` (`host:port`).
    ///
    /// Nothing is connected until the first submission.
    pub fn new(coordinator_addr: impl Into<String>) -> Self {
        Self {
            coordinator_addr: coordinator_addr.into(),
            timeout: None,
        }
    }

    /// Bound the whole round trip of each submission.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn coordinator_addr(&self) -> &str {
        &self.coordinator_addr
    }

    /// Submit a job and return the tool's result.
    ///
    /// A failure reported by the coordinator becomes `JobFailed`, carrying
    /// its kind and message.
    pub async fn submit(&self, tool_name: impl Into<String>, parameter: ToolParameter) -> Result<ToolResult> {
        self.submit_job(Job::new(tool_name, parameter)).await?.into_result()
    }

    /// Submit a job and return the raw outcome.
    pub async fn submit_job(&self, job: Job) -> Result<JobOutcome> {
        debug!(coordinator = %self.coordinator_addr, tool = %job.tool_name(), "Submitting job");
        let request = Envelope::JobRequest(job);

        let round_trip = async {
            let mut stream = TcpTransport::connect(&self.coordinator_addr).await?;
            TcpTransport::exchange(&mut stream, &request).await
        };

        let reply = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, round_trip)
                .await
                .map_err(|_| JobRelayError::Timeout(limit.as_millis() as u64))??,
            None => round_trip.await?,
        };

        match reply {
            Envelope::JobResult(outcome) => Ok(outcome),
            other => Err(JobRelayError::InvalidResponse(format!(
                "coordinator replied with {} instead of JOB_RESULT",
                other.kind()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobrelay_common::{ConnectivityInfo, FailureKind};
    use serde_json::json;
    use tokio::net::TcpListener;

    /// Accepts one connection, checks the request and answers with `reply`.
    async fn fake_coordinator(reply: Option<Envelope>) -> (String, tokio::task::JoinHandle<Envelope>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = TcpTransport::receive_envelope(&mut stream).await.unwrap();
            match reply {
                Some(reply) => TcpTransport::send_envelope(&mut stream, &reply).await.unwrap(),
                None => tokio::time::sleep(Duration::from_secs(5)).await,
            }
            request
        });

        (addr, handle)
    }

    #[tokio::test]
    async fn test_submit_success() {
        let (addr, handle) =
            fake_coordinator(Some(Envelope::JobResult(JobOutcome::success(json!(55))))).await;

        let client = JobRelayClient::new(addr);
        let result = client.submit("Fibonacci", json!(10)).await.unwrap();

        assert_eq!(result, json!(55));
        assert_eq!(
            handle.await.unwrap(),
            Envelope::JobRequest(Job::new("Fibonacci", json!(10)))
        );
    }

    #[tokio::test]
    async fn test_submit_failure_becomes_job_failed() {
        let reply = JobOutcome::failure(FailureKind::NoWorkersAvailable, "no workers");
        let (addr, _handle) = fake_coordinator(Some(Envelope::JobResult(reply))).await;

        match JobRelayClient::new(addr).submit("Echo", json!(1)).await {
            Err(JobRelayError::JobFailed { kind, message }) => {
                assert_eq!(kind, FailureKind::NoWorkersAvailable);
                assert_eq!(message, "no workers");
            }
            other => panic!("Expected JobFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_job_returns_raw_outcome() {
        let reply = JobOutcome::failure(FailureKind::UnknownTool, "Unknown tool: Nope");
        let (addr, _handle) = fake_coordinator(Some(Envelope::JobResult(reply.clone()))).await;

        let outcome = JobRelayClient::new(addr)
            .submit_job(Job::new("Nope", json!(null)))
            .await
            .unwrap();
        assert_eq!(outcome, reply);
    }

    #[tokio::test]
    async fn test_unexpected_reply_kind() {
        let reply = Envelope::RegisterWorker(ConnectivityInfo::worker("w", "127.0.0.1", 1));
        let (addr, _handle) = fake_coordinator(Some(reply)).await;

        let result = JobRelayClient::new(addr).submit("Echo", json!(1)).await;
        assert!(matches!(result, Err(JobRelayError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_timeout() {
        let (addr, _handle) = fake_coordinator(None).await;

        let client = JobRelayClient::new(addr).with_timeout(Duration::from_millis(50));
        let result = client.submit("Echo", json!(1)).await;
        assert!(matches!(result, Err(JobRelayError::Timeout(50))));
    }

    #[tokio::test]
    async fn test_unreachable_coordinator() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let result = JobRelayClient::new(format!("127.0.0.1:{}", port))
            .submit("Echo", json!(1))
            .await;
        assert!(matches!(result, Err(JobRelayError::Connection(_))));
    }

    #[test]
    fn test_client_is_clonable() {
        let client = JobRelayClient::new("localhost:8000");
        let other = client.clone();
        assert_eq!(client.coordinator_addr(), other.coordinator_addr());
    }
}
