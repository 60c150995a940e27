use serde_json::Value;

use crate::protocol::error::{JobRelayError, Result};
use crate::protocol::{Envelope, MessageKind};

/// JSON codec for envelopes
///
/// Envelopes are encoded as `{"kind": ..., "payload": ...}`. Decoding looks
/// at the `kind` tag before touching the payload, so an unrecognized kind is
/// reported as [`JobRelayError::UnknownKind`] rather than as a generic
/// deserialization failure.
///
/// # Example
///
/// ```
/// use jobrelay_common::transport::JsonCodec;
/// use jobrelay_common::protocol::{Envelope, Job};
/// use serde_json::json;
///
/// let envelope = Envelope::JobRequest(Job::new("Echo", json!(42)));
/// let encoded = JsonCodec::encode_envelope(&envelope).unwrap();
/// let decoded = JsonCodec::decode_envelope(&encoded).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
pub struct JsonCodec;

impl JsonCodec {
    /// Encode an envelope to bytes
    pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(envelope)?)
    }

    /// Decode an envelope from bytes
    ///
    /// # Errors
    ///
    /// - `JsonSerialization` if the bytes are not JSON, or the payload does
    ///   not match the type its kind requires
    /// - `Protocol` if the `kind` tag is missing or not a string
    /// - `UnknownKind` if the `kind` tag is not one this protocol defines
    pub fn decode_envelope(data: &[u8]) -> Result<Envelope> {
        let value: Value = serde_json::from_slice(data)?;

        let tag = value
            .get("kind")
            .ok_or_else(|| JobRelayError::Protocol("Envelope has no kind".to_string()))?
            .as_str()
            .ok_or_else(|| JobRelayError::Protocol("Envelope kind is not a string".to_string()))?;

        if MessageKind::from_wire(tag).is_none() {
            return Err(JobRelayError::UnknownKind(tag.to_string()));
        }

        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ConnectivityInfo, FailureKind, Job, JobOutcome};
    use serde_json::json;

    #[test]
    fn test_json_codec_job_request_round_trip() {
        let envelope = Envelope::JobRequest(Job::new("Echo", json!({"arg": 42})));

        let encoded = JsonCodec::encode_envelope(&envelope).unwrap();
        let decoded = JsonCodec::decode_envelope(&encoded).unwrap();

        assert_eq!(envelope, decoded);
    }

    #[test]
    fn test_json_codec_failure_outcome_round_trip() {
        let envelope = Envelope::JobResult(JobOutcome::failure(FailureKind::LoadFailure, "syntax error"));

        let encoded = JsonCodec::encode_envelope(&envelope).unwrap();
        let decoded = JsonCodec::decode_envelope(&encoded).unwrap();

        assert_eq!(envelope, decoded);
    }

    #[test]
    fn test_decode_accepts_hand_written_registration() {
        let raw = br#"{"kind":"REGISTER_WORKER","payload":{"name":"w1","host":"127.0.0.1","port":9001}}"#;
        let decoded = JsonCodec::decode_envelope(raw).unwrap();
        assert_eq!(
            decoded,
            Envelope::RegisterWorker(ConnectivityInfo::worker("w1", "127.0.0.1", 9001))
        );
    }

    #[test]
    fn test_decode_unknown_kind() {
        let raw = br#"{"kind":"SHUTDOWN","payload":null}"#;
        match JsonCodec::decode_envelope(raw) {
            Err(JobRelayError::UnknownKind(kind)) => assert_eq!(kind, "SHUTDOWN"),
            other => panic!("Expected UnknownKind, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_missing_kind() {
        let raw = br#"{"payload":{"toolName":"Echo","parameter":1}}"#;
        assert!(matches!(
            JsonCodec::decode_envelope(raw),
            Err(JobRelayError::Protocol(_))
        ));
    }

    #[test]
    fn test_decode_non_string_kind() {
        let raw = br#"{"kind":7,"payload":null}"#;
        assert!(matches!(
            JsonCodec::decode_envelope(raw),
            Err(JobRelayError::Protocol(_))
        ));
    }

    #[test]
    fn test_decode_payload_mismatch() {
        // JOB_REQUEST must carry a Job, not connectivity info
        let raw = br#"{"kind":"JOB_REQUEST","payload":{"host":"h","port":1}}"#;
        assert!(matches!(
            JsonCodec::decode_envelope(raw),
            Err(JobRelayError::JsonSerialization(_))
        ));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            JsonCodec::decode_envelope(&[0xFF, 0x00, 0x12]),
            Err(JobRelayError::JsonSerialization(_))
        ));
    }
}
