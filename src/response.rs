//! Turns server frames into recognition results, keep-alives or classified
//! service errors.

use crate::error::{Result, VoxwireError};
use crate::protocol::compression::gzip_decompress;
use crate::protocol::frame::{Frame, Message};
use crate::protocol::header::Compression;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a failure reported to the result consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Network,
    ServiceUnavailable,
    InvalidRequest,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::Network => "network",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Half-open range `[start, end)` of server error codes mapped to one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBand {
    pub start: i64,
    pub end: i64,
    pub kind: ErrorKind,
}

impl ErrorBand {
    pub fn new(start: i64, end: i64, kind: ErrorKind) -> Self {
        Self { start, end, kind }
    }

    pub fn contains(&self, code: i32) -> bool {
        let code = code as i64;
        self.start <= code && code < self.end
    }
}

/// Ordered list of error bands. The first band containing a code wins;
/// codes outside every band are `ErrorKind::Unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBands {
    bands: Vec<ErrorBand>,
}

impl Default for ErrorBands {
    fn default() -> Self {
        Self::new(default_error_bands())
    }
}

/// Bands used when the configuration does not provide its own.
pub fn default_error_bands() -> Vec<ErrorBand> {
    vec![
        ErrorBand::new(1000, 1100, ErrorKind::Authentication),
        ErrorBand::new(1100, 1200, ErrorKind::Network),
        ErrorBand::new(1200, 1300, ErrorKind::ServiceUnavailable),
        ErrorBand::new(45_000_000, 46_000_000, ErrorKind::InvalidRequest),
        ErrorBand::new(55_000_000, 56_000_000, ErrorKind::ServiceUnavailable),
    ]
}

impl ErrorBands {
    pub fn new(bands: Vec<ErrorBand>) -> Self {
        Self { bands }
    }

    pub fn classify(&self, code: i32) -> ErrorKind {
        self.bands
            .iter()
            .find(|band| band.contains(code))
            .map(|band| band.kind)
            .unwrap_or(ErrorKind::Unknown)
    }

    pub fn bands(&self) -> &[ErrorBand] {
        &self.bands
    }
}

/// One recognition update.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub text: String,
    pub is_final: bool,
    pub confidence: f32,
    pub segment_id: String,
}

/// Error reported by the service, after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub code: i32,
    pub message: String,
}

impl From<ServiceError> for VoxwireError {
    fn from(e: ServiceError) -> Self {
        VoxwireError::Service {
            kind: e.kind,
            code: e.code,
            message: e.message,
        }
    }
}

/// What a single server payload means.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Recognition(RecognitionResult),
    ServiceError(ServiceError),
    /// Well-formed payload with nothing to report (keep-alive, empty result).
    NoOp,
    /// Valid JSON that is not an object.
    Unrecognized(String),
}

/// A parsed server frame together with its framing metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub event: ServerEvent,
    /// Server marked this as its final response.
    pub last: bool,
    pub sequence: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Option<ResultBody>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResultBody {
    text: String,
    is_final: Option<bool>,
    definite: Option<bool>,
    confidence: Option<f32>,
    segment_id: Option<serde_json::Value>,
    utterances: Vec<Utterance>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Utterance {
    definite: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i32,
    #[serde(default)]
    message: String,
}

/// Response parser bound to a session's error bands.
#[derive(Debug, Clone, Default)]
pub struct ResponseParser {
    bands: ErrorBands,
}

impl ResponseParser {
    pub fn new(bands: ErrorBands) -> Self {
        Self { bands }
    }

    /// Interpret a JSON payload from a `FullServerResponse`.
    ///
    /// # Errors
    /// Returns `VoxwireError::Parse` for invalid UTF-8, malformed JSON, or an
    /// object whose `result`/`error` fields have the wrong shape.
    pub fn parse_server_payload(&self, payload: &[u8]) -> Result<ServerEvent> {
        if payload.is_empty() {
            return Ok(ServerEvent::NoOp);
        }

        let value: serde_json::Value =
            serde_json::from_slice(payload).map_err(|e| VoxwireError::Parse {
                message: format!("malformed JSON: {}", e),
            })?;
        if !value.is_object() {
            return Ok(ServerEvent::Unrecognized(value.to_string()));
        }

        let envelope: Envelope =
            serde_json::from_value(value).map_err(|e| VoxwireError::Parse {
                message: format!("unexpected payload shape: {}", e),
            })?;

        if let Some(error) = envelope.error {
            return Ok(ServerEvent::ServiceError(self.service_error(
                error.code,
                error.message,
            )));
        }

        match envelope.result {
            Some(result) if !result.text.is_empty() => {
                let is_final = result.is_final.unwrap_or(false)
                    || result.definite.unwrap_or(false)
                    || result.utterances.iter().any(|u| u.definite);
                let segment_id = match result.segment_id {
                    Some(serde_json::Value::String(s)) => s,
                    Some(serde_json::Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                Ok(ServerEvent::Recognition(RecognitionResult {
                    text: result.text,
                    is_final,
                    confidence: result.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
                    segment_id,
                }))
            }
            _ => Ok(ServerEvent::NoOp),
        }
    }

    /// Decode the payload of a server frame and interpret it.
    ///
    /// # Errors
    /// * `VoxwireError::ProtocolViolation` if the server sent a client-only
    ///   message type.
    /// * `VoxwireError::Data` if a gzip payload cannot be inflated.
    /// * `VoxwireError::Parse` if the JSON payload is malformed.
    pub fn parse_frame(&self, frame: Frame) -> Result<InboundEvent> {
        if frame.header.message_type.is_client_message() {
            return Err(VoxwireError::ProtocolViolation {
                message: format!(
                    "server sent client message type {:?}",
                    frame.header.message_type
                ),
            });
        }

        let compressed = frame.header.compression == Compression::Gzip;
        let mut frame = frame;
        if compressed {
            frame.payload = gzip_decompress(&frame.payload)?;
        }

        match Message::from_frame(frame)? {
            Message::FullServerResponse {
                sequence,
                last,
                payload,
            } => {
                let mut event = self.parse_server_payload(&payload)?;
                if let ServerEvent::Recognition(result) = &mut event
                    && result.segment_id.is_empty()
                    && let Some(seq) = sequence
                {
                    result.segment_id = seq.unsigned_abs().to_string();
                }
                Ok(InboundEvent {
                    event,
                    last,
                    sequence,
                })
            }
            Message::ErrorResponse { code, message } => Ok(InboundEvent {
                event: ServerEvent::ServiceError(
                    self.service_error(code, error_message_text(message)),
                ),
                last: true,
                sequence: None,
            }),
            Message::FullClientRequest { .. } | Message::AudioOnlyRequest { .. } => {
                Err(VoxwireError::ProtocolViolation {
                    message: "server sent a client request".to_string(),
                })
            }
        }
    }

    fn service_error(&self, code: i32, message: String) -> ServiceError {
        ServiceError {
            kind: self.bands.classify(code),
            code,
            message,
        }
    }
}

/// Error frames carry either plain text or `{"error": "..."}` style JSON.
fn error_message_text(raw: String) -> String {
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(serde_json::Value::Object(map)) => ["error", "message"]
            .iter()
            .find_map(|key| map.get(*key).and_then(|v| v.as_str()).map(str::to_string))
            .unwrap_or(raw),
        _ => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::compression::gzip_compress;
    use crate::protocol::frame::{decode_frame, encode_frame};
    use crate::protocol::header::{MessageFlags, MessageType, ProtocolHeader, Serialization};

    fn parser() -> ResponseParser {
        ResponseParser::default()
    }

    fn server_frame(flags: MessageFlags, sequence: Option<i32>, payload: &[u8]) -> Frame {
        let header = ProtocolHeader::new(
            MessageType::FullServerResponse,
            flags,
            Serialization::Json,
            Compression::None,
        );
        decode_frame(&encode_frame(&header, sequence, payload)).unwrap()
    }

    #[test]
    fn test_definite_result_is_final() {
        let event = parser()
            .parse_server_payload(br#"{"result":{"text":"hello","definite":true}}"#)
            .unwrap();
        match event {
            ServerEvent::Recognition(result) => {
                assert_eq!(result.text, "hello");
                assert!(result.is_final);
            }
            other => panic!("expected recognition, got {:?}", other),
        }
    }

    #[test]
    fn test_is_final_field_and_utterances_mark_finality() {
        let p = parser();
        let by_flag = p
            .parse_server_payload(br#"{"result":{"text":"a","is_final":true}}"#)
            .unwrap();
        let by_utterance = p
            .parse_server_payload(
                br#"{"result":{"text":"a","utterances":[{"text":"a","definite":true}]}}"#,
            )
            .unwrap();
        let partial = p
            .parse_server_payload(br#"{"result":{"text":"a","utterances":[{"definite":false}]}}"#)
            .unwrap();

        assert!(matches!(by_flag, ServerEvent::Recognition(ref r) if r.is_final));
        assert!(matches!(by_utterance, ServerEvent::Recognition(ref r) if r.is_final));
        assert!(matches!(partial, ServerEvent::Recognition(ref r) if !r.is_final));
    }

    #[test]
    fn test_confidence_and_segment_id() {
        let event = parser()
            .parse_server_payload(
                br#"{"result":{"text":"x","confidence":0.87,"segment_id":"seg-4"}}"#,
            )
            .unwrap();
        match event {
            ServerEvent::Recognition(r) => {
                assert!((r.confidence - 0.87).abs() < f32::EPSILON);
                assert_eq!(r.segment_id, "seg-4");
            }
            other => panic!("expected recognition, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_segment_id_is_stringified() {
        let event = parser()
            .parse_server_payload(br#"{"result":{"text":"x","segment_id":12}}"#)
            .unwrap();
        assert!(matches!(event, ServerEvent::Recognition(ref r) if r.segment_id == "12"));
    }

    #[test]
    fn test_error_payload_is_classified_into_authentication_band() {
        let event = parser()
            .parse_server_payload(br#"{"error":{"code":1050,"message":"bad token"}}"#)
            .unwrap();
        assert_eq!(
            event,
            ServerEvent::ServiceError(ServiceError {
                kind: ErrorKind::Authentication,
                code: 1050,
                message: "bad token".to_string(),
            })
        );
    }

    #[test]
    fn test_object_without_result_or_error_is_noop() {
        assert_eq!(
            parser().parse_server_payload(br#"{"audio_info":{"duration":100}}"#).unwrap(),
            ServerEvent::NoOp
        );
        assert_eq!(parser().parse_server_payload(b"").unwrap(), ServerEvent::NoOp);
    }

    #[test]
    fn test_empty_text_is_noop() {
        assert_eq!(
            parser().parse_server_payload(br#"{"result":{"text":""}}"#).unwrap(),
            ServerEvent::NoOp
        );
    }

    #[test]
    fn test_non_object_json_is_unrecognized() {
        assert!(matches!(
            parser().parse_server_payload(b"[1,2,3]").unwrap(),
            ServerEvent::Unrecognized(_)
        ));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let result = parser().parse_server_payload(br#"{"result": {"text": "#);
        assert!(matches!(result, Err(VoxwireError::Parse { .. })));
    }

    #[test]
    fn test_wrong_field_type_is_parse_error() {
        let result = parser().parse_server_payload(br#"{"result":{"text":5}}"#);
        assert!(matches!(result, Err(VoxwireError::Parse { .. })));
    }

    #[test]
    fn test_band_edges_are_half_open() {
        let bands = ErrorBands::default();
        assert_eq!(bands.classify(999), ErrorKind::Unknown);
        assert_eq!(bands.classify(1000), ErrorKind::Authentication);
        assert_eq!(bands.classify(1099), ErrorKind::Authentication);
        assert_eq!(bands.classify(1100), ErrorKind::Network);
        assert_eq!(bands.classify(1250), ErrorKind::ServiceUnavailable);
        assert_eq!(bands.classify(45_000_001), ErrorKind::InvalidRequest);
        assert_eq!(bands.classify(55_000_031), ErrorKind::ServiceUnavailable);
        assert_eq!(bands.classify(-1), ErrorKind::Unknown);
    }

    #[test]
    fn test_custom_bands_override_defaults() {
        let p = ResponseParser::new(ErrorBands::new(vec![ErrorBand::new(
            2000,
            3000,
            ErrorKind::Network,
        )]));
        let event = p
            .parse_server_payload(br#"{"error":{"code":1050,"message":"x"}}"#)
            .unwrap();
        assert!(matches!(event, ServerEvent::ServiceError(ref e) if e.kind == ErrorKind::Unknown));
        let event = p
            .parse_server_payload(br#"{"error":{"code":2500,"message":"x"}}"#)
            .unwrap();
        assert!(matches!(event, ServerEvent::ServiceError(ref e) if e.kind == ErrorKind::Network));
    }

    #[test]
    fn test_frame_sequence_is_fallback_segment_id() {
        let frame = server_frame(
            MessageFlags::PositiveSequence,
            Some(3),
            br#"{"result":{"text":"hi"}}"#,
        );
        let inbound = parser().parse_frame(frame).unwrap();
        assert!(!inbound.last);
        assert!(matches!(inbound.event, ServerEvent::Recognition(ref r) if r.segment_id == "3"));
    }

    #[test]
    fn test_last_flag_is_carried() {
        let frame = server_frame(
            MessageFlags::NegativeWithSequence,
            Some(-9),
            br#"{"result":{"text":"done"}}"#,
        );
        assert!(parser().parse_frame(frame).unwrap().last);
    }

    #[test]
    fn test_gzip_payload_is_inflated() {
        let header = ProtocolHeader::new(
            MessageType::FullServerResponse,
            MessageFlags::PositiveSequence,
            Serialization::Json,
            Compression::Gzip,
        );
        let payload = gzip_compress(br#"{"result":{"text":"zipped"}}"#).unwrap();
        let frame = decode_frame(&encode_frame(&header, Some(1), &payload)).unwrap();
        let inbound = parser().parse_frame(frame).unwrap();
        assert!(matches!(inbound.event, ServerEvent::Recognition(ref r) if r.text == "zipped"));
    }

    #[test]
    fn test_corrupt_gzip_payload_is_data_error() {
        let header = ProtocolHeader::new(
            MessageType::FullServerResponse,
            MessageFlags::NoSequence,
            Serialization::Json,
            Compression::Gzip,
        );
        let frame = decode_frame(&encode_frame(&header, None, b"not gzip")).unwrap();
        assert!(matches!(
            parser().parse_frame(frame),
            Err(VoxwireError::Data { .. })
        ));
    }

    #[test]
    fn test_error_frame_uses_code_slot_and_json_message() {
        let header = ProtocolHeader::new(
            MessageType::ErrorResponse,
            MessageFlags::NoSequence,
            Serialization::Json,
            Compression::None,
        );
        let frame = decode_frame(&encode_frame(
            &header,
            Some(45_000_001),
            br#"{"error":"invalid audio format"}"#,
        ))
        .unwrap();
        let inbound = parser().parse_frame(frame).unwrap();
        assert_eq!(
            inbound.event,
            ServerEvent::ServiceError(ServiceError {
                kind: ErrorKind::InvalidRequest,
                code: 45_000_001,
                message: "invalid audio format".to_string(),
            })
        );
    }

    #[test]
    fn test_client_message_from_server_is_protocol_violation() {
        let header = ProtocolHeader::new(
            MessageType::AudioOnlyRequest,
            MessageFlags::PositiveSequence,
            Serialization::None,
            Compression::None,
        );
        let frame = decode_frame(&encode_frame(&header, Some(1), b"pcm")).unwrap();
        assert!(matches!(
            parser().parse_frame(frame),
            Err(VoxwireError::ProtocolViolation { .. })
        ));
    }

    #[test]
    fn test_error_kind_display_and_serde() {
        assert_eq!(ErrorKind::ServiceUnavailable.to_string(), "service_unavailable");
        let kind: ErrorKind = serde_json::from_str("\"authentication\"").unwrap();
        assert_eq!(kind, ErrorKind::Authentication);
    }
}
