//! Frame envelope: header, optional 4-byte field, length-prefixed payload.
//!
//! ```text
//! +-----------+-------------------+----------------+-----------------+
//! | header 4B | sequence/code 4B? | payload len 4B | payload ...     |
//! +-----------+-------------------+----------------+-----------------+
//! ```
//!
//! All integers are big-endian and go through [`write_u32_be`] /
//! [`read_u32_be`].

use crate::error::{Result, VoxwireError};
use crate::protocol::header::{HEADER_LEN, MessageFlags, MessageType, ProtocolHeader};

/// Smallest decodable frame: header plus payload length.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + 4;

/// Append `value` to `buf` as four big-endian bytes.
pub fn write_u32_be(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Read four big-endian bytes at `offset`.
///
/// Returns `None` when fewer than four bytes remain.
pub fn read_u32_be(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let slice = bytes.get(offset..end)?;
    Some(u32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

/// Signed view of [`write_u32_be`], used for sequence numbers and error codes.
pub fn write_i32_be(buf: &mut Vec<u8>, value: i32) {
    write_u32_be(buf, value as u32);
}

/// Signed view of [`read_u32_be`].
pub fn read_i32_be(bytes: &[u8], offset: usize) -> Option<i32> {
    read_u32_be(bytes, offset).map(|v| v as i32)
}

/// One complete protocol unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: ProtocolHeader,
    /// The field between header and payload length: a sequence number, or
    /// the error code for `ErrorResponse` frames.
    pub sequence: Option<i32>,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(header: ProtocolHeader, sequence: Option<i32>, payload: Vec<u8>) -> Self {
        Self {
            header,
            sequence,
            payload,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_frame(&self.header, self.sequence, &self.payload)
    }
}

/// Whether a 4-byte field follows the header for this header.
fn has_prefix_field(header: &ProtocolHeader) -> bool {
    header.message_type == MessageType::ErrorResponse || header.flags.has_sequence()
}

/// Serialize a frame. The sequence field is written exactly when the header
/// says one is present.
pub fn encode_frame(header: &ProtocolHeader, sequence: Option<i32>, payload: &[u8]) -> Vec<u8> {
    debug_assert_eq!(sequence.is_some(), has_prefix_field(header));
    debug_assert!(u32::try_from(payload.len()).is_ok());

    let mut buf = Vec::with_capacity(MIN_FRAME_LEN + 4 + payload.len());
    buf.extend_from_slice(&header.encode());
    if has_prefix_field(header) {
        write_i32_be(&mut buf, sequence.unwrap_or_default());
    }
    write_u32_be(&mut buf, payload.len() as u32);
    buf.extend_from_slice(payload);
    buf
}

/// Parse one frame from `bytes`.
///
/// # Errors
/// Returns `VoxwireError::Format` when the input is shorter than header plus
/// length, the header is invalid, the declared payload length does not match
/// the bytes that follow it, or the input ends inside the sequence field.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame> {
    if bytes.len() < MIN_FRAME_LEN {
        return Err(VoxwireError::format(format!(
            "frame needs at least {} bytes, got {}",
            MIN_FRAME_LEN,
            bytes.len()
        )));
    }

    let header = ProtocolHeader::decode(bytes)?;
    let mut offset = HEADER_LEN;

    let sequence = if has_prefix_field(&header) {
        let value = read_i32_be(bytes, offset)
            .ok_or_else(|| VoxwireError::format("frame ends inside the sequence field"))?;
        offset += 4;
        Some(value)
    } else {
        None
    };

    let declared = read_u32_be(bytes, offset)
        .ok_or_else(|| VoxwireError::format("frame ends inside the payload length"))?
        as usize;
    offset += 4;

    let remaining = bytes.len() - offset;
    if declared > remaining {
        return Err(VoxwireError::format(format!(
            "declared payload length {} exceeds the {} bytes available",
            declared, remaining
        )));
    }
    if declared < remaining {
        return Err(VoxwireError::format(format!(
            "{} trailing bytes after a {}-byte payload",
            remaining - declared,
            declared
        )));
    }

    Ok(Frame {
        header,
        sequence,
        payload: bytes[offset..].to_vec(),
    })
}

/// Typed view of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    FullClientRequest {
        sequence: i32,
        payload: Vec<u8>,
    },
    AudioOnlyRequest {
        sequence: Option<i32>,
        payload: Vec<u8>,
    },
    FullServerResponse {
        sequence: Option<i32>,
        last: bool,
        payload: Vec<u8>,
    },
    ErrorResponse {
        code: i32,
        message: String,
    },
}

impl Message {
    /// Interpret a decoded frame. Payloads are taken as-is; decompression is
    /// the caller's job.
    pub fn from_frame(frame: Frame) -> Result<Self> {
        let Frame {
            header,
            sequence,
            payload,
        } = frame;

        match header.message_type {
            MessageType::FullClientRequest => Ok(Message::FullClientRequest {
                sequence: sequence.ok_or_else(|| {
                    VoxwireError::format("full client request without sequence number")
                })?,
                payload,
            }),
            MessageType::AudioOnlyRequest => Ok(Message::AudioOnlyRequest { sequence, payload }),
            MessageType::FullServerResponse => Ok(Message::FullServerResponse {
                sequence,
                last: header.flags.is_last() || sequence.is_some_and(|s| s < 0),
                payload,
            }),
            MessageType::ErrorResponse => Ok(Message::ErrorResponse {
                code: sequence.unwrap_or_default(),
                message: String::from_utf8_lossy(&payload).into_owned(),
            }),
        }
    }

    /// True when this is the final audio packet of a stream.
    pub fn is_last_audio(&self) -> bool {
        matches!(
            self,
            Message::AudioOnlyRequest {
                sequence: Some(s),
                ..
            } if *s < 0
        )
    }
}

/// Flags for a client frame carrying `sequence`.
pub fn flags_for_sequence(sequence: i32) -> MessageFlags {
    if sequence < 0 {
        MessageFlags::NegativeWithSequence
    } else {
        MessageFlags::PositiveSequence
    }
}
