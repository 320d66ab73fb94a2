//! The fixed 4-byte protocol header.
//!
//! ```text
//!  byte 0          byte 1          byte 2          byte 3
//! +-------+-------+-------+-------+-------+-------+---------------+
//! |version| size  | type  | flags | serial| compr |   reserved    |
//! +-------+-------+-------+-------+-------+-------+---------------+
//! ```
//!
//! Every field is a nibble except the reserved byte. Version and header size
//! are always 1 (the size nibble counts 4-byte units).

use crate::error::{Result, VoxwireError};

/// Length of the encoded header in bytes.
pub const HEADER_LEN: usize = 4;

const PROTOCOL_VERSION: u8 = 0b0001;
const HEADER_UNITS: u8 = 0b0001;

/// Kind of message carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Handshake / recognition parameters.
    FullClientRequest,
    /// One chunk of raw audio.
    AudioOnlyRequest,
    /// Recognition update from the server.
    FullServerResponse,
    /// Server-side failure with a numeric code.
    ErrorResponse,
}

impl MessageType {
    pub fn bits(self) -> u8 {
        match self {
            MessageType::FullClientRequest => 0b0001,
            MessageType::AudioOnlyRequest => 0b0010,
            MessageType::FullServerResponse => 0b1001,
            MessageType::ErrorResponse => 0b1111,
        }
    }

    /// True for message types only the client may send.
    pub fn is_client_message(self) -> bool {
        matches!(
            self,
            MessageType::FullClientRequest | MessageType::AudioOnlyRequest
        )
    }
}

impl TryFrom<u8> for MessageType {
    type Error = VoxwireError;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            0b0001 => Ok(MessageType::FullClientRequest),
            0b0010 => Ok(MessageType::AudioOnlyRequest),
            0b1001 => Ok(MessageType::FullServerResponse),
            0b1111 => Ok(MessageType::ErrorResponse),
            other => Err(VoxwireError::format(format!(
                "unknown message type {:#06b}",
                other
            ))),
        }
    }
}

/// Per-message flags describing the sequence field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageFlags {
    /// No sequence number follows the header.
    NoSequence,
    /// A positive sequence number follows the header.
    PositiveSequence,
    /// Last packet, no sequence number.
    NegativeSequence,
    /// Last packet, negative sequence number follows the header.
    NegativeWithSequence,
}

impl MessageFlags {
    pub fn bits(self) -> u8 {
        match self {
            MessageFlags::NoSequence => 0b0000,
            MessageFlags::PositiveSequence => 0b0001,
            MessageFlags::NegativeSequence => 0b0010,
            MessageFlags::NegativeWithSequence => 0b0011,
        }
    }

    /// True when a 4-byte sequence number sits between header and length.
    pub fn has_sequence(self) -> bool {
        self.bits() & 0b0001 != 0
    }

    /// True when the frame is the final one of its stream.
    pub fn is_last(self) -> bool {
        self.bits() & 0b0010 != 0
    }
}

impl TryFrom<u8> for MessageFlags {
    type Error = VoxwireError;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            0b0000 => Ok(MessageFlags::NoSequence),
            0b0001 => Ok(MessageFlags::PositiveSequence),
            0b0010 => Ok(MessageFlags::NegativeSequence),
            0b0011 => Ok(MessageFlags::NegativeWithSequence),
            other => Err(VoxwireError::format(format!(
                "unknown message flags {:#06b}",
                other
            ))),
        }
    }
}

/// Payload serialization method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Serialization {
    None,
    Json,
}

impl Serialization {
    pub fn bits(self) -> u8 {
        match self {
            Serialization::None => 0b0000,
            Serialization::Json => 0b0001,
        }
    }
}

impl TryFrom<u8> for Serialization {
    type Error = VoxwireError;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            0b0000 => Ok(Serialization::None),
            0b0001 => Ok(Serialization::Json),
            other => Err(VoxwireError::format(format!(
                "unknown serialization {:#06b}",
                other
            ))),
        }
    }
}

/// Payload compression method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    None,
    Gzip,
}

impl Compression {
    pub fn bits(self) -> u8 {
        match self {
            Compression::None => 0b0000,
            Compression::Gzip => 0b0001,
        }
    }
}

impl TryFrom<u8> for Compression {
    type Error = VoxwireError;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            0b0000 => Ok(Compression::None),
            0b0001 => Ok(Compression::Gzip),
            other => Err(VoxwireError::format(format!(
                "unknown compression {:#06b}",
                other
            ))),
        }
    }
}

/// Decoded protocol header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolHeader {
    pub message_type: MessageType,
    pub flags: MessageFlags,
    pub serialization: Serialization,
    pub compression: Compression,
}

impl ProtocolHeader {
    pub fn new(
        message_type: MessageType,
        flags: MessageFlags,
        serialization: Serialization,
        compression: Compression,
    ) -> Self {
        Self {
            message_type,
            flags,
            serialization,
            compression,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        encode_header(
            self.message_type,
            self.flags,
            self.serialization,
            self.compression,
        )
    }

    /// Decode the first four bytes of `bytes`.
    ///
    /// # Errors
    /// Returns `VoxwireError::Format` for short input, a wrong version or
    /// header size, a non-zero reserved byte, or any unassigned field value.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(VoxwireError::format(format!(
                "header needs {} bytes, got {}",
                HEADER_LEN,
                bytes.len()
            )));
        }

        let version = bytes[0] >> 4;
        let units = bytes[0] & 0x0F;
        if version != PROTOCOL_VERSION {
            return Err(VoxwireError::format(format!(
                "unsupported protocol version {}",
                version
            )));
        }
        if units != HEADER_UNITS {
            return Err(VoxwireError::format(format!(
                "unsupported header size {} (x4 bytes)",
                units
            )));
        }
        if bytes[3] != 0 {
            return Err(VoxwireError::format(format!(
                "reserved header byte is {:#04x}, expected 0",
                bytes[3]
            )));
        }

        Ok(Self {
            message_type: MessageType::try_from(bytes[1] >> 4)?,
            flags: MessageFlags::try_from(bytes[1] & 0x0F)?,
            serialization: Serialization::try_from(bytes[2] >> 4)?,
            compression: Compression::try_from(bytes[2] & 0x0F)?,
        })
    }
}

/// Pack the four header fields into their wire representation.
pub fn encode_header(
    message_type: MessageType,
    flags: MessageFlags,
    serialization: Serialization,
    compression: Compression,
) -> [u8; HEADER_LEN] {
    [
        (PROTOCOL_VERSION << 4) | HEADER_UNITS,
        (message_type.bits() << 4) | flags.bits(),
        (serialization.bits() << 4) | compression.bits(),
        0x00,
    ]
}
