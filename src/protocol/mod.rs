//! Binary wire protocol spoken with the ASR service.

pub mod compression;
pub mod encoder;
pub mod frame;
pub mod handshake;
pub mod header;
pub mod sequence;

pub use compression::{CompressionPolicy, gzip_compress, gzip_decompress};
pub use encoder::FrameEncoder;
pub use frame::{Frame, Message, decode_frame, encode_frame, read_u32_be, write_u32_be};
pub use handshake::HandshakeRequest;
pub use header::{
    Compression, MessageFlags, MessageType, ProtocolHeader, Serialization, encode_header,
};
pub use sequence::SequenceCounter;
