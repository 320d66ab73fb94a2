//! Builds client frames: sequence numbering plus optional compression.

use crate::error::{Result, VoxwireError};
use crate::log::LogSink;
use crate::protocol::compression::{CompressionPolicy, gzip_compress};
use crate::protocol::frame::{encode_frame, flags_for_sequence};
use crate::protocol::handshake::HandshakeRequest;
use crate::protocol::header::{Compression, MessageType, ProtocolHeader, Serialization};
use crate::protocol::sequence::SequenceCounter;
use std::sync::Arc;

/// Turns handshakes and audio chunks into wire frames for one session.
pub struct FrameEncoder {
    counter: SequenceCounter,
    policy: CompressionPolicy,
    log: Arc<dyn LogSink>,
}

impl FrameEncoder {
    pub fn new(policy: CompressionPolicy, log: Arc<dyn LogSink>) -> Self {
        Self {
            counter: SequenceCounter::new(),
            policy,
            log,
        }
    }

    /// Sequence number the next frame will use; `None` once exhausted.
    pub fn next_sequence(&self) -> Option<i32> {
        self.counter.peek()
    }

    pub fn reset_sequence(&mut self) {
        self.counter.reset();
    }

    /// Frame the handshake request.
    ///
    /// # Errors
    /// Returns `VoxwireError::Data` if the request cannot be serialized and
    /// `VoxwireError::SequenceExhausted` when no sequence number is left.
    pub fn handshake_frame(&mut self, request: &HandshakeRequest) -> Result<Vec<u8>> {
        let json = request.to_json_bytes().map_err(|e| VoxwireError::Data {
            message: format!("Failed to serialize handshake: {}", e),
        })?;
        let sequence = self.counter.next_sequence()?;
        Ok(self.build(
            MessageType::FullClientRequest,
            Serialization::Json,
            sequence,
            json,
            self.policy.handshake,
        ))
    }

    /// Frame one audio chunk. `is_last` negates the sequence number.
    ///
    /// # Errors
    /// Returns `VoxwireError::SequenceExhausted` when no sequence number is left.
    pub fn audio_frame(&mut self, pcm: &[u8], is_last: bool) -> Result<Vec<u8>> {
        let sequence = self.counter.next_sequence()?;
        let sequence = if is_last {
            SequenceCounter::mark_last(sequence)
        } else {
            sequence
        };
        Ok(self.build(
            MessageType::AudioOnlyRequest,
            Serialization::None,
            sequence,
            pcm.to_vec(),
            self.policy.audio,
        ))
    }

    #[cfg(test)]
    pub(crate) fn with_counter(mut self, counter: SequenceCounter) -> Self {
        self.counter = counter;
        self
    }

    fn build(
        &self,
        message_type: MessageType,
        serialization: Serialization,
        sequence: i32,
        payload: Vec<u8>,
        compress: bool,
    ) -> Vec<u8> {
        let (compression, payload) = if compress {
            match gzip_compress(&payload) {
                Ok(compressed) => (Compression::Gzip, compressed),
                Err(e) => {
                    self.log.warn(
                        "encoder",
                        &format!("{}; sending frame {} uncompressed", e, sequence),
                    );
                    (Compression::None, payload)
                }
            }
        } else {
            (Compression::None, payload)
        };

        let header = ProtocolHeader::new(
            message_type,
            flags_for_sequence(sequence),
            serialization,
            compression,
        );
        encode_frame(&header, Some(sequence), &payload)
    }
}
