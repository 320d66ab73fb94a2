//! Gzip payload compression.

use crate::defaults::MAX_DECOMPRESSED_BYTES;
use crate::error::{Result, VoxwireError};
use flate2::Compression as Level;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Which client frames are sent gzip-compressed.
///
/// This is a deployment choice: some endpoints expect compressed handshakes
/// and audio, others plain payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionPolicy {
    pub handshake: bool,
    pub audio: bool,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self {
            handshake: true,
            audio: true,
        }
    }
}

impl CompressionPolicy {
    pub fn none() -> Self {
        Self {
            handshake: false,
            audio: false,
        }
    }
}

pub fn gzip_compress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2 + 32), Level::default());
    encoder.write_all(bytes).map_err(|e| VoxwireError::Data {
        message: format!("gzip compression failed: {}", e),
    })?;
    encoder.finish().map_err(|e| VoxwireError::Data {
        message: format!("gzip compression failed: {}", e),
    })
}

/// Inflate a gzip payload.
///
/// # Errors
/// Returns `VoxwireError::Data` for corrupt input or output larger than
/// `MAX_DECOMPRESSED_BYTES`.
pub fn gzip_decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let limit = MAX_DECOMPRESSED_BYTES as u64 + 1;
    GzDecoder::new(bytes)
        .take(limit)
        .read_to_end(&mut out)
        .map_err(|e| VoxwireError::Data {
            message: format!("gzip decompression failed: {}", e),
        })?;
    if out.len() > MAX_DECOMPRESSED_BYTES {
        return Err(VoxwireError::Data {
            message: format!(
                "decompressed payload exceeds {} bytes",
                MAX_DECOMPRESSED_BYTES
            ),
        });
    }
    Ok(out)
}
