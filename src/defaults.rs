//! Default configuration constants for voxwire.
//!
//! Shared between the config file model, the handshake builder and the CLI
//! so every entry point agrees on the same values.

/// Default streaming endpoint (bidirectional, async-optimised variant).
pub const ENDPOINT: &str = "wss://openspeech.bytedance.com/api/v3/sauc/bigmodel_async";

/// Default resource identifier sent in the `X-Api-Resource-Id` header.
pub const RESOURCE_ID: &str = "volc.bigasr.sauc.duration";

/// Default user id placed in the handshake `user.uid` field.
pub const USER_ID: &str = "voxwire";

/// Audio sample rate in Hz expected by the service.
pub const SAMPLE_RATE: u32 = 16000;

/// Bits per sample of the PCM stream.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Channel count of the PCM stream.
pub const CHANNELS: u16 = 1;

/// Container format announced in the handshake.
pub const AUDIO_FORMAT: &str = "wav";

/// Recognition language announced in the handshake.
pub const LANGUAGE: &str = "zh-CN";

/// Model requested in the handshake.
pub const MODEL_NAME: &str = "bigmodel";

/// Duration of one audio chunk handed to the session.
///
/// The service recommends 100–200 ms packets; 100 ms at 16 kHz mono 16-bit
/// is 3200 bytes.
pub const CHUNK_MS: u32 = 100;

/// Delay before the first reconnect attempt.
pub const RECONNECT_INITIAL_DELAY_MS: u64 = 1000;

/// Upper bound for the reconnect delay after repeated failures.
pub const RECONNECT_MAX_DELAY_MS: u64 = 2000;

/// Upper bound on the size of a decompressed server payload.
pub const MAX_DECOMPRESSED_BYTES: usize = 16 * 1024 * 1024;

/// Bytes per millisecond of audio for the default PCM format.
pub fn bytes_per_ms(sample_rate: u32, bits: u16, channels: u16) -> usize {
    (sample_rate as usize * (bits as usize / 8) * channels as usize) / 1000
}
