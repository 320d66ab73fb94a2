//! WAV file input for the `transcribe` command.

use crate::defaults::{BITS_PER_SAMPLE, CHANNELS, SAMPLE_RATE, bytes_per_ms};
use crate::error::{Result, VoxwireError};
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// PCM layout the session announces in its handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits: u16,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            bits: BITS_PER_SAMPLE,
        }
    }
}

impl std::fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} Hz, {} channel(s), {}-bit PCM",
            self.sample_rate, self.channels, self.bits
        )
    }
}

/// WAV audio held as little-endian PCM bytes, ready to stream.
/// Only files already in the expected format are accepted; nothing is resampled.
pub struct WavAudio {
    pcm: Vec<u8>,
    format: PcmFormat,
}

impl WavAudio {
    /// Parse WAV data from any reader and check it against `expected`.
    pub fn from_reader(reader: impl Read, expected: PcmFormat) -> Result<Self> {
        let mut wav_reader = hound::WavReader::new(reader).map_err(|e| VoxwireError::AudioRead {
            message: format!("Failed to parse WAV file: {}", e),
        })?;

        let spec = wav_reader.spec();
        let actual = PcmFormat {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits: spec.bits_per_sample,
        };
        if actual != expected || spec.sample_format != hound::SampleFormat::Int {
            return Err(VoxwireError::AudioFormatMismatch {
                expected: expected.to_string(),
                actual: match spec.sample_format {
                    hound::SampleFormat::Int => actual.to_string(),
                    hound::SampleFormat::Float => format!("{} (float)", actual),
                },
            });
        }
        if expected.bits != 16 {
            return Err(VoxwireError::AudioFormatMismatch {
                expected: "16-bit PCM".to_string(),
                actual: expected.to_string(),
            });
        }

        let samples: Vec<i16> = wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| VoxwireError::AudioRead {
                message: format!("Failed to read WAV samples: {}", e),
            })?;

        let pcm = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Ok(Self {
            pcm,
            format: expected,
        })
    }

    pub fn from_path(path: &Path, expected: PcmFormat) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| VoxwireError::AudioRead {
            message: format!("Failed to open {}: {}", path.display(), e),
        })?;
        Self::from_reader(std::io::BufReader::new(file), expected)
    }

    /// Read a whole WAV stream from stdin.
    pub fn from_stdin(expected: PcmFormat) -> Result<Self> {
        let mut buffer = Vec::new();
        std::io::stdin()
            .lock()
            .read_to_end(&mut buffer)
            .map_err(|e| VoxwireError::AudioRead {
                message: format!("Failed to read from stdin: {}", e),
            })?;
        Self::from_reader(std::io::Cursor::new(buffer), expected)
    }

    pub fn pcm(&self) -> &[u8] {
        &self.pcm
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn duration(&self) -> Duration {
        let per_ms = bytes_per_ms(self.format.sample_rate, self.format.bits, self.format.channels);
        if per_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis((self.pcm.len() / per_ms) as u64)
    }

    /// Split into packets of `chunk_ms` milliseconds. The final packet may be
    /// shorter; packets never split a sample frame.
    pub fn chunks(&self, chunk_ms: u32) -> std::slice::Chunks<'_, u8> {
        self.pcm.chunks(self.chunk_len(chunk_ms))
    }

    fn chunk_len(&self, chunk_ms: u32) -> usize {
        let frame = (self.format.bits as usize / 8) * self.format.channels as usize;
        let per_ms = bytes_per_ms(self.format.sample_rate, self.format.bits, self.format.channels);
        let len = per_ms * chunk_ms.max(1) as usize;
        (len - len % frame.max(1)).max(frame.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_wav_data(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn from_reader_16khz_mono_produces_little_endian_pcm() {
        let wav_data = make_wav_data(16000, 1, &[1, -2, 0x0102]);
        let audio = WavAudio::from_reader(Cursor::new(wav_data), PcmFormat::default()).unwrap();

        assert_eq!(audio.pcm(), &[0x01, 0x00, 0xFE, 0xFF, 0x02, 0x01]);
    }

    #[test]
    fn stereo_input_is_rejected() {
        let wav_data = make_wav_data(16000, 2, &[0; 4]);
        let result = WavAudio::from_reader(Cursor::new(wav_data), PcmFormat::default());

        match result {
            Err(VoxwireError::AudioFormatMismatch { expected, actual }) => {
                assert!(expected.contains("1 channel"));
                assert!(actual.contains("2 channel"));
            }
            _ => panic!("Expected AudioFormatMismatch"),
        }
    }

    #[test]
    fn other_sample_rates_are_rejected() {
        let wav_data = make_wav_data(48000, 1, &[0; 48]);
        let result = WavAudio::from_reader(Cursor::new(wav_data), PcmFormat::default());
        assert!(matches!(
            result,
            Err(VoxwireError::AudioFormatMismatch { .. })
        ));
    }

    #[test]
    fn chunks_are_100ms_at_16khz() {
        let wav_data = make_wav_data(16000, 1, &vec![1i16; 5000]);
        let audio = WavAudio::from_reader(Cursor::new(wav_data), PcmFormat::default()).unwrap();

        let sizes: Vec<usize> = audio.chunks(100).map(|c| c.len()).collect();
        // 3200 bytes per 100 ms; 10000 bytes total
        assert_eq!(sizes, vec![3200, 3200, 3200, 400]);
    }

    #[test]
    fn duration_matches_sample_count() {
        let wav_data = make_wav_data(16000, 1, &vec![0i16; 16000]);
        let audio = WavAudio::from_reader(Cursor::new(wav_data), PcmFormat::default()).unwrap();
        assert_eq!(audio.duration(), Duration::from_secs(1));
    }

    #[test]
    fn empty_wav_has_no_chunks() {
        let wav_data = make_wav_data(16000, 1, &[]);
        let audio = WavAudio::from_reader(Cursor::new(wav_data), PcmFormat::default()).unwrap();
        assert_eq!(audio.chunks(100).count(), 0);
    }

    #[test]
    fn invalid_wav_data_returns_error() {
        let result = WavAudio::from_reader(Cursor::new(vec![0u8, 1, 2, 3]), PcmFormat::default());
        match result {
            Err(VoxwireError::AudioRead { message }) => {
                assert!(message.contains("Failed to parse WAV file"));
            }
            _ => panic!("Expected AudioRead error"),
        }
    }

    #[test]
    fn test_malformed_wav_random_garbage() {
        let garbage: Vec<u8> = (0..500).map(|i| ((i * 17 + 42) % 256) as u8).collect();
        let result = WavAudio::from_reader(Cursor::new(garbage), PcmFormat::default());
        assert!(result.is_err(), "Should reject random garbage as WAV");
    }

    #[test]
    fn missing_file_is_audio_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = WavAudio::from_path(&dir.path().join("none.wav"), PcmFormat::default());
        assert!(matches!(result, Err(VoxwireError::AudioRead { .. })));
    }
}
