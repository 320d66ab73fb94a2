//! Audio input helpers. Capture itself is out of scope; these read
//! prerecorded PCM for the CLI.

pub mod wav;

pub use wav::{PcmFormat, WavAudio};
