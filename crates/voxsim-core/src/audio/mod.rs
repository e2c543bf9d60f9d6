//! Audio decoding and resampling
//!
//! Supports WAV, MP3, FLAC and OGG Vorbis using pure Rust decoders. Every
//! recording is mixed down to mono and brought to the analysis sample rate.

mod decoder;
mod resample;

pub use decoder::{decode_file, Waveform};
pub use resample::resample_linear;

use std::path::Path;

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
    Ogg,
}

impl AudioFormat {
    /// Extensions recognized by default during corpus discovery
    pub const EXTENSIONS: [&'static str; 5] = ["wav", "wave", "mp3", "flac", "ogg"];

    /// Detect format from a file extension, ignoring case
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Some(AudioFormat::Wav),
            "mp3" => Some(AudioFormat::Mp3),
            "flac" => Some(AudioFormat::Flac),
            "ogg" => Some(AudioFormat::Ogg),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}
