//! Decoding of recordings into mono waveforms

use super::{resample_linear, AudioFormat};
use crate::error::ExtractionError;
use anyhow::{Context, Result};
use std::path::Path;

/// Mono waveform at a known sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Interleaved decoder output before mixdown
struct Decoded {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl Decoded {
    fn into_mono(self) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;
        if channels == 1 {
            return self.samples;
        }
        self.samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }
}

/// Decode a recording, mix it to mono and resample it to `target_rate`
pub fn decode_file(path: &Path, target_rate: u32) -> Result<Waveform, ExtractionError> {
    let format = AudioFormat::from_path(path)
        .ok_or_else(|| ExtractionError::UnsupportedFormat(path.display().to_string()))?;

    let decoded = match format {
        AudioFormat::Wav => decode_wav(path),
        AudioFormat::Mp3 => decode_mp3(path),
        AudioFormat::Flac => decode_flac(path),
        AudioFormat::Ogg => decode_ogg(path),
    }
    .map_err(|e| ExtractionError::Decode(format!("{:#}", e)))?;

    if decoded.samples.is_empty() || decoded.sample_rate == 0 {
        return Err(ExtractionError::Empty);
    }

    let source_rate = decoded.sample_rate;
    let mono = decoded.into_mono();
    log::trace!(
        "Decoded {}: {} samples at {} Hz",
        path.display(),
        mono.len(),
        source_rate
    );

    Ok(Waveform::new(
        resample_linear(&mono, source_rate, target_rate),
        target_rate,
    ))
}

fn decode_wav(path: &Path) -> Result<Decoded> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    Ok(Decoded {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

fn decode_mp3(path: &Path) -> Result<Decoded> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read MP3 file: {}", path.display()))?;

    let mut decoder = minimp3::Decoder::new(&data[..]);
    let mut decoded = Decoded {
        samples: Vec::new(),
        sample_rate: 0,
        channels: 1,
    };

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if decoded.sample_rate == 0 {
                    decoded.sample_rate = frame.sample_rate as u32;
                    decoded.channels = frame.channels as u16;
                }
                decoded
                    .samples
                    .extend(frame.data.iter().map(|&s| s as f32 / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => anyhow::bail!("MP3 decode error: {}", e),
        }
    }

    Ok(decoded)
}

fn decode_flac(path: &Path) -> Result<Decoded> {
    let mut reader = claxon::FlacReader::open(path)
        .with_context(|| format!("Failed to open FLAC file: {}", path.display()))?;

    let info = reader.streaminfo();
    let scale = (1i64 << (info.bits_per_sample - 1)) as f32;
    let samples = reader
        .samples()
        .map(|s| s.map(|v| v as f32 / scale))
        .collect::<Result<_, _>>()?;

    Ok(Decoded {
        samples,
        sample_rate: info.sample_rate,
        channels: info.channels as u16,
    })
}

fn decode_ogg(path: &Path) -> Result<Decoded> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open OGG file: {}", path.display()))?;

    let mut reader = lewton::inside_ogg::OggStreamReader::new(file)?;
    let mut decoded = Decoded {
        samples: Vec::new(),
        sample_rate: reader.ident_hdr.audio_sample_rate,
        channels: reader.ident_hdr.audio_channels as u16,
    };

    while let Some(packet) = reader.read_dec_packet_itl()? {
        decoded
            .samples
            .extend(packet.iter().map(|&s| s as f32 / 32768.0));
    }

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in frames {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_stereo_wav_is_mixed_to_mono() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 16000, 2, &[16384, 0, 16384, 0, -16384, -16384]);

        let wave = decode_file(&path, 16000).unwrap();
        assert_eq!(wave.samples, vec![0.25, 0.25, -0.5]);
        assert_eq!(wave.sample_rate, 16000);
    }

    #[test]
    fn test_wav_is_resampled_to_target_rate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fast.wav");
        write_wav(&path, 32000, 1, &vec![1000; 3200]);

        let wave = decode_file(&path, 16000).unwrap();
        assert_eq!(wave.samples.len(), 1600);
        assert!((wave.duration_secs() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_empty_wav_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav(&path, 16000, 1, &[]);
        assert!(matches!(decode_file(&path, 16000), Err(ExtractionError::Empty)));
    }

    #[test]
    fn test_corrupt_file_is_a_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"not a riff header").unwrap();
        assert!(matches!(decode_file(&path, 16000), Err(ExtractionError::Decode(_))));
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let err = decode_file(Path::new("clip.aiff"), 16000).unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedFormat(_)));
    }
}
