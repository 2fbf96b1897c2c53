//! Canonical WAV access for the transcription engine.
//!
//! The transcriber only ever reads the normalizer's output format:
//! mono, 16 kHz, 16-bit integer PCM.

use crate::defaults::{BITS_PER_SAMPLE, CHANNELS, SAMPLE_RATE};
use crate::error::{Result, VoxsumError};
use std::path::Path;

fn is_canonical_spec(spec: hound::WavSpec) -> bool {
    spec.channels == CHANNELS
        && spec.sample_rate == SAMPLE_RATE
        && spec.bits_per_sample == BITS_PER_SAMPLE
        && spec.sample_format == hound::SampleFormat::Int
}

/// True when the file already is mono 16 kHz 16-bit integer PCM WAV.
///
/// Unreadable or non-WAV files simply report false; the normalizer
/// will take the conversion path for them.
pub fn is_canonical_wav(path: &Path) -> bool {
    hound::WavReader::open(path)
        .map(|reader| is_canonical_spec(reader.spec()))
        .unwrap_or(false)
}

/// Read a canonical WAV file into 16-bit PCM samples.
pub fn read_canonical(path: &Path) -> Result<Vec<i16>> {
    let mut reader = hound::WavReader::open(path).map_err(|e| VoxsumError::ConversionFailed {
        message: format!("failed to open {}: {}", path.display(), e),
    })?;

    let spec = reader.spec();
    if !is_canonical_spec(spec) {
        return Err(VoxsumError::ConversionFailed {
            message: format!(
                "expected mono 16kHz 16-bit PCM, got {} Hz, {} ch, {} bit",
                spec.sample_rate, spec.channels, spec.bits_per_sample
            ),
        });
    }

    reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| VoxsumError::ConversionFailed {
            message: format!("failed to read samples from {}: {}", path.display(), e),
        })
}

/// Convert 16-bit PCM samples to f32 normalized to `[-1.0, 1.0]`.
///
/// The speech model expects float audio in this range.
pub fn samples_to_f32(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&sample| f32::from(sample) / 32768.0)
        .collect()
}
