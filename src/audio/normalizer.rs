//! Audio normalization to canonical WAV (mono, 16 kHz, 16-bit PCM).
//!
//! Any container/codec the symphonia probe recognizes is converted in a
//! pull loop: one packet is decoded, downmixed, resampled, and the
//! writer drains full chunks before the next packet is pulled, so
//! memory stays bounded for arbitrarily long recordings. A fault on
//! either side aborts the conversion and deletes the partial output.

use crate::audio::resample::{LinearResampler, downmix_interleaved, expected_output_frames};
use crate::audio::wav::is_canonical_wav;
use crate::defaults::{BITS_PER_SAMPLE, CHANNELS, CONVERT_CHUNK_FRAMES, SAMPLE_RATE};
use crate::error::{Result, VoxsumError};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tempfile::TempPath;

/// A canonical-format audio buffer ready for transcription.
///
/// When the normalizer produced the file it owns it: the temporary WAV
/// is deleted when this value drops (after the transcriber consumed
/// it). Audio that was already canonical is borrowed in place and never
/// deleted.
#[derive(Debug)]
pub struct NormalizedAudio {
    path: PathBuf,
    temp: Option<TempPath>,
    frames: u64,
}

impl NormalizedAudio {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Output frames (samples, since the buffer is mono).
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// True when this buffer is a normalizer-owned temporary file.
    pub fn owns_file(&self) -> bool {
        self.temp.is_some()
    }
}

/// Normalize `source` into a canonical WAV.
///
/// Already-canonical input is returned as-is (no copy, not owned).
/// Otherwise the converted audio lands in a temporary file owned by the
/// returned [`NormalizedAudio`]. `on_progress` receives the fraction of
/// estimated output frames written, never exceeding 1.0.
pub fn normalize(source: &Path, mut on_progress: impl FnMut(f64)) -> Result<NormalizedAudio> {
    if is_canonical_wav(source) {
        let frames = canonical_frame_count(source)?;
        on_progress(1.0);
        return Ok(NormalizedAudio {
            path: source.to_path_buf(),
            temp: None,
            frames,
        });
    }

    let temp = tempfile::Builder::new()
        .prefix("voxsum-")
        .suffix(".wav")
        .tempfile()
        .map_err(|e| VoxsumError::ConversionFailed {
            message: format!("failed to create temporary file: {}", e),
        })?
        .into_temp_path();

    let frames = normalize_to(source, &temp, &mut on_progress)?;
    Ok(NormalizedAudio {
        path: temp.to_path_buf(),
        temp: Some(temp),
        frames,
    })
}

/// Convert `source` into a canonical WAV at `dest`.
///
/// Returns the number of frames written. On any failure the partial
/// output at `dest` is deleted before the error propagates.
pub fn normalize_to(
    source: &Path,
    dest: &Path,
    mut on_progress: impl FnMut(f64),
) -> Result<u64> {
    let result = convert(source, dest, &mut on_progress);
    if result.is_err() {
        let _ = std::fs::remove_file(dest);
    }
    result
}

fn canonical_frame_count(path: &Path) -> Result<u64> {
    let reader = hound::WavReader::open(path).map_err(|e| VoxsumError::ConversionFailed {
        message: format!("failed to open {}: {}", path.display(), e),
    })?;
    Ok(u64::from(reader.duration()))
}

fn convert(source: &Path, dest: &Path, on_progress: &mut impl FnMut(f64)) -> Result<u64> {
    let file = File::open(source).map_err(|e| VoxsumError::ConversionFailed {
        message: format!("failed to open {}: {}", source.display(), e),
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = source.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| VoxsumError::UnsupportedFormat {
            message: format!("probe failed for {}: {}", source.display(), e),
        })?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| VoxsumError::NoAudioTrack {
            path: source.display().to_string(),
        })?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let source_rate = codec_params
        .sample_rate
        .ok_or_else(|| VoxsumError::UnsupportedFormat {
            message: format!("unknown sample rate in {}", source.display()),
        })?;
    let channels = codec_params.channels.map_or(1, |c| c.count());
    let estimated_total =
        codec_params.n_frames.map(|n| expected_output_frames(n, source_rate, SAMPLE_RATE));

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| VoxsumError::UnsupportedFormat {
            message: format!("codec init failed for {}: {}", source.display(), e),
        })?;

    let spec = hound::WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer =
        hound::WavWriter::create(dest, spec).map_err(|e| VoxsumError::ConversionFailed {
            message: format!("failed to create {}: {}", dest.display(), e),
        })?;

    let mut resampler = LinearResampler::new(source_rate, SAMPLE_RATE);
    let mut pending: Vec<f32> = Vec::with_capacity(CONVERT_CHUNK_FRAMES * 2);
    let mut written: u64 = 0;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                return Err(VoxsumError::ConversionFailed {
                    message: format!("packet read: {}", e),
                });
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| VoxsumError::ConversionFailed {
                message: format!("decode: {}", e),
            })?;

        let dec_spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, dec_spec);
        sample_buf.copy_interleaved_ref(decoded);

        let mono = downmix_interleaved(sample_buf.samples(), channels);
        resampler.process(&mono, &mut pending);

        // The writer drains one full chunk at a time before the next
        // packet is pulled from the decoder.
        while pending.len() >= CONVERT_CHUNK_FRAMES {
            let rest = pending.split_off(CONVERT_CHUNK_FRAMES);
            write_chunk(&mut writer, &pending)?;
            written += pending.len() as u64;
            pending = rest;
            report(on_progress, written, estimated_total);
        }
    }

    if !pending.is_empty() {
        write_chunk(&mut writer, &pending)?;
        written += pending.len() as u64;
    }

    writer.finalize().map_err(|e| VoxsumError::ConversionFailed {
        message: format!("failed to finalize {}: {}", dest.display(), e),
    })?;

    if written == 0 {
        return Err(VoxsumError::ConversionFailed {
            message: format!("no audio samples decoded from {}", source.display()),
        });
    }

    on_progress(1.0);
    Ok(written)
}

fn write_chunk(
    writer: &mut hound::WavWriter<BufWriter<File>>,
    samples: &[f32],
) -> Result<()> {
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
        writer
            .write_sample(v)
            .map_err(|e| VoxsumError::ConversionFailed {
                message: format!("write: {}", e),
            })?;
    }
    Ok(())
}

fn report(on_progress: &mut impl FnMut(f64), written: u64, estimated_total: Option<u64>) {
    let fraction = match estimated_total {
        Some(total) if total > 0 => (written as f64 / total as f64).min(1.0),
        // No duration metadata: hold at zero until the final report.
        _ => 0.0,
    };
    on_progress(fraction);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn roundtrip_44100_mono_produces_canonical_wav() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.wav");
        let dst = dir.path().join("out.wav");

        // One second at 44.1kHz.
        let samples: Vec<i16> = (0..44100).map(|i| ((i % 100) * 300) as i16).collect();
        write_wav(&src, 44100, 1, &samples);

        let frames = normalize_to(&src, &dst, |_| {}).unwrap();

        let reader = hound::WavReader::open(&dst).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);

        let expected = 44100u64 * 16000 / 44100;
        assert!(
            (frames as i64 - expected as i64).abs() <= 1,
            "expected ~{} frames, got {}",
            expected,
            frames
        );
        assert_eq!(u64::from(reader.duration()), frames);
    }

    #[test]
    fn stereo_input_is_downmixed() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("stereo.wav");
        let dst = dir.path().join("mono.wav");

        let samples = vec![1000i16; 44100 * 2];
        write_wav(&src, 44100, 2, &samples);

        let frames = normalize_to(&src, &dst, |_| {}).unwrap();

        let mut reader = hound::WavReader::open(&dst).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert!((frames as i64 - 16000).abs() <= 1);

        // Downmix of identical channels preserves amplitude.
        let out: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert!(out.iter().all(|&s| (900..=1100).contains(&s)));
    }

    #[test]
    fn progress_is_monotone_and_ends_at_one() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.wav");
        let dst = dir.path().join("out.wav");
        write_wav(&src, 44100, 1, &vec![500i16; 44100 * 3]);

        let mut fractions = Vec::new();
        normalize_to(&src, &dst, |f| fractions.push(f)).unwrap();

        assert!(!fractions.is_empty());
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert!(fractions.iter().all(|&f| (0.0..=1.0).contains(&f)));
        assert_eq!(*fractions.last().unwrap(), 1.0);
    }

    #[test]
    fn garbage_input_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("garbage.mp3");
        let dst = dir.path().join("out.wav");
        std::fs::write(&src, b"definitely not audio data at all").unwrap();

        let err = normalize_to(&src, &dst, |_| {}).unwrap_err();
        assert!(matches!(err, VoxsumError::UnsupportedFormat { .. }), "{:?}", err);
        assert!(!dst.exists(), "partial output must be deleted");
    }

    #[test]
    fn empty_wav_fails_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("empty.wav");
        let dst = dir.path().join("out.wav");
        write_wav(&src, 44100, 1, &[]);

        let err = normalize_to(&src, &dst, |_| {}).unwrap_err();
        assert!(matches!(err, VoxsumError::ConversionFailed { .. }), "{:?}", err);
        assert!(!dst.exists());
    }

    #[test]
    fn canonical_input_takes_the_fast_path() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("canonical.wav");
        write_wav(&src, 16000, 1, &[1, 2, 3, 4]);

        let normalized = normalize(&src, |_| {}).unwrap();
        assert_eq!(normalized.path(), src);
        assert!(!normalized.owns_file());
        assert_eq!(normalized.frames(), 4);

        drop(normalized);
        assert!(src.exists(), "caller-supplied audio must not be deleted");
    }

    #[test]
    fn converted_temp_file_is_deleted_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("cd.wav");
        write_wav(&src, 44100, 1, &vec![100i16; 4410]);

        let normalized = normalize(&src, |_| {}).unwrap();
        assert!(normalized.owns_file());
        let temp_path = normalized.path().to_path_buf();
        assert!(temp_path.exists());

        drop(normalized);
        assert!(!temp_path.exists(), "owned temp file must be removed");
        assert!(src.exists(), "source must be untouched");
    }

    #[test]
    fn upsampled_8k_input_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("8k.wav");
        let dst = dir.path().join("out.wav");
        write_wav(&src, 8000, 1, &vec![200i16; 8000]);

        let frames = normalize_to(&src, &dst, |_| {}).unwrap();
        assert!((frames as i64 - 16000).abs() <= 2, "frames: {}", frames);
    }
}
