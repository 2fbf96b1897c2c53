//! Default configuration constants for voxsum.
//!
//! Shared constants used across the audio, transcription, and
//! summarization layers to keep the two engines' contracts in sync.

/// Canonical audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and is the only rate
/// the transcription engine accepts.
pub const SAMPLE_RATE: u32 = 16_000;

/// Canonical channel count (mono).
pub const CHANNELS: u16 = 1;

/// Canonical sample bit depth (16-bit signed PCM).
pub const BITS_PER_SAMPLE: u16 = 16;

/// Frames accumulated per conversion cycle in the normalizer.
///
/// The writer drains one chunk of this size before the next packet is
/// pulled from the decoder, which bounds memory for long recordings.
pub const CONVERT_CHUNK_FRAMES: usize = 8192;

/// Default language code for transcription.
///
/// "auto" lets Whisper detect the spoken language automatically.
/// Set to a specific code (e.g., "en", "ru") to force a language.
pub const DEFAULT_LANGUAGE: &str = "auto";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Probability threshold above which a decoded segment counts as non-speech.
pub const NO_SPEECH_THRESHOLD: f32 = 0.25;

/// Average log-probability below which a decoded segment is rejected.
pub const LOGPROB_THRESHOLD: f32 = -1.5;

/// Context window capacity (tokens) for one summarization call.
pub const N_CTX: usize = 2048;

/// Maximum tokens submitted to the model in one decode step.
pub const N_BATCH: usize = 512;

/// Upper bound on generated summary tokens per call.
pub const MAX_NEW_TOKENS: usize = 200;

/// Top-k candidate count retained before sampling.
pub const TOP_K: usize = 40;

/// Nucleus (top-p) cumulative-probability threshold.
pub const TOP_P: f32 = 0.9;

/// Sampling temperature. Low values keep summaries close to greedy.
pub const TEMPERATURE: f32 = 0.3;

/// System instruction for the summarization prompt.
pub const SYSTEM_INSTRUCTION: &str =
    "You are an assistant. Produce short, precise summaries.";

/// User-block preamble placed before the transcript text.
pub const SUMMARY_REQUEST: &str =
    "Summarize the text in a few bullet points, no filler:";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_format_matches_transcriber_contract() {
        assert_eq!(SAMPLE_RATE, 16_000);
        assert_eq!(CHANNELS, 1);
        assert_eq!(BITS_PER_SAMPLE, 16);
    }

    #[test]
    fn batch_fits_context_window() {
        assert!(N_BATCH <= N_CTX);
        assert!(MAX_NEW_TOKENS < N_CTX);
    }
}
