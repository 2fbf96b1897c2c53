//! voxsum - offline voice-note transcription and summarization.
//!
//! Normalize an audio file to canonical WAV, transcribe it with a GGML
//! Whisper model, summarize the transcript with a quantized GGUF
//! instruct model, and stream unified progress to any subscriber.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod stt;
pub mod summarize;

// Core traits (audio → transcript → summary)
pub use stt::SpeechToText;
pub use summarize::Summarizer;

// Pipeline
pub use pipeline::{Pipeline, PipelineOutput};

// Progress stream
pub use progress::{ProgressBus, ProgressEvent, Stage};

// Error handling
pub use error::{Result, VoxsumError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }
}
