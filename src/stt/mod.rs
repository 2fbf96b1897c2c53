//! Speech-to-text: trait seam, Whisper engine, transcript cleanup.

pub mod cleanup;
pub mod transcriber;
pub mod whisper;

pub use cleanup::clean_transcript;
pub use transcriber::{
    MockTranscriber, SpeechToText, TranscribeEvent, TranscribePhase, TranscribeProgress,
};
pub use whisper::{WhisperConfig, WhisperEngine};
