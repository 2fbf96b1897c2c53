//! Error types for voxsum.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxsumError {
    // Model lifecycle errors
    #[error("Model not found at {path}")]
    ModelNotFound { path: String },

    #[error("Failed to load model: {message}")]
    ModelLoadFailed { message: String },

    // Summarization errors
    #[error("Failed to create generation context: {message}")]
    ContextCreationFailed { message: String },

    #[error("Tokenization failed: {message}")]
    TokenizationFailed { message: String },

    #[error("Decode step failed: {message}")]
    DecodeStepFailed { message: String },

    #[error("Summarization produced no text")]
    EmptySummaryResult,

    // Transcription errors
    #[error("Transcription produced no text")]
    EmptyTranscriptionResult,

    // Audio normalization errors
    #[error("No audio track in {path}")]
    NoAudioTrack { path: String },

    #[error("Unsupported audio format: {message}")]
    UnsupportedFormat { message: String },

    #[error("Audio conversion failed: {message}")]
    ConversionFailed { message: String },

    // Reserved for audio-capture front-ends built on this crate.
    #[error("Microphone permission denied: {message}")]
    MicrophonePermissionDenied { message: String },
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxsumError>;
