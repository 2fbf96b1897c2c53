//! Catalog of known model artifacts.
//!
//! Both model files ship with the application or are placed by the user
//! in a local models directory; resolution is strictly offline.

use std::path::{Path, PathBuf};

/// Metadata for a GGML Whisper speech model.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechModelInfo {
    /// Short name used in config and CLI (e.g. "base").
    pub name: &'static str,
    /// Human-readable display name.
    pub display_name: &'static str,
    /// Model filename within the models directory.
    pub filename: &'static str,
    /// Approximate size in MB.
    pub size_mb: u32,
    /// Whether the model supports language auto-detection.
    pub multilingual: bool,
}

/// Metadata for a quantized GGUF summarization model.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryModelInfo {
    /// Short name used in config and CLI (e.g. "qwen2.5-1.5b").
    pub name: &'static str,
    /// Human-readable display name.
    pub display_name: &'static str,
    /// GGUF weights filename within the models directory.
    pub filename: &'static str,
    /// Tokenizer filename within the models directory.
    pub tokenizer_filename: &'static str,
    /// Approximate size in MB.
    pub size_mb: u32,
}

/// Shared tokenizer filename for the summarization models.
pub const TOKENIZER_FILENAME: &str = "tokenizer.json";

/// Available speech models, ordered by size (smallest first).
pub const SPEECH_MODELS: &[SpeechModelInfo] = &[
    SpeechModelInfo {
        name: "tiny",
        display_name: "Whisper Tiny (multilingual, 75 MB)",
        filename: "ggml-tiny.bin",
        size_mb: 75,
        multilingual: true,
    },
    SpeechModelInfo {
        name: "base",
        display_name: "Whisper Base (multilingual, 142 MB)",
        filename: "ggml-base.bin",
        size_mb: 142,
        multilingual: true,
    },
    SpeechModelInfo {
        name: "small",
        display_name: "Whisper Small (multilingual, 466 MB)",
        filename: "ggml-small.bin",
        size_mb: 466,
        multilingual: true,
    },
];

/// Available summarization models, ordered by size (smallest first).
pub const SUMMARY_MODELS: &[SummaryModelInfo] = &[
    SummaryModelInfo {
        name: "qwen2.5-0.5b",
        display_name: "Qwen2.5 0.5B Instruct (Q4_K_M, 398 MB)",
        filename: "qwen2.5-0.5b-instruct-q4_k_m.gguf",
        tokenizer_filename: TOKENIZER_FILENAME,
        size_mb: 398,
    },
    SummaryModelInfo {
        name: "qwen2.5-1.5b",
        display_name: "Qwen2.5 1.5B Instruct (Q4_K_M, 986 MB)",
        filename: "qwen2.5-1.5b-instruct-q4_k_m.gguf",
        tokenizer_filename: TOKENIZER_FILENAME,
        size_mb: 986,
    },
];

/// Look up a speech model by name.
pub fn get_speech_model(name: &str) -> Option<&'static SpeechModelInfo> {
    SPEECH_MODELS.iter().find(|m| m.name == name)
}

/// Look up a summarization model by name.
pub fn get_summary_model(name: &str) -> Option<&'static SummaryModelInfo> {
    SUMMARY_MODELS.iter().find(|m| m.name == name)
}

/// Resolve `filename` under `models_dir`, if it exists there.
pub fn resolve(models_dir: &Path, filename: &str) -> Option<PathBuf> {
    let path = models_dir.join(filename);
    path.exists().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_speech_model_base() {
        let model = get_speech_model("base").expect("base should exist");
        assert_eq!(model.filename, "ggml-base.bin");
        assert!(model.multilingual);
    }

    #[test]
    fn get_speech_model_nonexistent() {
        assert!(get_speech_model("gigantic").is_none());
    }

    #[test]
    fn get_summary_model_by_name() {
        let model = get_summary_model("qwen2.5-1.5b").expect("qwen2.5-1.5b should exist");
        assert_eq!(model.filename, "qwen2.5-1.5b-instruct-q4_k_m.gguf");
        assert_eq!(model.tokenizer_filename, TOKENIZER_FILENAME);
    }

    #[test]
    fn models_are_ordered_by_size() {
        assert!(
            SPEECH_MODELS.windows(2).all(|w| w[0].size_mb <= w[1].size_mb)
        );
        assert!(
            SUMMARY_MODELS.windows(2).all(|w| w[0].size_mb <= w[1].size_mb)
        );
    }

    #[test]
    fn resolve_finds_existing_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("ggml-base.bin");
        std::fs::write(&present, b"weights").unwrap();

        assert_eq!(resolve(dir.path(), "ggml-base.bin"), Some(present));
        assert_eq!(resolve(dir.path(), "ggml-tiny.bin"), None);
    }
}
