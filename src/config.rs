//! TOML configuration.

use crate::defaults;
use crate::stt::WhisperConfig;
use crate::summarize::{SamplingParams, SummarizerConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub stt: SttConfig,
    pub summarizer: SummarizerSettings,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    /// Path to the GGML Whisper model file.
    pub model: PathBuf,
    pub language: String,
    pub threads: Option<usize>,
}

/// Summarization configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SummarizerSettings {
    /// Path to the quantized GGUF weights file.
    pub model: PathBuf,
    /// Path to the tokenizer.json vocabulary.
    pub tokenizer: PathBuf,
    pub n_ctx: usize,
    pub n_batch: usize,
    pub max_new_tokens: usize,
    pub temperature: f32,
    pub top_k: usize,
    pub top_p: f32,
    /// Fixed sampling seed for reproducible summaries.
    pub seed: Option<u64>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("models/ggml-base.bin"),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            model: PathBuf::from("models/qwen2.5-1.5b-instruct-q4_k_m.gguf"),
            tokenizer: PathBuf::from("models/tokenizer.json"),
            n_ctx: defaults::N_CTX,
            n_batch: defaults::N_BATCH,
            max_new_tokens: defaults::MAX_NEW_TOKENS,
            temperature: defaults::TEMPERATURE,
            top_k: defaults::TOP_K,
            top_p: defaults::TOP_P,
            seed: None,
        }
    }
}

impl SttConfig {
    /// Engine configuration for the Whisper transcriber.
    pub fn engine_config(&self) -> WhisperConfig {
        WhisperConfig {
            model_path: self.model.clone(),
            language: self.language.clone(),
            threads: self.threads,
        }
    }
}

impl SummarizerSettings {
    /// Engine configuration for the candle summarizer.
    pub fn engine_config(&self) -> SummarizerConfig {
        SummarizerConfig {
            model_path: self.model.clone(),
            tokenizer_path: self.tokenizer.clone(),
            n_ctx: self.n_ctx,
            n_batch: self.n_batch,
            max_new_tokens: self.max_new_tokens,
            sampling: SamplingParams {
                temperature: self.temperature,
                top_k: self.top_k,
                top_p: self.top_p,
            },
            seed: self.seed,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Self::default()
                } else {
                    eprintln!("Warning: failed to parse config at {}: {}", path.display(), e);
                    Self::default()
                }
            }
        }
    }
}
