//! Whisper-based speech-to-text engine.
//!
//! Wraps whisper-rs behind the [`SpeechToText`] trait with single-flight
//! model loading and FIFO call serialization.
//!
//! # Feature Gate
//!
//! The real engine requires the `whisper` feature (and cmake to build
//! whisper.cpp). Without it a stub engine is compiled that fails with a
//! descriptive error.

use crate::defaults;
use crate::error::{Result, VoxsumError};
use crate::stt::transcriber::{SpeechToText, TranscribeProgress};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[cfg(feature = "whisper")]
use crate::audio;
#[cfg(feature = "whisper")]
use crate::audio::wav;
#[cfg(feature = "whisper")]
use crate::stt::cleanup::clean_transcript;
#[cfg(feature = "whisper")]
use crate::stt::transcriber::{TranscribeEvent, TranscribePhase, emit};
#[cfg(feature = "whisper")]
use std::sync::Once;
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters,
    install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for the Whisper engine.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the GGML Whisper model file.
    pub model_path: PathBuf,
    /// Language code (e.g., "en", "ru"), or "auto" for detection.
    pub language: String,
    /// Number of threads for inference (None = whisper default).
    pub threads: Option<usize>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.bin"),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

/// Whisper transcription engine.
///
/// The context lives behind a tokio mutex: one load or transcribe call
/// executes at a time, queued callers are served in arrival order.
pub struct WhisperEngine {
    config: WhisperConfig,
    model_name: String,
    #[cfg(feature = "whisper")]
    state: Mutex<Option<WhisperContext>>,
    #[cfg(not(feature = "whisper"))]
    state: Mutex<Option<()>>,
    ready: AtomicBool,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .field("ready", &self.ready.load(Ordering::SeqCst))
            .finish()
    }
}

impl WhisperEngine {
    /// Create a new engine for the given model file.
    ///
    /// The model is not loaded here; call [`SpeechToText::load_model`]
    /// or let the first transcription load it lazily.
    ///
    /// # Errors
    /// Returns `VoxsumError::ModelNotFound` if the model file doesn't exist.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(VoxsumError::ModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }

        let model_name = config
            .model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            config,
            model_name,
            state: Mutex::new(None),
            ready: AtomicBool::new(false),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }

    /// Resolve the effective language: explicit argument wins, then the
    /// configured one; "auto" maps to whisper's detection mode.
    fn effective_language(&self, language: Option<&str>) -> Option<String> {
        let lang = language.unwrap_or(&self.config.language);
        if lang == defaults::AUTO_LANGUAGE {
            None
        } else {
            Some(lang.to_string())
        }
    }
}

#[cfg(feature = "whisper")]
impl WhisperEngine {
    /// Load the model into `slot` if it is still empty.
    ///
    /// Callers hold the engine mutex, which is what makes the load
    /// single-flight: a second caller blocks on the lock and then
    /// observes the filled slot.
    async fn load_into(
        &self,
        slot: &mut Option<WhisperContext>,
        progress: Option<&TranscribeProgress>,
    ) -> Result<()> {
        if slot.is_some() {
            return Ok(());
        }

        emit(
            progress,
            TranscribePhase::LoadingModel,
            0.05,
            "initializing speech backend",
        );

        // Route whisper.cpp's stderr chatter through the hooks once.
        LOGGING_HOOKS_INSTALLED.call_once(install_logging_hooks);

        if !self.config.model_path.exists() {
            return Err(VoxsumError::ModelNotFound {
                path: self.config.model_path.to_string_lossy().to_string(),
            });
        }

        let path = self
            .config
            .model_path
            .to_str()
            .ok_or_else(|| VoxsumError::ModelLoadFailed {
                message: "invalid UTF-8 in model path".to_string(),
            })?
            .to_string();

        emit(
            progress,
            TranscribePhase::LoadingModel,
            0.35,
            "reading model weights",
        );

        let context = tokio::task::spawn_blocking(move || {
            WhisperContext::new_with_params(&path, WhisperContextParameters::default())
        })
        .await
        .map_err(|e| VoxsumError::ModelLoadFailed {
            message: format!("load task failed: {}", e),
        })?
        .map_err(|e| VoxsumError::ModelLoadFailed {
            message: format!("failed to load Whisper model: {}", e),
        })?;

        *slot = Some(context);
        self.ready.store(true, Ordering::SeqCst);

        emit(
            progress,
            TranscribePhase::LoadingModel,
            1.0,
            "speech model ready",
        );
        Ok(())
    }

    /// Run one decode pass over normalized audio.
    fn decode(
        &self,
        context: &WhisperContext,
        audio: &[f32],
        language: Option<&str>,
        progress: Option<&TranscribeProgress>,
    ) -> Result<String> {
        let mut state = context
            .create_state()
            .map_err(|e| VoxsumError::ModelLoadFailed {
                message: format!("failed to create Whisper state: {}", e),
            })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(language);
        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }

        // Fixed decoding configuration: deterministic sampling with
        // thresholds that reject no-speech and low-confidence segments.
        // whisper.cpp itself windows long recordings internally.
        params.set_temperature(0.0);
        params.set_no_speech_thold(defaults::NO_SPEECH_THRESHOLD);
        params.set_logprob_thold(defaults::LOGPROB_THRESHOLD);

        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        if let Some(cb) = progress.cloned() {
            params.set_progress_callback_safe(move |pct: i32| {
                cb(TranscribeEvent {
                    phase: TranscribePhase::Transcribing,
                    fraction: f64::from(pct.clamp(0, 100)) / 100.0,
                    message: format!("recognizing speech {}%", pct),
                });
            });
        }

        state
            .full(params, audio)
            .map_err(|e| VoxsumError::DecodeStepFailed {
                message: format!("Whisper inference failed: {}", e),
            })?;

        let mut pieces: Vec<String> = Vec::new();
        for segment in state.as_iter() {
            let text = segment.to_string().trim().to_string();
            if !text.is_empty() {
                pieces.push(text);
            }
        }

        let cleaned = clean_transcript(&pieces.join(" "));
        if cleaned.is_empty() {
            return Err(VoxsumError::EmptyTranscriptionResult);
        }
        Ok(cleaned)
    }
}

#[cfg(feature = "whisper")]
#[async_trait]
impl SpeechToText for WhisperEngine {
    async fn load_model(&self, progress: Option<TranscribeProgress>) -> Result<()> {
        let mut slot = self.state.lock().await;
        self.load_into(&mut slot, progress.as_ref()).await
    }

    async fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
        progress: Option<TranscribeProgress>,
    ) -> Result<String> {
        // One logical operation at a time; queued callers run FIFO.
        let mut slot = self.state.lock().await;
        self.load_into(&mut slot, progress.as_ref()).await?;
        let context = slot.as_ref().ok_or_else(|| VoxsumError::ModelLoadFailed {
            message: "speech model missing after load".to_string(),
        })?;

        emit(
            progress.as_ref(),
            TranscribePhase::Preprocessing,
            0.0,
            "preparing audio",
        );

        let source = audio_path.to_path_buf();
        let convert_progress = progress.clone();
        let normalized = tokio::task::spawn_blocking(move || {
            audio::normalize(&source, |fraction| {
                emit(
                    convert_progress.as_ref(),
                    TranscribePhase::Preprocessing,
                    fraction,
                    format!("converting audio {:.0}%", fraction * 100.0),
                );
            })
        })
        .await
        .map_err(|e| VoxsumError::ConversionFailed {
            message: format!("conversion task failed: {}", e),
        })??;

        let samples = wav::read_canonical(normalized.path())?;
        let audio_f32 = wav::samples_to_f32(&samples);

        emit(
            progress.as_ref(),
            TranscribePhase::Transcribing,
            0.0,
            "recognizing speech",
        );

        let language = self.effective_language(language);
        let text = tokio::task::block_in_place(|| {
            self.decode(context, &audio_f32, language.as_deref(), progress.as_ref())
        })?;

        // Normalized temp buffer is consumed; dropping deletes it.
        drop(normalized);

        emit(
            progress.as_ref(),
            TranscribePhase::Done,
            1.0,
            "transcription ready",
        );
        Ok(text)
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(not(feature = "whisper"))]
#[async_trait]
impl SpeechToText for WhisperEngine {
    async fn load_model(&self, _progress: Option<TranscribeProgress>) -> Result<()> {
        Err(VoxsumError::ModelLoadFailed {
            message: concat!(
                "Whisper feature not enabled. This binary was built without speech recognition.\n",
                "To fix: cargo build --release (whisper is enabled by default)\n",
                "If the build fails with cmake errors, install: sudo apt install cmake"
            )
            .to_string(),
        })
    }

    async fn transcribe(
        &self,
        _audio_path: &Path,
        _language: Option<&str>,
        progress: Option<TranscribeProgress>,
    ) -> Result<String> {
        self.load_model(progress).await.map(|_| String::new())
    }

    fn is_ready(&self) -> bool {
        false
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
