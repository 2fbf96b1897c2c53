//! Pipeline orchestrator: audio → transcript → summary.
//!
//! An explicit service object constructed once at startup. It sequences
//! the two engines, re-maps their stage-local progress fractions into
//! slices of the unified stage ranges, and publishes the result on one
//! broadcast stream. Any stage failure emits a terminal error event and
//! propagates to the caller; nothing is retried.

use crate::config::Config;
use crate::error::{Result, VoxsumError};
use crate::progress::{ProgressBus, ProgressEvent, Stage};
use crate::stt::{SpeechToText, TranscribePhase, TranscribeProgress, WhisperEngine};
use crate::summarize::{
    CandleLlamaSummarizer, SummarizePhase, SummarizeProgress, Summarizer,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Loading the speech model covers the first half of `loadingModels`.
const LOAD_SPEECH_SLICE: (f64, f64) = (0.0, 0.5);
/// Loading the summarization model covers the second half.
const LOAD_SUMMARY_SLICE: (f64, f64) = (0.5, 1.0);

/// Slices of the `summarizing` range, one monotone ramp across the
/// engine's three inner phases.
const TOKENIZE_SLICE: (f64, f64) = (0.0, 0.05);
const PROMPT_SLICE: (f64, f64) = (0.05, 0.45);
const GENERATE_SLICE: (f64, f64) = (0.45, 1.0);

fn slice((lo, hi): (f64, f64), fraction: f64) -> f64 {
    lo + (hi - lo) * fraction.clamp(0.0, 1.0)
}

/// Result of a full pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub transcript: String,
    pub summary: String,
}

/// The transcribe-then-summarize orchestrator.
pub struct Pipeline {
    speech: Arc<dyn SpeechToText>,
    summarizer: Arc<dyn Summarizer>,
    bus: Arc<ProgressBus>,
}

impl Pipeline {
    /// Build a pipeline over explicit engines.
    pub fn new(speech: Arc<dyn SpeechToText>, summarizer: Arc<dyn Summarizer>) -> Self {
        let pipeline = Self {
            speech,
            summarizer,
            bus: Arc::new(ProgressBus::default()),
        };
        pipeline.reset_progress();
        pipeline
    }

    /// Build a pipeline with the real engines from configuration.
    ///
    /// # Errors
    /// Fails with `ModelNotFound` when a configured artifact is missing.
    pub fn from_config(config: &Config) -> Result<Self> {
        let speech = WhisperEngine::new(config.stt.engine_config())?;
        let summarizer = CandleLlamaSummarizer::new(config.summarizer.engine_config())?;
        Ok(Self::new(Arc::new(speech), Arc::new(summarizer)))
    }

    /// Subscribe to the unified progress stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.bus.subscribe()
    }

    /// Re-emit the idle state (e.g. before starting a new run).
    pub fn reset_progress(&self) {
        self.bus.emit(Stage::Idle, 0.0, "");
    }

    /// Load both models up front.
    ///
    /// The two loads split the `loadingModels` fraction range into
    /// weighted halves so subscribers see one continuous 0→1 ramp.
    pub async fn load_models(&self) -> Result<()> {
        self.bus.emit(Stage::LoadingModels, 0.0, "loading speech model");

        let speech_progress = self.loading_progress_transcribe();
        if let Err(e) = self.speech.load_model(Some(speech_progress)).await {
            self.fail(&e);
            return Err(e);
        }

        self.bus
            .emit(Stage::LoadingModels, 0.5, "loading summarization model");

        let summary_progress = self.loading_progress_summarize();
        if let Err(e) = self.summarizer.load_model(Some(summary_progress)).await {
            self.fail(&e);
            return Err(e);
        }

        self.bus.emit(Stage::Done, 1.0, "models ready");
        Ok(())
    }

    /// Transcribe an audio file, validating the result is non-empty.
    pub async fn transcribe(&self, audio: &Path, language: Option<&str>) -> Result<String> {
        let progress = self.transcribe_progress();
        match self.speech.transcribe(audio, language, Some(progress)).await {
            Ok(text) if text.trim().is_empty() => {
                let e = VoxsumError::EmptyTranscriptionResult;
                self.fail(&e);
                Err(e)
            }
            Ok(text) => Ok(text),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Summarize text, validating the result is non-empty.
    pub async fn summarize(&self, text: &str) -> Result<String> {
        self.bus.emit(Stage::Summarizing, 0.0, "summarizing");

        let progress = self.summarize_progress();
        match self.summarizer.summarize(text, Some(progress)).await {
            Ok(summary) if summary.trim().is_empty() => {
                let e = VoxsumError::EmptySummaryResult;
                self.fail(&e);
                Err(e)
            }
            Ok(summary) => {
                self.bus.emit(Stage::Done, 1.0, "summary ready");
                Ok(summary)
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Full run: transcribe, then summarize the transcript.
    pub async fn process(&self, audio: &Path, language: Option<&str>) -> Result<PipelineOutput> {
        let transcript = self.transcribe(audio, language).await?;
        let summary = self.summarize(&transcript).await?;
        Ok(PipelineOutput {
            transcript,
            summary,
        })
    }

    fn fail(&self, error: &VoxsumError) {
        self.bus.emit(Stage::Error, 1.0, error.to_string());
    }

    /// Speech-engine events during an up-front load: first half of the
    /// `loadingModels` range.
    fn loading_progress_transcribe(&self) -> TranscribeProgress {
        let bus = self.bus.clone();
        Arc::new(move |ev| {
            if ev.phase == TranscribePhase::LoadingModel {
                bus.emit(
                    Stage::LoadingModels,
                    slice(LOAD_SPEECH_SLICE, ev.fraction),
                    ev.message,
                );
            }
        })
    }

    /// Summarizer events during an up-front load: second half of the
    /// `loadingModels` range.
    fn loading_progress_summarize(&self) -> SummarizeProgress {
        let bus = self.bus.clone();
        Arc::new(move |ev| {
            if ev.phase == SummarizePhase::LoadingModel {
                bus.emit(
                    Stage::LoadingModels,
                    slice(LOAD_SUMMARY_SLICE, ev.fraction),
                    ev.message,
                );
            }
        })
    }

    /// Re-map transcription-engine phases onto pipeline stages.
    fn transcribe_progress(&self) -> TranscribeProgress {
        let bus = self.bus.clone();
        Arc::new(move |ev| match ev.phase {
            TranscribePhase::LoadingModel => bus.emit(
                Stage::LoadingModels,
                slice(LOAD_SPEECH_SLICE, ev.fraction),
                ev.message,
            ),
            TranscribePhase::Preprocessing => {
                bus.emit(Stage::PreprocessingAudio, ev.fraction, ev.message)
            }
            TranscribePhase::Transcribing => {
                bus.emit(Stage::Transcribing, ev.fraction, ev.message)
            }
            TranscribePhase::Done => bus.emit(Stage::Transcribing, 1.0, ev.message),
        })
    }

    /// Re-map summarizer phases onto slices of the `summarizing` range.
    fn summarize_progress(&self) -> SummarizeProgress {
        let bus = self.bus.clone();
        Arc::new(move |ev| match ev.phase {
            SummarizePhase::LoadingModel => bus.emit(
                Stage::LoadingModels,
                slice(LOAD_SUMMARY_SLICE, ev.fraction),
                ev.message,
            ),
            SummarizePhase::Tokenizing => bus.emit(
                Stage::Summarizing,
                slice(TOKENIZE_SLICE, ev.fraction),
                ev.message,
            ),
            SummarizePhase::EvaluatingPrompt => bus.emit(
                Stage::Summarizing,
                slice(PROMPT_SLICE, ev.fraction),
                ev.message,
            ),
            SummarizePhase::Generating => bus.emit(
                Stage::Summarizing,
                slice(GENERATE_SLICE, ev.fraction),
                ev.message,
            ),
            SummarizePhase::Done => bus.emit(Stage::Summarizing, 1.0, ev.message),
        })
    }
}
