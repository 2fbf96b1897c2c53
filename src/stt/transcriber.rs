//! Speech-to-text engine seam.
//!
//! The trait allows swapping implementations (real Whisper vs mock) and
//! keeps the orchestrator testable without model files.

use crate::error::{Result, VoxsumError};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Stage-local phases of a transcription call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscribePhase {
    LoadingModel,
    Preprocessing,
    Transcribing,
    Done,
}

/// Stage-local progress event emitted by a transcription engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeEvent {
    pub phase: TranscribePhase,
    pub fraction: f64,
    pub message: String,
}

/// Per-call progress callback.
///
/// Shared so engines can hand it to blocking decode workers.
pub type TranscribeProgress = Arc<dyn Fn(TranscribeEvent) + Send + Sync>;

pub(crate) fn emit(
    progress: Option<&TranscribeProgress>,
    phase: TranscribePhase,
    fraction: f64,
    message: impl Into<String>,
) {
    if let Some(cb) = progress {
        cb(TranscribeEvent {
            phase,
            fraction,
            message: message.into(),
        });
    }
}

/// Trait for speech-to-text transcription engines.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Load the model. Idempotent and single-flight: a concurrent call
    /// while a load is in flight queues and returns once the first
    /// completes, without loading again.
    async fn load_model(&self, progress: Option<TranscribeProgress>) -> Result<()>;

    /// Transcribe an audio file into cleaned text.
    ///
    /// Loads the model first if needed and normalizes the input unless
    /// it already is canonical WAV. `language` of `None` or `"auto"`
    /// enables language detection.
    async fn transcribe(
        &self,
        audio: &Path,
        language: Option<&str>,
        progress: Option<TranscribeProgress>,
    ) -> Result<String>;

    /// Whether the model is loaded.
    fn is_ready(&self) -> bool;

    /// Name of the configured model.
    fn model_name(&self) -> &str;
}

/// Mock transcriber for orchestrator tests.
#[derive(Debug)]
pub struct MockTranscriber {
    model_name: String,
    response: String,
    fail_load: bool,
    fail_transcribe: bool,
    load_delay: Option<Duration>,
    loads: AtomicUsize,
    loaded: tokio::sync::Mutex<bool>,
    ready: AtomicBool,
}

impl MockTranscriber {
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            response: "mock transcription".to_string(),
            fail_load: false,
            fail_transcribe: false,
            load_delay: None,
            loads: AtomicUsize::new(0),
            loaded: tokio::sync::Mutex::new(false),
            ready: AtomicBool::new(false),
        }
    }

    /// Configure the mock to return a specific transcript.
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail on load.
    pub fn with_load_failure(mut self) -> Self {
        self.fail_load = true;
        self
    }

    /// Configure the mock to fail on transcribe.
    pub fn with_failure(mut self) -> Self {
        self.fail_transcribe = true;
        self
    }

    /// Hold the load lock for `delay`, to exercise single-flight callers.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    /// How many times the model was actually initialized.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechToText for MockTranscriber {
    async fn load_model(&self, progress: Option<TranscribeProgress>) -> Result<()> {
        let mut loaded = self.loaded.lock().await;
        if *loaded {
            return Ok(());
        }

        emit(progress.as_ref(), TranscribePhase::LoadingModel, 0.0, "loading mock");
        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_load {
            return Err(VoxsumError::ModelLoadFailed {
                message: "mock load failure".to_string(),
            });
        }

        self.loads.fetch_add(1, Ordering::SeqCst);
        *loaded = true;
        self.ready.store(true, Ordering::SeqCst);
        emit(progress.as_ref(), TranscribePhase::LoadingModel, 1.0, "mock loaded");
        Ok(())
    }

    async fn transcribe(
        &self,
        _audio: &Path,
        _language: Option<&str>,
        progress: Option<TranscribeProgress>,
    ) -> Result<String> {
        self.load_model(progress.clone()).await?;

        emit(progress.as_ref(), TranscribePhase::Preprocessing, 1.0, "mock audio ready");
        emit(progress.as_ref(), TranscribePhase::Transcribing, 0.5, "mock decoding");

        if self.fail_transcribe {
            return Err(VoxsumError::EmptyTranscriptionResult);
        }

        emit(progress.as_ref(), TranscribePhase::Done, 1.0, "mock done");
        Ok(self.response.clone())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn mock_returns_configured_response() {
        let engine = MockTranscriber::new("test-model").with_response("hello world");
        let text = engine
            .transcribe(&PathBuf::from("ignored.wav"), None, None)
            .await
            .unwrap();
        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn mock_fails_when_configured() {
        let engine = MockTranscriber::new("test-model").with_failure();
        let result = engine
            .transcribe(&PathBuf::from("ignored.wav"), None, None)
            .await;
        assert!(matches!(result, Err(VoxsumError::EmptyTranscriptionResult)));
    }

    #[tokio::test]
    async fn mock_load_is_idempotent() {
        let engine = MockTranscriber::new("test-model");
        engine.load_model(None).await.unwrap();
        engine.load_model(None).await.unwrap();
        assert_eq!(engine.load_count(), 1);
        assert!(engine.is_ready());
    }

    #[tokio::test]
    async fn concurrent_loads_initialize_once() {
        let engine = Arc::new(
            MockTranscriber::new("test-model").with_load_delay(Duration::from_millis(20)),
        );

        let a = tokio::spawn({
            let engine = engine.clone();
            async move { engine.load_model(None).await }
        });
        let b = tokio::spawn({
            let engine = engine.clone();
            async move { engine.load_model(None).await }
        });

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(engine.load_count(), 1, "model must be initialized exactly once");
        assert!(engine.is_ready());
    }

    #[tokio::test]
    async fn mock_emits_progress_phases() {
        let engine = MockTranscriber::new("test-model");
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = events.clone();
        let progress: TranscribeProgress = Arc::new(move |ev: TranscribeEvent| {
            sink.lock().unwrap().push(ev.phase);
        });

        engine
            .transcribe(&PathBuf::from("ignored.wav"), None, Some(progress))
            .await
            .unwrap();

        let phases = events.lock().unwrap().clone();
        assert!(phases.contains(&TranscribePhase::LoadingModel));
        assert!(phases.contains(&TranscribePhase::Preprocessing));
        assert!(phases.contains(&TranscribePhase::Transcribing));
        assert_eq!(phases.last(), Some(&TranscribePhase::Done));
    }

    #[test]
    fn trait_is_object_safe() {
        fn _assert(_: &dyn SpeechToText) {}
    }
}
