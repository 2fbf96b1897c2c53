//! Summarization engine seam.

use crate::error::{Result, VoxsumError};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Stage-local phases of a summarization call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarizePhase {
    LoadingModel,
    Tokenizing,
    EvaluatingPrompt,
    Generating,
    Done,
}

/// Stage-local progress event emitted by a summarization engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarizeEvent {
    pub phase: SummarizePhase,
    pub fraction: f64,
    pub message: String,
}

/// Per-call progress callback.
pub type SummarizeProgress = Arc<dyn Fn(SummarizeEvent) + Send + Sync>;

pub(crate) fn emit(
    progress: Option<&SummarizeProgress>,
    phase: SummarizePhase,
    fraction: f64,
    message: impl Into<String>,
) {
    if let Some(cb) = progress {
        cb(SummarizeEvent {
            phase,
            fraction,
            message: message.into(),
        });
    }
}

/// Trait for text summarization engines.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Load the model. Idempotent and single-flight, like
    /// [`crate::stt::SpeechToText::load_model`].
    async fn load_model(&self, progress: Option<SummarizeProgress>) -> Result<()>;

    /// Condense `text` into a short summary. Each call is stateless
    /// with respect to prior calls.
    async fn summarize(&self, text: &str, progress: Option<SummarizeProgress>) -> Result<String>;

    /// Whether the model is loaded.
    fn is_ready(&self) -> bool;
}

/// Mock summarizer for orchestrator tests.
#[derive(Debug)]
pub struct MockSummarizer {
    response: String,
    fail_load: bool,
    fail_summarize: bool,
    load_delay: Option<Duration>,
    loads: AtomicUsize,
    loaded: tokio::sync::Mutex<bool>,
    ready: AtomicBool,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self {
            response: "mock summary".to_string(),
            fail_load: false,
            fail_summarize: false,
            load_delay: None,
            loads: AtomicUsize::new(0),
            loaded: tokio::sync::Mutex::new(false),
            ready: AtomicBool::new(false),
        }
    }

    /// Configure the mock to return a specific summary.
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail on load.
    pub fn with_load_failure(mut self) -> Self {
        self.fail_load = true;
        self
    }

    /// Configure the mock to fail on summarize.
    pub fn with_failure(mut self) -> Self {
        self.fail_summarize = true;
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

impl Default for MockSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn load_model(&self, progress: Option<SummarizeProgress>) -> Result<()> {
        let mut loaded = self.loaded.lock().await;
        if *loaded {
            return Ok(());
        }

        emit(progress.as_ref(), SummarizePhase::LoadingModel, 0.0, "loading mock");
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
        emit(progress.as_ref(), SummarizePhase::LoadingModel, 1.0, "mock loaded");
        Ok(())
    }

    async fn summarize(&self, _text: &str, progress: Option<SummarizeProgress>) -> Result<String> {
        self.load_model(progress.clone()).await?;

        emit(progress.as_ref(), SummarizePhase::Tokenizing, 1.0, "mock tokens");
        emit(progress.as_ref(), SummarizePhase::EvaluatingPrompt, 1.0, "mock prompt");
        emit(progress.as_ref(), SummarizePhase::Generating, 0.5, "mock generating");

        if self.fail_summarize {
            return Err(VoxsumError::EmptySummaryResult);
        }

        emit(progress.as_ref(), SummarizePhase::Done, 1.0, "mock done");
        Ok(self.response.clone())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
