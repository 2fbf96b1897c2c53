//! Unified progress stream for the pipeline.
//!
//! Every component reports stage-local progress; the orchestrator
//! republishes it here as [`ProgressEvent`]s on a broadcast channel.
//! Publishing is fire-and-forget: events are dropped when nobody is
//! subscribed, and slow subscribers lag rather than block the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Default broadcast channel capacity per bus.
pub const DEFAULT_CAPACITY: usize = 64;

/// Pipeline stage a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Idle,
    LoadingModels,
    PreprocessingAudio,
    Transcribing,
    Summarizing,
    Done,
    Error,
}

impl Stage {
    /// Short lowercase name for display.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::LoadingModels => "loading models",
            Stage::PreprocessingAudio => "preprocessing audio",
            Stage::Transcribing => "transcribing",
            Stage::Summarizing => "summarizing",
            Stage::Done => "done",
            Stage::Error => "error",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress record: stage, fraction in `[0, 1]`, human-readable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub fraction: f64,
    pub message: String,
}

/// Publish/subscribe bus for [`ProgressEvent`]s.
///
/// Fractions are clamped to `[0, 1]` and forced to be non-decreasing
/// within a stage: a regression inside the same stage is raised to the
/// last published value. Switching stages resets the floor.
pub struct ProgressBus {
    tx: broadcast::Sender<ProgressEvent>,
    last: std::sync::Mutex<Option<(Stage, f64)>>,
}

impl ProgressBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            last: std::sync::Mutex::new(None),
        }
    }

    /// Subscribe to the stream. Each receiver sees events published
    /// after this call; subscribers never exert backpressure.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Publish one event, enforcing the per-stage monotonicity invariant.
    pub fn emit(&self, stage: Stage, fraction: f64, message: impl Into<String>) {
        let mut fraction = fraction.clamp(0.0, 1.0);

        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((prev_stage, prev_fraction)) = *last
            && prev_stage == stage
            && fraction < prev_fraction
        {
            fraction = prev_fraction;
        }
        *last = Some((stage, fraction));
        drop(last);

        // No subscribers is fine; the stream is fire-and-forget.
        let _ = self.tx.send(ProgressEvent {
            stage,
            fraction,
            message: message.into(),
        });
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut broadcast::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let bus = ProgressBus::default();
        bus.emit(Stage::Idle, 0.0, "nobody listening");
    }

    #[test]
    fn subscriber_receives_events_in_order() {
        let bus = ProgressBus::default();
        let mut rx = bus.subscribe();

        bus.emit(Stage::Transcribing, 0.25, "a");
        bus.emit(Stage::Transcribing, 0.75, "b");

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].fraction, 0.25);
        assert_eq!(events[1].fraction, 0.75);
    }

    #[test]
    fn fraction_regression_within_stage_is_clamped() {
        let bus = ProgressBus::default();
        let mut rx = bus.subscribe();

        bus.emit(Stage::Summarizing, 0.6, "forward");
        bus.emit(Stage::Summarizing, 0.4, "regression");

        let events = drain(&mut rx);
        assert_eq!(events[1].fraction, 0.6, "regression must be clamped");
    }

    #[test]
    fn stage_change_resets_the_floor() {
        let bus = ProgressBus::default();
        let mut rx = bus.subscribe();

        bus.emit(Stage::Transcribing, 0.9, "");
        bus.emit(Stage::Summarizing, 0.1, "");

        let events = drain(&mut rx);
        assert_eq!(events[1].stage, Stage::Summarizing);
        assert_eq!(events[1].fraction, 0.1);
    }

    #[test]
    fn fraction_is_clamped_to_unit_interval() {
        let bus = ProgressBus::default();
        let mut rx = bus.subscribe();

        bus.emit(Stage::PreprocessingAudio, 1.7, "over");
        let events = drain(&mut rx);
        assert_eq!(events[0].fraction, 1.0);
    }

    #[test]
    fn multiple_subscribers_see_the_same_events() {
        let bus = ProgressBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.emit(Stage::Done, 1.0, "finished");

        assert_eq!(drain(&mut a), drain(&mut b));
    }

    #[test]
    fn event_serializes_with_camel_case_stage() {
        let ev = ProgressEvent {
            stage: Stage::LoadingModels,
            fraction: 0.5,
            message: "half".to_string(),
        };
        let json = serde_json::to_string(&ev).expect("serialize");
        assert!(json.contains("\"loadingModels\""), "json: {}", json);

        let back: ProgressEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, ev);
    }

    #[test]
    fn stage_display_names() {
        assert_eq!(Stage::PreprocessingAudio.to_string(), "preprocessing audio");
        assert_eq!(Stage::Error.to_string(), "error");
    }
}
