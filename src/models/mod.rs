//! Model artifact catalog and local path resolution.

pub mod catalog;

pub use catalog::{SpeechModelInfo, SummaryModelInfo, get_speech_model, get_summary_model};
