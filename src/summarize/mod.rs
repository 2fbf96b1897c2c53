//! Summarization: prompt templating, chunked prompt evaluation, and
//! token-by-token sampling over a quantized causal language model.

pub mod candle_llama;
pub mod context;
pub mod prompt;
pub mod sampler;
pub mod summarizer;

pub use candle_llama::{CandleLlamaSummarizer, SummarizerConfig};
pub use context::{DecodeBackend, GenerationContext};
pub use sampler::SamplingParams;
pub use summarizer::{
    MockSummarizer, SummarizeEvent, SummarizePhase, SummarizeProgress, Summarizer,
};
