//! Bounded generation context for a single summarization call.

use crate::error::{Result, VoxsumError};

/// One forward step of a causal language model.
///
/// `pos` is the absolute position of the first token in `tokens`;
/// implementations return the logits of the chunk's last token. A step
/// at position zero starts a fresh window, discarding any state left by
/// a previous call.
pub trait DecodeBackend: Send {
    fn decode_step(&mut self, tokens: &[u32], pos: usize) -> Result<Vec<f32>>;
}

/// Attention-window bookkeeping for one call: fixed capacity `n_ctx`,
/// batch width `n_batch`, and the running position counter.
///
/// The context exclusively borrows the backend for its lifetime, so the
/// window is released on every exit path — success, early stop, or
/// error — when the context goes out of scope. It cannot outlive the
/// call or be shared across calls.
pub struct GenerationContext<'a, B: DecodeBackend + ?Sized> {
    backend: &'a mut B,
    n_ctx: usize,
    n_batch: usize,
    pos: usize,
}

impl<'a, B: DecodeBackend + ?Sized> GenerationContext<'a, B> {
    /// Create a context over `backend`.
    ///
    /// # Errors
    /// `ContextCreationFailed` when `n_ctx` or `n_batch` is zero, or
    /// `n_batch` exceeds `n_ctx`.
    pub fn new(backend: &'a mut B, n_ctx: usize, n_batch: usize) -> Result<Self> {
        if n_ctx == 0 || n_batch == 0 {
            return Err(VoxsumError::ContextCreationFailed {
                message: format!("invalid window: n_ctx={}, n_batch={}", n_ctx, n_batch),
            });
        }
        if n_batch > n_ctx {
            return Err(VoxsumError::ContextCreationFailed {
                message: format!("n_batch {} exceeds n_ctx {}", n_batch, n_ctx),
            });
        }
        Ok(Self {
            backend,
            n_ctx,
            n_batch,
            pos: 0,
        })
    }

    /// Tokens decoded so far; after prompt evaluation this equals the
    /// prompt length and seeds generation.
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn n_ctx(&self) -> usize {
        self.n_ctx
    }

    pub fn n_batch(&self) -> usize {
        self.n_batch
    }

    /// Decode one chunk at the current position and advance the counter.
    ///
    /// Returns the logits of the chunk's last token.
    pub fn decode(&mut self, tokens: &[u32]) -> Result<Vec<f32>> {
        if tokens.is_empty() {
            return Err(VoxsumError::DecodeStepFailed {
                message: "empty token chunk".to_string(),
            });
        }
        if tokens.len() > self.n_batch {
            return Err(VoxsumError::DecodeStepFailed {
                message: format!(
                    "chunk of {} tokens exceeds batch width {}",
                    tokens.len(),
                    self.n_batch
                ),
            });
        }
        if self.pos + tokens.len() > self.n_ctx {
            return Err(VoxsumError::DecodeStepFailed {
                message: format!(
                    "context window exhausted: {} + {} > {}",
                    self.pos,
                    tokens.len(),
                    self.n_ctx
                ),
            });
        }

        let logits = self.backend.decode_step(tokens, self.pos)?;
        self.pos += tokens.len();
        Ok(logits)
    }
}
