//! Token sampling: temperature scaling, top-k, nucleus truncation.
//!
//! The random source is injected so sampling is reproducible with a
//! seeded generator.

use crate::defaults;
use rand::Rng;

/// Sampling knobs for one generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    /// Logit divisor; 0 disables scaling and samples from raw logits.
    pub temperature: f32,
    /// Candidates retained before the softmax.
    pub top_k: usize,
    /// Cumulative-probability threshold for nucleus truncation.
    pub top_p: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: defaults::TEMPERATURE,
            top_k: defaults::TOP_K,
            top_p: defaults::TOP_P,
        }
    }
}

/// One retained candidate with its softmax probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub token: u32,
    pub prob: f32,
}

/// Temperature-scale the logits, retain the top `top_k`, and apply a
/// numerically stable softmax over the retained set.
///
/// The result is sorted by descending probability and sums to 1 (within
/// floating-point error) whenever it is non-empty.
pub fn top_k_candidates(logits: &[f32], temperature: f32, top_k: usize) -> Vec<Candidate> {
    if logits.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let mut items: Vec<(u32, f32)> = logits
        .iter()
        .enumerate()
        .map(|(i, &logit)| {
            let scaled = if temperature > 0.0 { logit / temperature } else { logit };
            (i as u32, scaled)
        })
        .collect();

    items.sort_unstable_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    items.truncate(top_k);

    let max_logit = items[0].1;
    let exps: Vec<f32> = items.iter().map(|&(_, l)| (l - max_logit).exp()).collect();
    let sum: f32 = exps.iter().sum();

    items
        .iter()
        .zip(exps)
        .map(|(&(token, _), e)| Candidate {
            token,
            prob: if sum > 0.0 { e / sum } else { 0.0 },
        })
        .collect()
}

/// Size of the smallest prefix whose cumulative probability reaches
/// `top_p` (inclusive). Returns the full length when the threshold is
/// never reached.
pub fn nucleus_cutoff(candidates: &[Candidate], top_p: f32) -> usize {
    let mut cumulative = 0.0f32;
    for (i, c) in candidates.iter().enumerate() {
        cumulative += c.prob;
        if cumulative >= top_p {
            return i + 1;
        }
    }
    candidates.len()
}

/// Sample the next token id, or `None` when there is nothing to sample.
///
/// The retained probabilities are NOT renormalized after the nucleus
/// cut: a draw landing past the truncated mass selects the last
/// retained candidate.
pub fn sample_token<R: Rng>(logits: &[f32], params: &SamplingParams, rng: &mut R) -> Option<u32> {
    let mut candidates = top_k_candidates(logits, params.temperature, params.top_k);
    if candidates.is_empty() {
        return None;
    }

    let cut = nucleus_cutoff(&candidates, params.top_p);
    candidates.truncate(cut);

    let mut r: f32 = rng.random();
    let mut idx = 0;
    while idx < candidates.len() {
        r -= candidates[idx].prob;
        if r <= 0.0 {
            break;
        }
        idx += 1;
    }
    if idx >= candidates.len() {
        idx = candidates.len() - 1;
    }

    Some(candidates[idx].token)
}
