//! Batch scoring, display-scale normalization, and ranking.

use std::cmp::Ordering;

use super::{PipelineError, PipelineResult};

/// Guards the normalization against a zero range when every raw score in
/// the batch is equal.
const SCORE_RANGE_EPSILON: f32 = 1e-9;

const DISPLAY_MIN: f32 = 1.0;
const DISPLAY_SPAN: f32 = 4.0;

/// Narrow seam over the model's batch prediction capability.
///
/// The pipeline only ever needs one operation from the trained artifact, so
/// it is injected behind this trait and the pipeline stays testable with a
/// stub model.
#[cfg_attr(test, mockall::automock)]
pub trait ScoreModel {
    /// Predicts raw scores for `candidates`, positionally aligned.
    fn predict_batch(&self, user_index: usize, candidates: &[usize]) -> PipelineResult<Vec<f32>>;
}

/// A candidate with its raw model score and 1-5 display score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub item_index: usize,
    pub raw_score: f32,
    pub display_score: f32,
}

/// Scores a candidate set in one batch call and rescales onto [1, 5].
///
/// An empty candidate set returns empty without touching the model. The
/// display scale is relative to this batch only, so display scores are
/// not comparable across requests. Output order matches input order;
/// ranking is a separate step.
pub fn score_candidates<M: ScoreModel + ?Sized>(
    model: &M,
    user_index: usize,
    candidates: &[usize],
) -> PipelineResult<Vec<ScoredCandidate>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let scores = model.predict_batch(user_index, candidates)?;
    if scores.len() != candidates.len() {
        return Err(PipelineError::Prediction(format!(
            "expected {} scores, model returned {}",
            candidates.len(),
            scores.len()
        )));
    }

    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    Ok(candidates
        .iter()
        .zip(scores)
        .map(|(&item_index, raw_score)| ScoredCandidate {
            item_index,
            raw_score,
            display_score: DISPLAY_MIN
                + DISPLAY_SPAN * (raw_score - min) / (range + SCORE_RANGE_EPSILON),
        })
        .collect())
}

/// Orders by raw score descending and truncates to `n`.
///
/// The sort is stable: candidates with equal raw scores keep their input
/// order. Requesting more than available is not an error.
pub fn rank(mut scored: Vec<ScoredCandidate>, n: usize) -> Vec<ScoredCandidate> {
    scored.sort_by(|a, b| {
        b.raw_score
            .partial_cmp(&a.raw_score)
            .unwrap_or(Ordering::Equal)
    });
    scored.truncate(n);
    scored
}
