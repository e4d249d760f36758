//! Scalar math helpers shared across the pipeline.

use std::cmp::Ordering;

/// Logistic sigmoid, mapping raw logits to probabilities.
pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Gaussian decay factor `exp(-iou^2 / sigma)` used by soft-NMS.
pub(crate) fn gaussian_decay(iou: f32, sigma: f32) -> f32 {
    (-(iou * iou) / sigma).exp()
}

/// Orders scores descending with a stable tie-break on the original index.
pub(crate) fn score_desc_by_index(
    a_score: f32,
    a_idx: usize,
    b_score: f32,
    b_idx: usize,
) -> Ordering {
    b_score.total_cmp(&a_score).then_with(|| a_idx.cmp(&b_idx))
}
