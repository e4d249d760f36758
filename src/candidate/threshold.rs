//! Score gating and per-image top-K pre-filtering.
//!
//! This is the busiest per-anchor stage: it runs once per call over the
//! full anchor sequence and its fixed-size output feeds every suppression
//! strategy. Images are processed independently, in parallel under the
//! `rayon` feature.

use crate::nms::NmsConfig;
use crate::tensor::{BoxTensor, ScoreTensor};
use crate::trace::{trace_event, trace_span};
use crate::util::math::score_desc_by_index;
use crate::util::{DetPostError, DetPostResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Fixed-size thresholded candidate set.
///
/// Per image exactly `k` slots: `[k, 4]` boxes and `[k, classes]` scores.
/// Slots past the surviving anchor count are zero boxes with zero scores.
/// Within each surviving anchor only the best class keeps its score; the
/// other class entries are zeroed.
pub struct ThresholdedBatch {
    boxes: Vec<f32>,
    scores: Vec<f32>,
    batch: usize,
    k: usize,
    classes: usize,
}

impl ThresholdedBatch {
    /// Builds a batch from flat `[batch, k, 4]` / `[batch, k, classes]`
    /// buffers. Intended for driving a suppression strategy directly with
    /// already-filtered candidates.
    pub fn from_parts(
        boxes: Vec<f32>,
        scores: Vec<f32>,
        batch: usize,
        k: usize,
        classes: usize,
    ) -> DetPostResult<Self> {
        BoxTensor::new(&boxes, batch, k)?;
        ScoreTensor::new(&scores, batch, k, classes)?;
        Ok(Self {
            boxes,
            scores,
            batch,
            k,
            classes,
        })
    }

    /// Returns the batch size.
    pub fn batch(&self) -> usize {
        self.batch
    }

    /// Returns the fixed per-image candidate capacity.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns the number of classes per candidate.
    pub fn classes(&self) -> usize {
        self.classes
    }

    /// Returns the `[k, 4]` box slice for image `i`.
    pub fn image_boxes(&self, i: usize) -> &[f32] {
        let row = self.k * 4;
        &self.boxes[i * row..(i + 1) * row]
    }

    /// Returns the `[k, classes]` score slice for image `i`.
    pub fn image_scores(&self, i: usize) -> &[f32] {
        let row = self.k * self.classes;
        &self.scores[i * row..(i + 1) * row]
    }
}

/// Gates candidates on their best-class score and caps each image at the
/// `pre_nms_size` highest-scoring anchors.
///
/// Per image: anchors whose maximum class score is `<= score_threshold`
/// are dropped; if at most `pre_nms_size` anchors remain they are kept in
/// anchor order and zero-padded (the exact-fit case takes this branch and
/// pads nothing), otherwise the top `pre_nms_size` by max score are kept,
/// descending, ties broken by the lower anchor index.
pub fn batch_threshold(
    boxes: BoxTensor<'_>,
    scores: ScoreTensor<'_>,
    config: &NmsConfig,
) -> DetPostResult<ThresholdedBatch> {
    if boxes.batch() != scores.batch() {
        return Err(DetPostError::ShapeMismatch {
            dim: "batch",
            expected: boxes.batch(),
            got: scores.batch(),
        });
    }
    if boxes.anchors() != scores.anchors() {
        return Err(DetPostError::ShapeMismatch {
            dim: "anchors",
            expected: boxes.anchors(),
            got: scores.anchors(),
        });
    }

    let batch = boxes.batch();
    let k = config.pre_nms_size;
    let classes = scores.classes();
    let _span = trace_span!("batch_threshold", batch = batch, k = k).entered();

    let per_image = |i: usize| threshold_image(boxes.image(i), scores.image(i), classes, config);

    #[cfg(feature = "rayon")]
    let images: Vec<(Vec<f32>, Vec<f32>)> = if config.parallel {
        (0..batch).into_par_iter().map(per_image).collect()
    } else {
        (0..batch).map(per_image).collect()
    };
    #[cfg(not(feature = "rayon"))]
    let images: Vec<(Vec<f32>, Vec<f32>)> = (0..batch).map(per_image).collect();

    let mut out_boxes = Vec::with_capacity(batch * k * 4);
    let mut out_scores = Vec::with_capacity(batch * k * classes);
    for (b, s) in images {
        out_boxes.extend_from_slice(&b);
        out_scores.extend_from_slice(&s);
    }

    trace_event!("thresholded", batch = batch, capacity = k);
    ThresholdedBatch::from_parts(out_boxes, out_scores, batch, k, classes)
}

fn threshold_image(
    boxes: &[f32],
    scores: &[f32],
    classes: usize,
    config: &NmsConfig,
) -> (Vec<f32>, Vec<f32>) {
    let anchors = boxes.len() / 4;
    let k = config.pre_nms_size;

    let mut max_scores = vec![0f32; anchors];
    for (a, max) in max_scores.iter_mut().enumerate() {
        let row = &scores[a * classes..(a + 1) * classes];
        *max = row.iter().fold(f32::NEG_INFINITY, |m, &s| m.max(s));
    }

    let mut keep: Vec<usize> = (0..anchors)
        .filter(|&a| max_scores[a] > config.score_threshold)
        .collect();
    if keep.len() > k {
        keep.sort_by(|&a, &b| score_desc_by_index(max_scores[a], a, max_scores[b], b));
        keep.truncate(k);
    }

    let mut out_boxes = vec![0f32; k * 4];
    let mut out_scores = vec![0f32; k * classes];
    for (slot, &a) in keep.iter().enumerate() {
        out_boxes[slot * 4..slot * 4 + 4].copy_from_slice(&boxes[a * 4..a * 4 + 4]);
        let row = &scores[a * classes..(a + 1) * classes];
        let out_row = &mut out_scores[slot * classes..(slot + 1) * classes];
        for (o, &s) in out_row.iter_mut().zip(row) {
            // Only the anchor's own best class keeps its score.
            *o = if s < max_scores[a] { 0.0 } else { s };
        }
    }

    (out_boxes, out_scores)
}
