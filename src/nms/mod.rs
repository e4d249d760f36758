//! Non-maximum suppression strategies and the shared output contract.
//!
//! Four interchangeable strategies reduce a thresholded `[batch, k]`
//! candidate set to at most `post_nms_size` detections per image. All of
//! them share one configuration, one input shape and the padded fixed-size
//! [`DetectionBatch`] output.

mod combined;
mod fast;
mod soft;
mod standard;

pub use combined::CombinedNms;
pub use fast::FastNms;
pub use soft::SoftNms;
pub use standard::StandardNms;

use crate::boxes::BBox;
use crate::candidate::ThresholdedBatch;
use crate::trace::{trace_event, trace_span};
use crate::util::{DetPostError, DetPostResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Shared suppression configuration, immutable for a pipeline's lifetime.
#[derive(Clone, Copy, Debug)]
pub struct NmsConfig {
    /// Overlap above which a lower-scored same-class box is suppressed.
    pub iou_threshold: f32,
    /// Scores at or below this value never reach the output.
    pub score_threshold: f32,
    /// Fixed per-image candidate capacity ahead of suppression.
    pub pre_nms_size: usize,
    /// Fixed per-image detection capacity after suppression.
    pub post_nms_size: usize,
    pub num_classes: usize,
    /// Gaussian decay width; soft-NMS only.
    pub soft_nms_sigma: f32,
    /// Process images in parallel (requires the `rayon` feature).
    pub parallel: bool,
}

impl Default for NmsConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.5,
            score_threshold: 0.2,
            pre_nms_size: 5000,
            post_nms_size: 100,
            num_classes: 90,
            soft_nms_sigma: 0.5,
            parallel: false,
        }
    }
}

impl NmsConfig {
    /// Rejects out-of-range values before any geometric work runs.
    pub fn validate(&self) -> DetPostResult<()> {
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(DetPostError::InvalidConfig {
                name: "iou_threshold",
                value: self.iou_threshold as f64,
                constraint: "must lie in [0, 1]",
            });
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(DetPostError::InvalidConfig {
                name: "score_threshold",
                value: self.score_threshold as f64,
                constraint: "must lie in [0, 1]",
            });
        }
        if self.pre_nms_size == 0 {
            return Err(DetPostError::InvalidConfig {
                name: "pre_nms_size",
                value: 0.0,
                constraint: "must be positive",
            });
        }
        if self.post_nms_size == 0 {
            return Err(DetPostError::InvalidConfig {
                name: "post_nms_size",
                value: 0.0,
                constraint: "must be positive",
            });
        }
        if self.num_classes == 0 {
            return Err(DetPostError::InvalidConfig {
                name: "num_classes",
                value: 0.0,
                constraint: "must be positive",
            });
        }
        if !(self.soft_nms_sigma > 0.0) {
            return Err(DetPostError::InvalidConfig {
                name: "soft_nms_sigma",
                value: self.soft_nms_sigma as f64,
                constraint: "must be positive",
            });
        }
        Ok(())
    }
}

/// One decoded detection slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub score: f32,
    /// Class id; `-1` marks a padding slot.
    pub class_id: i32,
}

/// Fixed-shape suppression output for a batch of images.
///
/// Each image owns exactly `capacity` slots. The first `valid(i)` slots are
/// real detections sorted by descending score; the rest are zero boxes with
/// zero scores and class `-1`.
pub struct DetectionBatch {
    boxes: Vec<f32>,
    scores: Vec<f32>,
    classes: Vec<i32>,
    valid: Vec<usize>,
    capacity: usize,
}

impl DetectionBatch {
    /// Returns the batch size.
    pub fn batch(&self) -> usize {
        self.valid.len()
    }

    /// Returns the fixed per-image slot count (`post_nms_size`).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of real detections for image `i`.
    pub fn valid(&self, i: usize) -> usize {
        self.valid[i]
    }

    /// Returns the `[capacity, 4]` box slice for image `i`.
    pub fn boxes(&self, i: usize) -> &[f32] {
        let row = self.capacity * 4;
        &self.boxes[i * row..(i + 1) * row]
    }

    /// Returns the `[capacity]` score slice for image `i`.
    pub fn scores(&self, i: usize) -> &[f32] {
        &self.scores[i * self.capacity..(i + 1) * self.capacity]
    }

    /// Returns the `[capacity]` class slice for image `i`; `-1` is padding.
    pub fn classes(&self, i: usize) -> &[i32] {
        &self.classes[i * self.capacity..(i + 1) * self.capacity]
    }

    /// Iterates the real (non-padding) detections of image `i`.
    pub fn detections(&self, i: usize) -> impl Iterator<Item = Detection> + '_ {
        let boxes = self.boxes(i);
        let scores = self.scores(i);
        let classes = self.classes(i);
        (0..self.valid[i]).map(move |s| Detection {
            bbox: BBox::from_slice(&boxes[s * 4..s * 4 + 4]),
            score: scores[s],
            class_id: classes[s],
        })
    }

    fn from_images(images: Vec<ImageSlots>, capacity: usize) -> Self {
        let batch = images.len();
        let mut boxes = Vec::with_capacity(batch * capacity * 4);
        let mut scores = Vec::with_capacity(batch * capacity);
        let mut classes = Vec::with_capacity(batch * capacity);
        let mut valid = Vec::with_capacity(batch);
        for img in images {
            boxes.extend_from_slice(&img.boxes);
            scores.extend_from_slice(&img.scores);
            classes.extend_from_slice(&img.classes);
            valid.push(img.valid);
        }
        Self {
            boxes,
            scores,
            classes,
            valid,
            capacity,
        }
    }
}

/// One selected box before output assembly.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Selection {
    pub(crate) bbox: BBox,
    pub(crate) score: f32,
    pub(crate) class_id: i32,
}

struct ImageSlots {
    boxes: Vec<f32>,
    scores: Vec<f32>,
    classes: Vec<i32>,
    valid: usize,
}

/// Pads or truncates one image's selections to exactly `capacity` slots.
fn assemble_image(mut picked: Vec<Selection>, capacity: usize) -> ImageSlots {
    picked.truncate(capacity);
    let valid = picked.len();
    let mut boxes = vec![0f32; capacity * 4];
    let mut scores = vec![0f32; capacity];
    let mut classes = vec![-1i32; capacity];
    for (slot, sel) in picked.iter().enumerate() {
        sel.bbox.write_to(&mut boxes[slot * 4..slot * 4 + 4]);
        scores[slot] = sel.score;
        classes[slot] = sel.class_id;
    }
    ImageSlots {
        boxes,
        scores,
        classes,
        valid,
    }
}

/// Runs `per_image` over the batch and assembles the fixed-size output.
pub(crate) fn run_batch<F>(
    input: &ThresholdedBatch,
    config: &NmsConfig,
    per_image: F,
) -> DetPostResult<DetectionBatch>
where
    F: Fn(usize) -> Vec<Selection> + Sync,
{
    if input.classes() != config.num_classes {
        return Err(DetPostError::ShapeMismatch {
            dim: "classes",
            expected: config.num_classes,
            got: input.classes(),
        });
    }

    let batch = input.batch();
    let capacity = config.post_nms_size;
    let run = |i: usize| assemble_image(per_image(i), capacity);

    #[cfg(feature = "rayon")]
    let images: Vec<ImageSlots> = if config.parallel {
        (0..batch).into_par_iter().map(run).collect()
    } else {
        (0..batch).map(run).collect()
    };
    #[cfg(not(feature = "rayon"))]
    let images: Vec<ImageSlots> = (0..batch).map(run).collect();

    Ok(DetectionBatch::from_images(images, capacity))
}

/// Per-anchor best class index and score for one thresholded image.
pub(crate) fn best_class_per_anchor(scores: &[f32], k: usize, classes: usize) -> Vec<(i32, f32)> {
    (0..k)
        .map(|a| {
            let row = &scores[a * classes..(a + 1) * classes];
            let mut best = 0usize;
            let mut best_score = row[0];
            for (c, &s) in row.iter().enumerate().skip(1) {
                if s > best_score {
                    best = c;
                    best_score = s;
                }
            }
            (best as i32, best_score)
        })
        .collect()
}

/// Sorts merged selections by descending score.
///
/// The sort is stable, so same-score entries keep their class-major order.
pub(crate) fn sort_selections_desc(selections: &mut [Selection]) {
    selections.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Suppression strategy selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NmsKind {
    /// Greedy per-class suppression (exact).
    Standard,
    /// Parallel triangle suppression (approximate, no greedy chain).
    Fast,
    /// Gaussian score decay instead of hard removal.
    Soft,
    /// One fused pass over anchor-aligned boxes shared across classes.
    Combined,
}

/// Shared contract implemented by every suppression strategy.
pub trait NonMaxSuppression {
    /// Reduces thresholded candidates to padded `post_nms_size` detections.
    fn suppress(&self, input: &ThresholdedBatch) -> DetPostResult<DetectionBatch>;
}

/// Tagged strategy dispatcher, selected from configuration at construction.
pub enum NmsStrategy {
    Standard(StandardNms),
    Fast(FastNms),
    Soft(SoftNms),
    Combined(CombinedNms),
}

impl NmsStrategy {
    /// Builds the strategy for `kind`, validating `config` first.
    pub fn new(kind: NmsKind, config: NmsConfig) -> DetPostResult<Self> {
        config.validate()?;
        Ok(match kind {
            NmsKind::Standard => Self::Standard(StandardNms::new(config)?),
            NmsKind::Fast => Self::Fast(FastNms::new(config)?),
            NmsKind::Soft => Self::Soft(SoftNms::new(config)?),
            NmsKind::Combined => Self::Combined(CombinedNms::new(config)?),
        })
    }
}

impl NonMaxSuppression for NmsStrategy {
    fn suppress(&self, input: &ThresholdedBatch) -> DetPostResult<DetectionBatch> {
        let _span = trace_span!("nms", batch = input.batch()).entered();
        let out = match self {
            Self::Standard(s) => s.suppress(input),
            Self::Fast(s) => s.suppress(input),
            Self::Soft(s) => s.suppress(input),
            Self::Combined(s) => s.suppress(input),
        }?;
        trace_event!("nms_done", batch = out.batch(), capacity = out.capacity());
        Ok(out)
    }
}
