//! Fused batched suppression over class-shared boxes.

use super::{
    run_batch, sort_selections_desc, DetectionBatch, NmsConfig, NonMaxSuppression, Selection,
};
use crate::boxes::BBox;
use crate::candidate::ThresholdedBatch;
use crate::util::math::score_desc_by_index;
use crate::util::DetPostResult;

/// One fused pass over the `[k, classes]` score matrix.
///
/// The box tensor is anchor-aligned and shared across classes: every class
/// column of every candidate competes, without the per-anchor argmax the
/// standard variant performs first. Each class is capped at
/// `post_nms_size` selections, the merge is capped at `post_nms_size`
/// overall. With thresholded inputs (one surviving class per anchor) the
/// result matches the standard variant; the fused loop avoids per-class
/// box duplication and is the default for production inference.
pub struct CombinedNms {
    config: NmsConfig,
}

impl CombinedNms {
    /// Creates the strategy after validating `config`.
    pub fn new(config: NmsConfig) -> DetPostResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    fn suppress_image(&self, boxes: &[f32], scores: &[f32]) -> Vec<Selection> {
        let cfg = &self.config;
        let k = boxes.len() / 4;
        let classes = cfg.num_classes;

        let mut merged: Vec<Selection> = Vec::with_capacity(cfg.post_nms_size);
        let mut order: Vec<usize> = Vec::with_capacity(k);
        for class_id in 0..classes {
            order.clear();
            order.extend((0..k).filter(|&a| scores[a * classes + class_id] > cfg.score_threshold));
            if order.is_empty() {
                continue;
            }
            order.sort_by(|&a, &b| {
                let (sa, sb) = (scores[a * classes + class_id], scores[b * classes + class_id]);
                score_desc_by_index(sa, a, sb, b)
            });

            let mut removed = vec![false; order.len()];
            let mut picked_in_class = 0;
            for i in 0..order.len() {
                if removed[i] {
                    continue;
                }
                let selected = BBox::from_slice(&boxes[order[i] * 4..order[i] * 4 + 4]);
                merged.push(Selection {
                    bbox: selected,
                    score: scores[order[i] * classes + class_id],
                    class_id: class_id as i32,
                });
                picked_in_class += 1;
                if picked_in_class == cfg.post_nms_size {
                    break;
                }
                for j in i + 1..order.len() {
                    if removed[j] {
                        continue;
                    }
                    let other = BBox::from_slice(&boxes[order[j] * 4..order[j] * 4 + 4]);
                    if selected.iou(&other) > cfg.iou_threshold {
                        removed[j] = true;
                    }
                }
            }
        }

        sort_selections_desc(&mut merged);
        merged
    }
}

impl NonMaxSuppression for CombinedNms {
    fn suppress(&self, input: &ThresholdedBatch) -> DetPostResult<DetectionBatch> {
        run_batch(input, &self.config, |i| {
            self.suppress_image(input.image_boxes(i), input.image_scores(i))
        })
    }
}
