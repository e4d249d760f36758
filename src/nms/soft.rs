//! Soft non-maximum suppression with gaussian score decay.

use super::{
    best_class_per_anchor, run_batch, sort_selections_desc, DetectionBatch, NmsConfig,
    NonMaxSuppression, Selection,
};
use crate::boxes::BBox;
use crate::candidate::ThresholdedBatch;
use crate::util::math::gaussian_decay;
use crate::util::DetPostResult;

/// Suppression by rescoring instead of removal.
///
/// Per class the highest-scored remaining box is selected and every other
/// remaining box's score is decayed by `exp(-iou^2 / soft_nms_sigma)`;
/// boxes whose decayed score drops to `score_threshold` or below leave the
/// pool. The loop stops when the pool is empty or `post_nms_size` boxes
/// were selected for the class. A box with zero overlap keeps its score
/// unchanged. There is no hard IoU cut.
pub struct SoftNms {
    config: NmsConfig,
}

impl SoftNms {
    /// Creates the strategy after validating `config`.
    pub fn new(config: NmsConfig) -> DetPostResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    fn suppress_image(&self, boxes: &[f32], scores: &[f32]) -> Vec<Selection> {
        let cfg = &self.config;
        let k = boxes.len() / 4;
        let best = best_class_per_anchor(scores, k, cfg.num_classes);

        let mut merged: Vec<Selection> = Vec::with_capacity(cfg.post_nms_size);
        let mut pool: Vec<(BBox, f32)> = Vec::with_capacity(k);
        for class_id in 0..cfg.num_classes as i32 {
            pool.clear();
            pool.extend((0..k).filter_map(|a| {
                (best[a].0 == class_id && best[a].1 > cfg.score_threshold)
                    .then(|| (BBox::from_slice(&boxes[a * 4..a * 4 + 4]), best[a].1))
            }));

            let mut picked_in_class = 0;
            while !pool.is_empty() && picked_in_class < cfg.post_nms_size {
                let mut top = 0;
                for i in 1..pool.len() {
                    if pool[i].1 > pool[top].1 {
                        top = i;
                    }
                }
                let (selected, score) = pool.swap_remove(top);
                merged.push(Selection {
                    bbox: selected,
                    score,
                    class_id,
                });
                picked_in_class += 1;

                for (bbox, s) in pool.iter_mut() {
                    let iou = selected.iou(bbox);
                    if iou > 0.0 {
                        *s *= gaussian_decay(iou, cfg.soft_nms_sigma);
                    }
                }
                pool.retain(|&(_, s)| s > cfg.score_threshold);
            }
        }

        sort_selections_desc(&mut merged);
        merged
    }
}

impl NonMaxSuppression for SoftNms {
    fn suppress(&self, input: &ThresholdedBatch) -> DetPostResult<DetectionBatch> {
        run_batch(input, &self.config, |i| {
            self.suppress_image(input.image_boxes(i), input.image_scores(i))
        })
    }
}
