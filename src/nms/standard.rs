//! Greedy per-class non-maximum suppression.

use super::{
    best_class_per_anchor, run_batch, sort_selections_desc, DetectionBatch, NmsConfig,
    NonMaxSuppression, Selection,
};
use crate::boxes::BBox;
use crate::candidate::ThresholdedBatch;
use crate::util::math::score_desc_by_index;
use crate::util::DetPostResult;

/// Exact greedy suppression, one class at a time.
///
/// Each candidate competes only in its best class. Classes are walked as a
/// dense `0..num_classes` table (empty rows cost one skip); within a class
/// the highest-scored remaining box is selected and every remaining box
/// overlapping it beyond `iou_threshold` is removed. The per-class
/// selections are merged, fully sorted by descending score and truncated.
pub struct StandardNms {
    config: NmsConfig,
}

impl StandardNms {
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
        let mut order: Vec<usize> = Vec::with_capacity(k);
        for class_id in 0..cfg.num_classes as i32 {
            order.clear();
            order.extend(
                (0..k).filter(|&a| best[a].0 == class_id && best[a].1 > cfg.score_threshold),
            );
            if order.is_empty() {
                continue;
            }
            order.sort_by(|&a, &b| score_desc_by_index(best[a].1, a, best[b].1, b));

            let mut removed = vec![false; order.len()];
            let mut picked_in_class = 0;
            for i in 0..order.len() {
                if removed[i] {
                    continue;
                }
                let selected = BBox::from_slice(&boxes[order[i] * 4..order[i] * 4 + 4]);
                merged.push(Selection {
                    bbox: selected,
                    score: best[order[i]].1,
                    class_id,
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

impl NonMaxSuppression for StandardNms {
    fn suppress(&self, input: &ThresholdedBatch) -> DetPostResult<DetectionBatch> {
        run_batch(input, &self.config, |i| {
            self.suppress_image(input.image_boxes(i), input.image_scores(i))
        })
    }
}
