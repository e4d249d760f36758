//! Vectorizable "parallel" non-maximum suppression.

use super::{run_batch, DetectionBatch, NmsConfig, NonMaxSuppression, Selection};
use crate::boxes::BBox;
use crate::candidate::ThresholdedBatch;
use crate::util::math::score_desc_by_index;
use crate::util::DetPostResult;

/// Suppression without the greedy chain.
///
/// Each class row is sorted by descending score and every box is compared
/// against all higher-scored boxes of the same class; a box is kept iff its
/// maximum overlap with those is below `iou_threshold` and its own score
/// passes the gate. Suppression decisions are independent, so a box that is
/// itself suppressed still suppresses lower-scored boxes. This trades the
/// exact greedy semantics for a loop with no data-dependent control flow.
///
/// Survivors are emitted class-major (within a class by descending score),
/// then truncated to `post_nms_size`.
pub struct FastNms {
    config: NmsConfig,
}

impl FastNms {
    /// Creates the strategy after validating `config`.
    pub fn new(config: NmsConfig) -> DetPostResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    fn suppress_image(&self, boxes: &[f32], scores: &[f32]) -> Vec<Selection> {
        let cfg = &self.config;
        let k = boxes.len() / 4;
        let classes = cfg.num_classes;

        let mut picked: Vec<Selection> = Vec::with_capacity(cfg.post_nms_size);
        let mut order: Vec<usize> = Vec::with_capacity(k);
        let mut row_boxes: Vec<BBox> = Vec::with_capacity(k);
        let mut max_with_higher: Vec<f32> = Vec::with_capacity(k);

        for class_id in 0..classes {
            order.clear();
            order.extend(0..k);
            order.sort_by(|&a, &b| {
                let (sa, sb) = (scores[a * classes + class_id], scores[b * classes + class_id]);
                score_desc_by_index(sa, a, sb, b)
            });

            // Sorted descending, so the gated candidates form a prefix. A
            // zero-scored box sorts below every gated one and can never be
            // the higher-scored side of a comparison that matters.
            let gated = order
                .iter()
                .take_while(|&&a| scores[a * classes + class_id] > cfg.score_threshold)
                .count();
            if gated == 0 {
                continue;
            }

            row_boxes.clear();
            row_boxes.extend(
                order[..gated]
                    .iter()
                    .map(|&a| BBox::from_slice(&boxes[a * 4..a * 4 + 4])),
            );

            max_with_higher.clear();
            max_with_higher.resize(gated, 0.0);
            for hi in 0..gated {
                for lo in hi + 1..gated {
                    let iou = row_boxes[hi].iou(&row_boxes[lo]);
                    if iou > max_with_higher[lo] {
                        max_with_higher[lo] = iou;
                    }
                }
            }

            for rank in 0..gated {
                if max_with_higher[rank] < cfg.iou_threshold {
                    picked.push(Selection {
                        bbox: row_boxes[rank],
                        score: scores[order[rank] * classes + class_id],
                        class_id: class_id as i32,
                    });
                }
            }
        }

        picked
    }
}

impl NonMaxSuppression for FastNms {
    fn suppress(&self, input: &ThresholdedBatch) -> DetPostResult<DetectionBatch> {
        run_batch(input, &self.config, |i| {
            self.suppress_image(input.image_boxes(i), input.image_scores(i))
        })
    }
}
