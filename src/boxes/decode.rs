//! Anchor-delta decoding into normalized corner boxes.

use super::BBox;

/// Decodes `(dy, dx, dh, dw)` regression deltas against anchor boxes.
///
/// Center offsets are relative to the anchor size; height and width are
/// log-scale. Optional per-channel mean/std undo the normalization applied
/// during training (identity when unset).
#[derive(Clone, Copy, Debug, Default)]
pub struct DeltaDecoder {
    pub mean: Option<[f32; 4]>,
    pub std: Option<[f32; 4]>,
}

impl DeltaDecoder {
    /// Decodes one anchor's deltas into an absolute-pixel corner box.
    pub fn decode(&self, anchor: &BBox, delta: &[f32]) -> BBox {
        let mut d = [delta[0], delta[1], delta[2], delta[3]];
        if let Some(std) = self.std {
            for (v, s) in d.iter_mut().zip(std) {
                *v *= s;
            }
        }
        if let Some(mean) = self.mean {
            for (v, m) in d.iter_mut().zip(mean) {
                *v += m;
            }
        }

        let ah = anchor.y2 - anchor.y1;
        let aw = anchor.x2 - anchor.x1;
        let acy = anchor.y1 + 0.5 * ah;
        let acx = anchor.x1 + 0.5 * aw;

        let cy = acy + d[0] * ah;
        let cx = acx + d[1] * aw;
        let h = ah * d[2].exp();
        let w = aw * d[3].exp();

        BBox {
            y1: cy - 0.5 * h,
            x1: cx - 0.5 * w,
            y2: cy + 0.5 * h,
            x2: cx + 0.5 * w,
        }
    }

    /// Decodes, divides by `(H, W, H, W)` and clamps to `[0, 1]`.
    pub fn decode_normalized(
        &self,
        anchor: &BBox,
        delta: &[f32],
        image_size: (usize, usize),
    ) -> BBox {
        let b = self.decode(anchor, delta);
        let h = image_size.0 as f32;
        let w = image_size.1 as f32;
        BBox {
            y1: (b.y1 / h).clamp(0.0, 1.0),
            x1: (b.x1 / w).clamp(0.0, 1.0),
            y2: (b.y2 / h).clamp(0.0, 1.0),
            x2: (b.x2 / w).clamp(0.0, 1.0),
        }
    }
}
