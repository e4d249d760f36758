//! Anchor lattice generation over a feature pyramid.
//!
//! Each pyramid level `l` has stride `2^l` and one anchor per
//! `(grid cell, octave scale, aspect ratio)` combination. Levels are
//! concatenated in order into one flat sequence that matches the detector's
//! output layout anchor for anchor.

use crate::boxes::BBox;
use crate::util::{DetPostError, DetPostResult};

/// Largest accepted pyramid level; keeps `2^level` strides addressable.
const MAX_PYRAMID_LEVEL: u32 = 31;

/// Anchor lattice configuration for a pyramid level range.
///
/// The defaults are the standard single-stage setup: levels 3..=7, three
/// octave scales per level and aspect ratios 1:1, 1.4:0.7 and 0.7:1.4.
#[derive(Clone, Debug)]
pub struct AnchorConfig {
    pub min_level: u32,
    pub max_level: u32,
    /// Intermediate octave scales per level (`2^(i / num_scales)`).
    pub num_scales: usize,
    /// Base anchor size as a multiple of the level stride.
    pub anchor_scale: f32,
    /// `(width, height)` multipliers, one anchor shape each.
    pub aspect_ratios: Vec<(f32, f32)>,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            min_level: 3,
            max_level: 7,
            num_scales: 3,
            anchor_scale: 4.0,
            aspect_ratios: vec![(1.0, 1.0), (1.4, 0.7), (0.7, 1.4)],
        }
    }
}

impl AnchorConfig {
    /// Rejects degenerate level ranges and empty scale/aspect sets.
    pub fn validate(&self) -> DetPostResult<()> {
        if self.min_level > self.max_level {
            return Err(DetPostError::InvalidConfig {
                name: "min_level",
                value: self.min_level as f64,
                constraint: "must not exceed max_level",
            });
        }
        if self.max_level > MAX_PYRAMID_LEVEL {
            return Err(DetPostError::InvalidConfig {
                name: "max_level",
                value: self.max_level as f64,
                constraint: "must not exceed 31",
            });
        }
        if self.num_scales == 0 {
            return Err(DetPostError::InvalidConfig {
                name: "num_scales",
                value: 0.0,
                constraint: "must be positive",
            });
        }
        if self.aspect_ratios.is_empty() {
            return Err(DetPostError::InvalidConfig {
                name: "aspect_ratios",
                value: 0.0,
                constraint: "must not be empty",
            });
        }
        if !(self.anchor_scale > 0.0) {
            return Err(DetPostError::InvalidConfig {
                name: "anchor_scale",
                value: self.anchor_scale as f64,
                constraint: "must be positive",
            });
        }
        Ok(())
    }

    /// Anchors per grid cell.
    pub fn anchors_per_cell(&self) -> usize {
        self.num_scales * self.aspect_ratios.len()
    }

    /// Total anchor count for `image_size`, all levels concatenated.
    pub fn total_anchors(&self, image_size: (usize, usize)) -> DetPostResult<usize> {
        let mut total = 0;
        for level in self.min_level..=self.max_level {
            let (grid_h, grid_w) = grid_size(image_size, 1usize << level)?;
            total += grid_h * grid_w * self.anchors_per_cell();
        }
        Ok(total)
    }

    /// Generates the anchor lattice for `image_size` in level order.
    ///
    /// Within a level the order is cell-major (row, then column) with the
    /// `(octave, aspect)` combinations innermost. Fails if either image
    /// dimension is not divisible by every level stride.
    pub fn generate(&self, image_size: (usize, usize)) -> DetPostResult<Vec<BBox>> {
        self.validate()?;
        let mut anchors = Vec::with_capacity(self.total_anchors(image_size)?);
        for level in self.min_level..=self.max_level {
            let stride = 1usize << level;
            let (grid_h, grid_w) = grid_size(image_size, stride)?;
            let sf = stride as f32;
            for r in 0..grid_h {
                let cy = sf / 2.0 + r as f32 * sf;
                for c in 0..grid_w {
                    let cx = sf / 2.0 + c as f32 * sf;
                    for octave in 0..self.num_scales {
                        let size = self.anchor_scale
                            * sf
                            * 2f32.powf(octave as f32 / self.num_scales as f32);
                        for &(aw, ah) in &self.aspect_ratios {
                            let half_h = size * ah / 2.0;
                            let half_w = size * aw / 2.0;
                            anchors.push(BBox {
                                y1: cy - half_h,
                                x1: cx - half_w,
                                y2: cy + half_h,
                                x2: cx + half_w,
                            });
                        }
                    }
                }
            }
        }
        Ok(anchors)
    }
}

fn grid_size(image_size: (usize, usize), stride: usize) -> DetPostResult<(usize, usize)> {
    let (h, w) = image_size;
    if h == 0 || w == 0 || h % stride != 0 || w % stride != 0 {
        return Err(DetPostError::ImageSizeNotDivisible {
            height: h,
            width: w,
            stride,
        });
    }
    Ok((h / stride, w / stride))
}
