//! Box geometry: corner boxes, areas and pairwise overlap.

pub mod decode;

/// Corner-parameterized box `(y1, x1, y2, x2)`.
///
/// Decoded boxes are normalized to `[0, 1]` relative to the image size.
/// Degenerate boxes (`y1 == y2` or `x1 == x2`) are valid and carry zero
/// area.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BBox {
    pub y1: f32,
    pub x1: f32,
    pub y2: f32,
    pub x2: f32,
}

impl BBox {
    /// Reads a box from a 4-element `(y1, x1, y2, x2)` slice.
    pub fn from_slice(v: &[f32]) -> Self {
        Self {
            y1: v[0],
            x1: v[1],
            y2: v[2],
            x2: v[3],
        }
    }

    /// Writes the box into a 4-element slice.
    pub fn write_to(&self, out: &mut [f32]) {
        out[0] = self.y1;
        out[1] = self.x1;
        out[2] = self.y2;
        out[3] = self.x2;
    }

    /// Box area; zero for degenerate or inverted boxes.
    pub fn area(&self) -> f32 {
        (self.y2 - self.y1).max(0.0) * (self.x2 - self.x1).max(0.0)
    }

    /// Intersection-over-union with `other`.
    ///
    /// Defined as 0 when the union has zero area, so degenerate boxes never
    /// produce NaN.
    pub fn iou(&self, other: &BBox) -> f32 {
        let iy1 = self.y1.max(other.y1);
        let ix1 = self.x1.max(other.x1);
        let iy2 = self.y2.min(other.y2);
        let ix2 = self.x2.min(other.x2);
        let inter = (iy2 - iy1).max(0.0) * (ix2 - ix1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }
}
