//! Borrowed tensor views over flat buffers.
//!
//! Detector outputs arrive as flat `f32` slices with explicit dimensions.
//! The views validate buffer lengths at construction and hand out per-image
//! row slices; nothing is copied.

use crate::util::{DetPostError, DetPostResult};

/// Borrowed `[batch, anchors, 4]` tensor of box rows.
///
/// Depending on the pipeline stage the rows hold raw regression deltas
/// `(dy, dx, dh, dw)` or decoded corner boxes `(y1, x1, y2, x2)`.
#[derive(Copy, Clone)]
pub struct BoxTensor<'a> {
    data: &'a [f32],
    batch: usize,
    anchors: usize,
}

impl<'a> BoxTensor<'a> {
    /// Creates a view, checking the buffer against the declared shape.
    pub fn new(data: &'a [f32], batch: usize, anchors: usize) -> DetPostResult<Self> {
        let needed = checked_len(batch, anchors, 4)?;
        if data.len() < needed {
            return Err(DetPostError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            batch,
            anchors,
        })
    }

    /// Returns the batch size.
    pub fn batch(&self) -> usize {
        self.batch
    }

    /// Returns the per-image anchor count.
    pub fn anchors(&self) -> usize {
        self.anchors
    }

    /// Returns the `anchors * 4` row slice for image `i`.
    ///
    /// Panics if `i >= batch`.
    pub fn image(&self, i: usize) -> &'a [f32] {
        let row = self.anchors * 4;
        &self.data[i * row..(i + 1) * row]
    }
}

/// Borrowed `[batch, anchors, classes]` tensor of per-class scores.
#[derive(Copy, Clone)]
pub struct ScoreTensor<'a> {
    data: &'a [f32],
    batch: usize,
    anchors: usize,
    classes: usize,
}

impl<'a> ScoreTensor<'a> {
    /// Creates a view, checking the buffer against the declared shape.
    pub fn new(
        data: &'a [f32],
        batch: usize,
        anchors: usize,
        classes: usize,
    ) -> DetPostResult<Self> {
        let needed = checked_len(batch, anchors, classes)?;
        if data.len() < needed {
            return Err(DetPostError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            batch,
            anchors,
            classes,
        })
    }

    /// Returns the batch size.
    pub fn batch(&self) -> usize {
        self.batch
    }

    /// Returns the per-image anchor count.
    pub fn anchors(&self) -> usize {
        self.anchors
    }

    /// Returns the number of classes per anchor.
    pub fn classes(&self) -> usize {
        self.classes
    }

    /// Returns the `anchors * classes` row slice for image `i`.
    ///
    /// Panics if `i >= batch`.
    pub fn image(&self, i: usize) -> &'a [f32] {
        let row = self.anchors * self.classes;
        &self.data[i * row..(i + 1) * row]
    }
}

fn checked_len(batch: usize, anchors: usize, inner: usize) -> DetPostResult<usize> {
    if batch == 0 || anchors == 0 || inner == 0 {
        return Err(DetPostError::InvalidDimensions { batch, anchors });
    }
    batch
        .checked_mul(anchors)
        .and_then(|v| v.checked_mul(inner))
        .ok_or(DetPostError::InvalidDimensions { batch, anchors })
}
