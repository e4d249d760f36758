//! Error types for detpost.

use thiserror::Error;

/// Result alias for detpost operations.
pub type DetPostResult<T> = std::result::Result<T, DetPostError>;

/// Errors that can occur when configuring or running the pipeline.
///
/// All variants are detected before any geometric work starts; a call
/// either fails up front or completes deterministically.
#[derive(Debug, Error, PartialEq)]
pub enum DetPostError {
    /// A configuration value is outside its allowed range.
    #[error("invalid config: {name} = {value} ({constraint})")]
    InvalidConfig {
        name: &'static str,
        value: f64,
        constraint: &'static str,
    },
    /// A tensor buffer is shorter than its declared shape requires.
    #[error("buffer too small: needed {needed} elements, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// A tensor dimension is zero or overflows.
    #[error("invalid dimensions: batch = {batch}, anchors = {anchors}")]
    InvalidDimensions { batch: usize, anchors: usize },
    /// Two inputs disagree on a shared dimension.
    #[error("shape mismatch on {dim}: expected {expected}, got {got}")]
    ShapeMismatch {
        dim: &'static str,
        expected: usize,
        got: usize,
    },
    /// The input image size is not divisible by a pyramid stride.
    #[error("image size {height}x{width} is not divisible by stride {stride}")]
    ImageSizeNotDivisible {
        height: usize,
        width: usize,
        stride: usize,
    },
    /// The anchor lattice for the image size does not match the inputs.
    #[error("anchor count mismatch: lattice has {generated}, inputs carry {provided}")]
    AnchorCountMismatch { generated: usize, provided: usize },
}
