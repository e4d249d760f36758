//! detpost turns dense anchor-based detector outputs into a small,
//! fixed-size set of detections per image.
//!
//! The pipeline is a pure, deterministic transform: anchor-lattice
//! generation, regression-delta decoding, score thresholding with top-K
//! pre-filtering, and one of four interchangeable non-maximum-suppression
//! strategies (standard per-class, fast, soft, combined). Per-image work
//! is optionally parallelized via the `rayon` feature; the `tracing`
//! feature adds spans around the pipeline stages.

pub mod anchor;
pub mod boxes;
mod candidate;
pub mod detect;
pub mod nms;
pub mod tensor;
mod trace;
pub mod util;

pub use anchor::AnchorConfig;
pub use boxes::decode::DeltaDecoder;
pub use boxes::BBox;
pub use candidate::{batch_threshold, ThresholdedBatch};
pub use detect::PostProcessor;
pub use nms::{
    CombinedNms, Detection, DetectionBatch, FastNms, NmsConfig, NmsKind, NmsStrategy,
    NonMaxSuppression, SoftNms, StandardNms,
};
pub use tensor::{BoxTensor, ScoreTensor};
pub use util::{DetPostError, DetPostResult};
