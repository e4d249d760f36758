//! Candidate pre-filtering between decoding and suppression.

mod threshold;

pub use threshold::{batch_threshold, ThresholdedBatch};
