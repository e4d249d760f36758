//! End-to-end post-processing pipeline.
//!
//! Wires anchor generation, delta decoding, score activation, thresholding
//! and the configured suppression strategy into one deterministic call.
//! The pipeline holds only immutable configuration; every call is a pure
//! function of its inputs.

use crate::anchor::AnchorConfig;
use crate::boxes::decode::DeltaDecoder;
use crate::candidate::batch_threshold;
use crate::nms::{DetectionBatch, NmsConfig, NmsKind, NmsStrategy, NonMaxSuppression};
use crate::tensor::{BoxTensor, ScoreTensor};
use crate::trace::{trace_event, trace_span};
use crate::util::math::sigmoid;
use crate::util::{DetPostError, DetPostResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Converts raw detector outputs into padded fixed-size detections.
pub struct PostProcessor {
    anchors: AnchorConfig,
    decoder: DeltaDecoder,
    config: NmsConfig,
    strategy: NmsStrategy,
}

impl PostProcessor {
    /// Creates a pipeline with the combined suppression strategy.
    pub fn new(anchors: AnchorConfig, config: NmsConfig) -> DetPostResult<Self> {
        Self::with_strategy(anchors, config, NmsKind::Combined)
    }

    /// Creates a pipeline with an explicit suppression strategy.
    pub fn with_strategy(
        anchors: AnchorConfig,
        config: NmsConfig,
        kind: NmsKind,
    ) -> DetPostResult<Self> {
        anchors.validate()?;
        let strategy = NmsStrategy::new(kind, config)?;
        Ok(Self {
            anchors,
            decoder: DeltaDecoder::default(),
            config,
            strategy,
        })
    }

    /// Replaces the identity delta decoder.
    pub fn with_decoder(mut self, decoder: DeltaDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Returns the suppression configuration.
    pub fn config(&self) -> &NmsConfig {
        &self.config
    }

    /// Runs the full pipeline on one batch of raw detector outputs.
    ///
    /// `deltas` are `[batch, anchors, 4]` regression offsets aligned with
    /// the anchor lattice for `image_size`; `logits` are pre-sigmoid class
    /// scores `[batch, anchors, num_classes]`. Anchors are regenerated per
    /// call, so the same pipeline serves any divisible image size.
    pub fn run(
        &self,
        deltas: BoxTensor<'_>,
        logits: ScoreTensor<'_>,
        image_size: (usize, usize),
    ) -> DetPostResult<DetectionBatch> {
        let _span = trace_span!("postprocess", batch = deltas.batch()).entered();

        if deltas.batch() != logits.batch() {
            return Err(DetPostError::ShapeMismatch {
                dim: "batch",
                expected: deltas.batch(),
                got: logits.batch(),
            });
        }
        if deltas.anchors() != logits.anchors() {
            return Err(DetPostError::ShapeMismatch {
                dim: "anchors",
                expected: deltas.anchors(),
                got: logits.anchors(),
            });
        }
        if logits.classes() != self.config.num_classes {
            return Err(DetPostError::ShapeMismatch {
                dim: "classes",
                expected: self.config.num_classes,
                got: logits.classes(),
            });
        }

        let anchors = self.anchors.generate(image_size)?;
        if anchors.len() != deltas.anchors() {
            return Err(DetPostError::AnchorCountMismatch {
                generated: anchors.len(),
                provided: deltas.anchors(),
            });
        }

        let batch = deltas.batch();
        let n = deltas.anchors();
        let classes = logits.classes();

        let decode_image = |i: usize| -> (Vec<f32>, Vec<f32>) {
            let delta_row = deltas.image(i);
            let mut decoded = Vec::with_capacity(n * 4);
            for (a, anchor) in anchors.iter().enumerate() {
                let bbox = self.decoder.decode_normalized(
                    anchor,
                    &delta_row[a * 4..a * 4 + 4],
                    image_size,
                );
                decoded.extend_from_slice(&[bbox.y1, bbox.x1, bbox.y2, bbox.x2]);
            }
            let probs = logits.image(i).iter().map(|&v| sigmoid(v)).collect();
            (decoded, probs)
        };

        #[cfg(feature = "rayon")]
        let images: Vec<(Vec<f32>, Vec<f32>)> = if self.config.parallel {
            (0..batch).into_par_iter().map(decode_image).collect()
        } else {
            (0..batch).map(decode_image).collect()
        };
        #[cfg(not(feature = "rayon"))]
        let images: Vec<(Vec<f32>, Vec<f32>)> = (0..batch).map(decode_image).collect();

        let mut decoded = Vec::with_capacity(batch * n * 4);
        let mut probs = Vec::with_capacity(batch * n * classes);
        for (b, p) in images {
            decoded.extend_from_slice(&b);
            probs.extend_from_slice(&p);
        }
        trace_event!("decoded", batch = batch, anchors = n);

        let boxes = BoxTensor::new(&decoded, batch, n)?;
        let scores = ScoreTensor::new(&probs, batch, n, classes)?;
        let thresholded = batch_threshold(boxes, scores, &self.config)?;
        self.strategy.suppress(&thresholded)
    }
}
