//! Integration tests validating the suppression strategies against
//! JSON-described cases.
//!
//! Each case pins the full output contract for one strategy: the survivor
//! boxes, scores and classes in order, plus the padding past `valid`.

use detpost::{NmsConfig, NmsKind, NmsStrategy, NonMaxSuppression, ThresholdedBatch};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Strategy selector as written in the case file.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum StrategyConfig {
    Standard,
    Fast,
    Soft,
    Combined,
}

impl From<StrategyConfig> for NmsKind {
    fn from(value: StrategyConfig) -> Self {
        match value {
            StrategyConfig::Standard => NmsKind::Standard,
            StrategyConfig::Fast => NmsKind::Fast,
            StrategyConfig::Soft => NmsKind::Soft,
            StrategyConfig::Combined => NmsKind::Combined,
        }
    }
}

/// Suppression parameters for one case; omitted fields keep the defaults.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct CaseConfig {
    iou_threshold: f32,
    score_threshold: f32,
    post_nms_size: usize,
    num_classes: usize,
    soft_nms_sigma: f32,
}

impl Default for CaseConfig {
    fn default() -> Self {
        let cfg = NmsConfig::default();
        Self {
            iou_threshold: cfg.iou_threshold,
            score_threshold: cfg.score_threshold,
            post_nms_size: cfg.post_nms_size,
            num_classes: cfg.num_classes,
            soft_nms_sigma: cfg.soft_nms_sigma,
        }
    }
}

/// Expected output for one case, survivors only.
#[derive(Debug, Deserialize)]
struct Expected {
    valid: usize,
    boxes: Vec<[f32; 4]>,
    scores: Vec<f32>,
    classes: Vec<i32>,
}

/// One suppression case: a single-image candidate set plus the expected
/// detections.
#[derive(Debug, Deserialize)]
struct Case {
    case_id: String,
    strategy: StrategyConfig,
    config: CaseConfig,
    /// `[k, 4]` candidate boxes.
    boxes: Vec<[f32; 4]>,
    /// `[k, num_classes]` candidate scores.
    scores: Vec<Vec<f32>>,
    expected: Expected,
}

/// Case file structure.
#[derive(Debug, Deserialize)]
struct CaseFile {
    cases: Vec<Case>,
}

/// Returns the path to the bundled case file.
fn cases_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("validation_cases/nms_cases.json")
}

/// Runs a single case end to end.
fn run_case(case: &Case) -> Result<(), String> {
    let config = NmsConfig {
        iou_threshold: case.config.iou_threshold,
        score_threshold: case.config.score_threshold,
        post_nms_size: case.config.post_nms_size,
        num_classes: case.config.num_classes,
        soft_nms_sigma: case.config.soft_nms_sigma,
        ..NmsConfig::default()
    };

    let k = case.boxes.len();
    if case.scores.len() != k {
        return Err(format!("{} score rows for {} boxes", case.scores.len(), k));
    }
    let flat_boxes: Vec<f32> = case.boxes.iter().flatten().copied().collect();
    let flat_scores: Vec<f32> = case.scores.iter().flatten().copied().collect();
    let input = ThresholdedBatch::from_parts(flat_boxes, flat_scores, 1, k, config.num_classes)
        .map_err(|e| format!("invalid input: {e}"))?;

    let strategy = NmsStrategy::new(case.strategy.into(), config)
        .map_err(|e| format!("invalid config: {e}"))?;
    let out = strategy
        .suppress(&input)
        .map_err(|e| format!("suppression failed: {e}"))?;

    let expected = &case.expected;
    if expected.boxes.len() != expected.valid
        || expected.scores.len() != expected.valid
        || expected.classes.len() != expected.valid
    {
        return Err("expected arrays must all have `valid` entries".to_string());
    }
    if out.valid(0) != expected.valid {
        return Err(format!(
            "valid {} (expected {})",
            out.valid(0),
            expected.valid
        ));
    }

    for (slot, bbox) in expected.boxes.iter().enumerate() {
        let got = &out.boxes(0)[slot * 4..slot * 4 + 4];
        if got != &bbox[..] {
            return Err(format!("box {}: {:?} (expected {:?})", slot, got, bbox));
        }
    }
    if out.scores(0)[..expected.valid] != expected.scores[..] {
        return Err(format!(
            "scores {:?} (expected {:?})",
            &out.scores(0)[..expected.valid],
            expected.scores
        ));
    }
    if out.classes(0)[..expected.valid] != expected.classes[..] {
        return Err(format!(
            "classes {:?} (expected {:?})",
            &out.classes(0)[..expected.valid],
            expected.classes
        ));
    }

    // Padding contract past `valid`.
    for slot in expected.valid..out.capacity() {
        if out.classes(0)[slot] != -1 || out.scores(0)[slot] != 0.0 {
            return Err(format!("slot {} is not padding", slot));
        }
        if out.boxes(0)[slot * 4..slot * 4 + 4] != [0.0; 4] {
            return Err(format!("slot {} box is not zeroed", slot));
        }
    }

    Ok(())
}

#[test]
fn json_cases_pin_the_output_contract() {
    let text = fs::read_to_string(cases_path()).expect("Failed to read nms_cases.json");
    let file: CaseFile = serde_json::from_str(&text).expect("Failed to parse nms_cases.json");
    assert!(!file.cases.is_empty());

    let mut failures: Vec<(String, String)> = vec![];
    for case in &file.cases {
        match run_case(case) {
            Ok(()) => println!("PASS: {}", case.case_id),
            Err(e) => {
                println!("FAIL: {} - {}", case.case_id, e);
                failures.push((case.case_id.clone(), e));
            }
        }
    }

    if !failures.is_empty() {
        panic!("{} of {} cases failed", failures.len(), file.cases.len());
    }
}
