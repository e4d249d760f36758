use clap::Parser;
use detpost::{
    batch_threshold, BoxTensor, NmsConfig, NmsKind, NmsStrategy, NonMaxSuppression, ScoreTensor,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "detpost CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
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

#[derive(Debug, Deserialize)]
#[serde(default)]
struct NmsConfigJson {
    iou_threshold: f32,
    score_threshold: f32,
    pre_nms_size: usize,
    post_nms_size: usize,
    num_classes: usize,
    soft_nms_sigma: f32,
    parallel: bool,
}

impl Default for NmsConfigJson {
    fn default() -> Self {
        let cfg = NmsConfig::default();
        Self {
            iou_threshold: cfg.iou_threshold,
            score_threshold: cfg.score_threshold,
            pre_nms_size: cfg.pre_nms_size,
            post_nms_size: cfg.post_nms_size,
            num_classes: cfg.num_classes,
            soft_nms_sigma: cfg.soft_nms_sigma,
            parallel: cfg.parallel,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    input_path: String,
    output_path: Option<String>,
    strategy: StrategyConfig,
    nms: NmsConfigJson,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: String::new(),
            output_path: None,
            strategy: StrategyConfig::Combined,
            nms: NmsConfigJson::default(),
        }
    }
}

/// One image of decoded, normalized candidate boxes with per-class scores.
#[derive(Debug, Deserialize)]
struct Candidates {
    boxes: Vec<[f32; 4]>,
    scores: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct DetectionRecord {
    bbox: [f32; 4],
    score: f32,
    class_id: i32,
}

#[derive(Debug, Serialize)]
struct Output {
    valid_detections: usize,
    detections: Vec<DetectionRecord>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("detpost=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.input_path.is_empty() {
        return Err("input_path must be set in the config".into());
    }

    let nms_config = NmsConfig {
        iou_threshold: config.nms.iou_threshold,
        score_threshold: config.nms.score_threshold,
        pre_nms_size: config.nms.pre_nms_size,
        post_nms_size: config.nms.post_nms_size,
        num_classes: config.nms.num_classes,
        soft_nms_sigma: config.nms.soft_nms_sigma,
        parallel: config.nms.parallel,
    };
    let strategy = NmsStrategy::new(config.strategy.into(), nms_config)?;

    let input_text = fs::read_to_string(&config.input_path)?;
    let candidates: Candidates = serde_json::from_str(&input_text)?;
    if candidates.boxes.len() != candidates.scores.len() {
        return Err("boxes and scores must have the same length".into());
    }
    let anchors = candidates.boxes.len();
    let classes = nms_config.num_classes;
    let boxes_buf: Vec<f32> = candidates.boxes.iter().flatten().copied().collect();
    let mut scores_buf = Vec::with_capacity(anchors * classes);
    for row in &candidates.scores {
        if row.len() != classes {
            return Err("every score row must have num_classes entries".into());
        }
        scores_buf.extend_from_slice(row);
    }

    let boxes = BoxTensor::new(&boxes_buf, 1, anchors)?;
    let scores = ScoreTensor::new(&scores_buf, 1, anchors, classes)?;
    let thresholded = batch_threshold(boxes, scores, &nms_config)?;
    let result = strategy.suppress(&thresholded)?;

    let detections = result
        .detections(0)
        .map(|d| DetectionRecord {
            bbox: [d.bbox.y1, d.bbox.x1, d.bbox.y2, d.bbox.x2],
            score: d.score,
            class_id: d.class_id,
        })
        .collect();
    let output = Output {
        valid_detections: result.valid(0),
        detections,
    };
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
