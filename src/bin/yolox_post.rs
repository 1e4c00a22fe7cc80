//! yolox-post: decode, filter and suppress exported YOLOX detection tensors, and check that two
//! exports of the same model agree.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use yolox_postprocess::common::{ClassLabels, HeadDecode, ImageGeometry, PostprocessConfig};
use yolox_postprocess::data::{tensor_io, TensorStats};
use yolox_postprocess::postprocess::{
    compare_detections, compare_outputs, postprocess, DEFAULT_MATCH_IOU, DEFAULT_TOLERANCE,
};

#[derive(Parser)]
#[command(name = "yolox-post")]
#[command(about = "Post-process YOLOX detection tensors and compare exported models")]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a tensor into final detections.
    Detect {
        /// Detection tensor (.npy or .json), shape (N, 5+C) or (1, N, 5+C).
        #[arg(long)]
        tensor: PathBuf,

        /// Write detections as JSON.
        #[arg(long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        geometry: GeometryArgs,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Print value ranges and top-scoring anchors of a tensor.
    Stats {
        #[arg(long)]
        tensor: PathBuf,

        /// Anchors to list per class.
        #[arg(long, default_value = "5")]
        top_k: usize,

        /// Text file with one class name per line.
        #[arg(long)]
        labels: Option<PathBuf>,
    },

    /// Compare the output of a reference model with an exported one.
    Compare {
        #[arg(long)]
        reference: PathBuf,

        #[arg(long)]
        candidate: PathBuf,

        /// Mean absolute difference below which the raw outputs are consistent.
        #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
        tolerance: f32,

        /// Minimum IoU for two detections to be considered the same object.
        #[arg(long, default_value_t = DEFAULT_MATCH_IOU)]
        match_iou: f32,

        #[command(flatten)]
        geometry: GeometryArgs,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Debug, Clone, Args)]
struct GeometryArgs {
    /// Original image width in pixels.
    #[arg(long)]
    image_width: u32,

    /// Original image height in pixels.
    #[arg(long)]
    image_height: u32,

    /// Resize ratio used in preprocessing; derived from the input size when omitted.
    #[arg(long)]
    ratio: Option<f32>,

    /// The image was centred in the model input rather than placed top-left.
    #[arg(long)]
    centered: bool,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    /// JSON post-processing config; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Text file with one class name per line.
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Default confidence threshold.
    #[arg(long)]
    conf: Option<f32>,

    /// Per-class threshold as CLASS=THRESHOLD, e.g. 1=0.25. Repeatable.
    #[arg(long, value_parser = parse_class_conf)]
    class_conf: Vec<(usize, f32)>,

    /// IoU threshold for NMS.
    #[arg(long)]
    iou: Option<f32>,

    /// Suppress across classes.
    #[arg(long)]
    class_agnostic: bool,

    /// Only consider anchors with objectness above this value.
    #[arg(long)]
    min_objectness: Option<f32>,

    #[arg(long)]
    input_width: Option<u32>,

    #[arg(long)]
    input_height: Option<u32>,

    /// The tensor holds raw grid offsets (model exported without in-graph decoding).
    #[arg(long)]
    raw_head: bool,

    /// Replacement magnitude for infinite tensor values.
    #[arg(long)]
    sentinel: Option<f32>,
}

fn parse_class_conf(s: &str) -> Result<(usize, f32), String> {
    let (id, t) = s
        .split_once('=')
        .ok_or_else(|| format!("expected CLASS=THRESHOLD, got '{}'", s))?;
    let id = id.trim().parse::<usize>().map_err(|e| format!("bad class index '{}': {}", id, e))?;
    let t = t.trim().parse::<f32>().map_err(|e| format!("bad threshold '{}': {}", t, e))?;
    Ok((id, t))
}

fn read_labels(path: &PathBuf) -> Result<ClassLabels> {
    let names = yolox_postprocess::file_to_vec(path)
        .with_context(|| format!("Failed to read labels from {}", path.display()))?;
    Ok(ClassLabels::from_vec(names))
}

fn build_config(args: &ConfigArgs) -> Result<PostprocessConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => PostprocessConfig::new(),
    };

    if let Some(path) = &args.labels {
        config = config.with_labels(read_labels(path)?);
    }
    if let Some(conf) = args.conf {
        config = config.with_conf(conf);
    }
    for &(class_id, threshold) in &args.class_conf {
        config = config.with_class_conf(class_id, threshold);
    }
    if let Some(iou) = args.iou {
        config = config.with_iou(iou);
    }
    if args.class_agnostic {
        config = config.with_class_agnostic(true);
    }
    if let Some(gate) = args.min_objectness {
        config = config.with_min_objectness(gate);
    }
    let width = args.input_width.unwrap_or(config.input_width);
    let height = args.input_height.unwrap_or(config.input_height);
    config = config.with_input_size(width, height);
    if args.raw_head {
        config = config.with_head_decode(HeadDecode::raw());
    }
    if let Some(sentinel) = args.sentinel {
        config = config.with_sentinel(sentinel);
    }

    config.validate()?;
    Ok(config)
}

fn build_geometry(args: &GeometryArgs, config: &PostprocessConfig) -> ImageGeometry {
    match args.ratio {
        Some(ratio) => ImageGeometry::new(args.image_width, args.image_height, ratio),
        None if args.centered => ImageGeometry::centered(
            config.input_width, config.input_height, args.image_width, args.image_height,
        ),
        None => ImageGeometry::letterbox(
            config.input_width, config.input_height, args.image_width, args.image_height,
        ),
    }
}

fn detect(tensor: PathBuf, out: Option<PathBuf>, geometry: GeometryArgs, config: ConfigArgs) -> Result<()> {
    let config = build_config(&config)?;
    let geometry = build_geometry(&geometry, &config);
    log::info!("Post-processing config:\n{}", config);
    log::info!("Ratio used: {}", geometry.ratio);

    let tensor = tensor_io::read_tensor(&tensor)?;
    let output = postprocess(tensor.view(), &geometry, &config)?;
    log::info!("{}", output.report().summary());
    log::info!("{}", output.timings().summary());

    if output.is_empty() {
        println!("No detections");
    } else {
        println!("Final detections:");
        for det in output.detections() {
            println!("  {}", det.describe());
        }
        let summary = output.summary(&config.names);
        let counts: Vec<String> = summary.per_class.iter().map(|(name, n)| format!("{} {}", n, name)).collect();
        println!("Found {} detections ({})", summary.total, counts.join(", "));
    }

    if let Some(path) = out {
        let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, output.detections())?;
        println!("Detections written to: {}", path.display());
    }
    Ok(())
}

fn stats(tensor: PathBuf, top_k: usize, labels: Option<PathBuf>) -> Result<()> {
    let labels = match labels {
        Some(path) => read_labels(&path)?,
        None => ClassLabels::default(),
    };
    let tensor = tensor_io::read_tensor(&tensor)?;
    let stats = TensorStats::from_tensor(tensor.view(), labels.len(), top_k)?;
    print!("{}", stats.describe(&labels));
    Ok(())
}

fn compare(
    reference: PathBuf,
    candidate: PathBuf,
    tolerance: f32,
    match_iou: f32,
    geometry: GeometryArgs,
    config: ConfigArgs,
) -> Result<()> {
    let config = build_config(&config)?;
    let geometry = build_geometry(&geometry, &config);

    let ref_tensor = tensor_io::read_tensor(&reference)?;
    let cand_tensor = tensor_io::read_tensor(&candidate)?;

    let outputs = compare_outputs(ref_tensor.view(), cand_tensor.view(), tolerance)?;
    println!("Mean abs diff: {:.6}", outputs.mean_abs_diff);
    println!("Max abs diff: {:.6} at {:?}", outputs.max_abs_diff, outputs.max_diff_index);
    if outputs.consistent {
        println!("Raw outputs are consistent (tolerance {})", tolerance);
    } else {
        println!("Raw outputs differ significantly (tolerance {})", tolerance);
    }

    let ref_dets = postprocess(ref_tensor.view(), &geometry, &config)?.into_detections();
    let cand_dets = postprocess(cand_tensor.view(), &geometry, &config)?.into_detections();
    let dets = compare_detections(&ref_dets, &cand_dets, match_iou);

    println!(
        "Detections: reference={}, candidate={}, matched={}",
        ref_dets.len(), cand_dets.len(), dets.matched.len()
    );
    if let Some(min_iou) = dets.min_iou() {
        println!("Lowest matched IoU: {:.3}, largest score delta: {:.4}", min_iou, dets.max_score_delta());
    }
    for m in &dets.matched {
        println!(
            "  {}: iou={:.3}, score delta={:+.4}",
            config.names.name(m.class_id), m.iou, m.score_delta
        );
    }
    for &i in &dets.unmatched_reference {
        println!("  only in reference: {}", ref_dets[i].describe());
    }
    for &j in &dets.unmatched_candidate {
        println!("  only in candidate: {}", cand_dets[j].describe());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match cli.command {
        Commands::Detect { tensor, out, geometry, config } => detect(tensor, out, geometry, config),
        Commands::Stats { tensor, top_k, labels } => stats(tensor, top_k, labels),
        Commands::Compare { reference, candidate, tolerance, match_iou, geometry, config } => {
            compare(reference, candidate, tolerance, match_iou, geometry, config)
        }
    }
}
