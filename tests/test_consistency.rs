extern crate yolox_postprocess;

use anyhow::{bail, Result};
use ndarray::{array, Array2};
use yolox_postprocess::common::{ImageGeometry, PostprocessConfig};
use yolox_postprocess::postprocess::{check_consistency, InferenceSource, DEFAULT_TOLERANCE};

/// Stand-in engine that returns a fixed tensor, optionally perturbed.
struct FixedEngine {
    name: &'static str,
    offset: f32,
    calls: usize,
}

impl FixedEngine {
    fn new(name: &'static str, offset: f32) -> Self {
        Self { name, offset, calls: 0 }
    }
}

impl InferenceSource for FixedEngine {
    type Input = Array2<f32>;

    fn name(&self) -> String {
        self.name.to_string()
    }

    fn inference(&mut self, x: &Self::Input) -> Result<Array2<f32>> {
        self.calls += 1;
        Ok(x.mapv(|v| v + self.offset))
    }
}

struct BrokenEngine;

impl InferenceSource for BrokenEngine {
    type Input = Array2<f32>;

    fn name(&self) -> String {
        "broken".to_string()
    }

    fn inference(&mut self, _: &Self::Input) -> Result<Array2<f32>> {
        bail!("session not initialized")
    }
}

fn input() -> Array2<f32> {
    array![
        [100., 100., 40., 40., 0.9, 0.95, 0.05],
        [400., 300., 100., 60., 0.8, 0.1, 0.9],
    ]
}

#[test]
fn identical_engines_agree() {
    let mut reference = FixedEngine::new("reference", 0.);
    let mut candidate = FixedEngine::new("export", 0.);
    let report = check_consistency(
        &mut reference,
        &mut candidate,
        &input(),
        &ImageGeometry::new(640, 640, 1.0),
        &PostprocessConfig::new(),
        DEFAULT_TOLERANCE,
    )
    .unwrap();

    assert!(report.is_consistent());
    assert_eq!(report.reference_name, "reference");
    assert_eq!(report.candidate_name, "export");
    assert_eq!(report.reference_detections.len(), 2);
    assert_eq!(report.detections.matched.len(), 2);
    assert_eq!(reference.calls, 1);
    assert_eq!(candidate.calls, 1);
}

#[test]
fn drifted_export_is_flagged() {
    let mut reference = FixedEngine::new("reference", 0.);
    let mut candidate = FixedEngine::new("export", 0.01);
    let report = check_consistency(
        &mut reference,
        &mut candidate,
        &input(),
        &ImageGeometry::new(640, 640, 1.0),
        &PostprocessConfig::new(),
        DEFAULT_TOLERANCE,
    )
    .unwrap();

    assert!(!report.outputs.consistent);
    assert!((report.outputs.mean_abs_diff - 0.01).abs() < 1e-4);
    // Boxes barely move, so the detections still line up.
    assert!(report.detections.is_consistent());
    assert!(!report.is_consistent());
}

#[test]
fn engine_failure_propagates() {
    let mut reference = FixedEngine::new("reference", 0.);
    let mut candidate = BrokenEngine;
    let err = check_consistency(
        &mut reference,
        &mut candidate,
        &input(),
        &ImageGeometry::new(640, 640, 1.0),
        &PostprocessConfig::new(),
        DEFAULT_TOLERANCE,
    )
    .unwrap_err();
    assert!(err.to_string().contains("session not initialized"));
}

#[test]
fn run_postprocesses_engine_output() {
    let mut engine = FixedEngine::new("reference", 0.);
    let config = PostprocessConfig::new();
    let output = engine
        .forward(&input(), &ImageGeometry::new(640, 640, 1.0), &config, true)
        .unwrap();
    assert_eq!(output.len(), 2);
    assert_eq!(output.detections()[0].class_id, 0);
    assert_eq!(output.detections()[1].class_id, 1);

    let again = engine.run(&input(), &ImageGeometry::new(640, 640, 1.0), &config).unwrap();
    assert_eq!(again.detections(), output.detections());
    assert_eq!(again.report(), output.report());
}
