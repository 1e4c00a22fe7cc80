use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use crate::common::{Detection, ImageGeometry, PostprocessConfig, DEFAULT_SENTINEL};
use crate::error::PostprocessError;
use crate::postprocess::decoder::sanitize;
use crate::postprocess::inference_source::InferenceSource;
use crate::postprocess::nms::Nms;

pub const DEFAULT_TOLERANCE: f32 = 1e-3;
pub const DEFAULT_MATCH_IOU: f32 = 0.5;

/// Element-wise comparison of two raw detection tensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputComparison {
    pub shape: Vec<usize>,
    pub elements: usize,
    pub mean_abs_diff: f32,
    pub max_abs_diff: f32,
    /// `(row, column)` of the largest difference.
    pub max_diff_index: Option<(usize, usize)>,
    pub tolerance: f32,
    pub consistent: bool,
}

/// Compares two tensors of identical shape. Non-finite values are sanitized first.
///
/// The outputs are consistent when the mean absolute difference is below `tolerance`.
pub fn compare_outputs(
    reference: ArrayView2<f32>,
    candidate: ArrayView2<f32>,
    tolerance: f32,
) -> Result<OutputComparison, PostprocessError> {
    if reference.shape() != candidate.shape() {
        return Err(PostprocessError::ShapeMismatch {
            reference: reference.shape().to_vec(),
            candidate: candidate.shape().to_vec(),
        });
    }

    let (reference, _) = sanitize(reference, DEFAULT_SENTINEL);
    let (candidate, _) = sanitize(candidate, DEFAULT_SENTINEL);

    let mut sum = 0f64;
    let mut max_abs_diff = 0f32;
    let mut max_diff_index = None;
    for ((idx, a), b) in reference.indexed_iter().zip(candidate.iter()) {
        let diff = (a - b).abs();
        sum += diff as f64;
        if max_diff_index.is_none() || diff > max_abs_diff {
            max_abs_diff = diff;
            max_diff_index = Some(idx);
        }
    }

    let elements = reference.len();
    let mean_abs_diff = if elements > 0 { (sum / elements as f64) as f32 } else { 0. };

    Ok(OutputComparison {
        shape: reference.shape().to_vec(),
        elements,
        mean_abs_diff,
        max_abs_diff,
        max_diff_index,
        tolerance,
        consistent: mean_abs_diff < tolerance,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub reference: usize,
    pub candidate: usize,
    pub class_id: usize,
    pub iou: f32,
    /// `candidate.score - reference.score`.
    pub score_delta: f32,
}

/// One-to-one matching of two detection sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionComparison {
    pub matched: Vec<MatchedPair>,
    pub unmatched_reference: Vec<usize>,
    pub unmatched_candidate: Vec<usize>,
}

impl DetectionComparison {
    pub fn is_consistent(&self) -> bool {
        self.unmatched_reference.is_empty() && self.unmatched_candidate.is_empty()
    }

    pub fn max_score_delta(&self) -> f32 {
        self.matched.iter().map(|m| m.score_delta.abs()).fold(0., f32::max)
    }

    pub fn min_iou(&self) -> Option<f32> {
        self.matched.iter().map(|m| m.iou).reduce(f32::min)
    }
}

/// Matches detections of the same class greedily by descending IoU; pairs below `match_iou`
/// stay unmatched.
pub fn compare_detections(reference: &[Detection], candidate: &[Detection], match_iou: f32) -> DetectionComparison {
    let mut pairs: Vec<(usize, usize, f32)> = Vec::new();
    for (i, r) in reference.iter().enumerate() {
        for (j, c) in candidate.iter().enumerate() {
            if r.class_id() != c.class_id() {
                continue;
            }
            let iou = r.iou(c);
            if iou >= match_iou {
                pairs.push((i, j, iou));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.total_cmp(&a.2));

    let mut ref_used = vec![false; reference.len()];
    let mut cand_used = vec![false; candidate.len()];
    let mut matched = Vec::new();
    for (i, j, iou) in pairs {
        if ref_used[i] || cand_used[j] {
            continue;
        }
        ref_used[i] = true;
        cand_used[j] = true;
        matched.push(MatchedPair {
            reference: i,
            candidate: j,
            class_id: reference[i].class_id,
            iou,
            score_delta: candidate[j].score - reference[i].score,
        });
    }
    matched.sort_by_key(|m| m.reference);

    DetectionComparison {
        matched,
        unmatched_reference: (0..reference.len()).filter(|&i| !ref_used[i]).collect(),
        unmatched_candidate: (0..candidate.len()).filter(|&j| !cand_used[j]).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub reference_name: String,
    pub candidate_name: String,
    pub outputs: OutputComparison,
    pub reference_detections: Vec<Detection>,
    pub candidate_detections: Vec<Detection>,
    pub detections: DetectionComparison,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.outputs.consistent && self.detections.is_consistent()
    }
}

/// Runs the same input through two engines and compares both the raw tensors and the final
/// detections.
pub fn check_consistency<R, C>(
    reference: &mut R,
    candidate: &mut C,
    input: &R::Input,
    geometry: &ImageGeometry,
    config: &PostprocessConfig,
    tolerance: f32,
) -> anyhow::Result<ConsistencyReport>
where
    R: InferenceSource,
    C: InferenceSource<Input = R::Input>,
{
    let ref_out = reference.inference(input)?;
    let cand_out = candidate.inference(input)?;

    let outputs = compare_outputs(ref_out.view(), cand_out.view(), tolerance)?;
    log::info!(
        "{} vs {}: mean abs diff {:.6}, max abs diff {:.6}",
        reference.name(), candidate.name(), outputs.mean_abs_diff, outputs.max_abs_diff
    );

    let reference_detections = crate::postprocess::postprocess(ref_out.view(), geometry, config)?.into_detections();
    let candidate_detections = crate::postprocess::postprocess(cand_out.view(), geometry, config)?.into_detections();
    let detections = compare_detections(&reference_detections, &candidate_detections, DEFAULT_MATCH_IOU);

    Ok(ConsistencyReport {
        reference_name: reference.name(),
        candidate_name: candidate.name(),
        outputs,
        reference_detections,
        candidate_detections,
        detections,
    })
}
