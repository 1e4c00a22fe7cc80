pub mod compare;
pub mod decoder;
pub mod filter;
pub mod grid;
pub mod inference_source;
pub mod nms;
pub mod output;

use std::time::{Duration, Instant};
use ndarray::ArrayView2;

use crate::common::{ImageGeometry, PostprocessConfig};
use crate::data::TimeCalc;
use crate::error::PostprocessError;
use crate::utils;

pub use compare::*;
pub use decoder::{decode, sanitize, DecodedAnchor, DecodedTensor};
pub use filter::{filter, FilterReport};
pub use inference_source::InferenceSource;
pub use nms::{multiclass_nms, nms, Nms};
pub use output::PostprocessOutput;

/// Decode, filter and suppress one `(N, 5 + C)` detection tensor.
pub fn postprocess(
    tensor: ArrayView2<f32>,
    geometry: &ImageGeometry,
    config: &PostprocessConfig,
) -> Result<PostprocessOutput, PostprocessError> {
    config.validate()?;

    let start = Instant::now();
    let mut timings = TimeCalc::default();
    let mut elapsed = Duration::ZERO;

    let decoded = decode(tensor, geometry, config)?;
    let mark = utils::trace("TIME", "Decode", start, elapsed);
    timings.add_or_push("decode", mark - elapsed);
    elapsed = mark;

    let (candidates, report) = filter(&decoded, config);
    let mark = utils::trace("TIME", "Filter", start, elapsed);
    timings.add_or_push("filter", mark - elapsed);
    elapsed = mark;

    let kept = nms(&candidates, config.iou, config.class_agnostic);
    let mark = utils::trace("TIME", "NMS", start, elapsed);
    timings.add_or_push("nms", mark - elapsed);

    log::debug!("NMS: {} -> {} detections", candidates.len(), kept.len());

    Ok(PostprocessOutput::default()
        .with_detections(kept)
        .with_report(report)
        .with_timings(timings))
}
