mod utils;
mod error;
pub mod common;
pub mod data;
pub mod postprocess;

use std::time::Instant;
use ndarray::ArrayView2;
use crate::common::{Detection, ImageGeometry, PostprocessConfig};

pub use crate::error::PostprocessError;
pub use crate::utils::file_to_vec;

pub type Result<T, E = PostprocessError> = std::result::Result<T, E>;

/// Runs decode, filter and NMS over one detection tensor and returns the final detections.
///
/// An empty result is a normal outcome, not an error.
pub fn run_detection(
    tensor: ArrayView2<f32>,
    geometry: &ImageGeometry,
    config: &PostprocessConfig,
) -> Result<Vec<Detection>> {
    let now = Instant::now();

    let output = postprocess::postprocess(tensor, geometry, config)?;

    log::debug!("Postprocessing time: {:?} ({})", now.elapsed(), output.report().summary());

    Ok(output.into_detections())
}
