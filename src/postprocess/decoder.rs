use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use crate::common::{DetBox, HeadDecode, ImageGeometry, PostprocessConfig};
use crate::error::PostprocessError;
use crate::postprocess::grid::grid_decode;

/// One tensor row after decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAnchor {
    /// Row index in the detection tensor.
    pub anchor: usize,
    /// Corner-form box in model input space, before rescaling and clipping.
    pub model_box: DetBox,
    /// Corner-form box in original image space, clipped to the image.
    pub bbox: DetBox,
    pub objectness: f32,
    /// `objectness * class_prob[c]` for every class.
    pub scores: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct DecodedTensor {
    pub anchors: Vec<DecodedAnchor>,
    /// Number of NaN/infinite values replaced during sanitization.
    pub sanitized: usize,
}

/// Replaces NaN with `0` and `±inf` with `±sentinel`. Returns the sanitized copy and the
/// number of replaced values.
pub fn sanitize(tensor: ArrayView2<f32>, sentinel: f32) -> (Array2<f32>, usize) {
    let mut replaced = 0;
    let clean = tensor.mapv(|v| {
        if v.is_finite() {
            v
        } else {
            replaced += 1;
            if v.is_nan() {
                0.
            } else if v > 0. {
                sentinel
            } else {
                -sentinel
            }
        }
    });
    (clean, replaced)
}

/// Decodes a `(N, 5 + C)` detection tensor into image-space boxes and per-class scores.
///
/// Only the shape and the geometry are validated; malformed values are sanitized instead.
pub fn decode(
    tensor: ArrayView2<f32>,
    geometry: &ImageGeometry,
    config: &PostprocessConfig,
) -> Result<DecodedTensor, PostprocessError> {
    let expected = config.row_width();
    if tensor.ncols() != expected {
        return Err(PostprocessError::InvalidShape {
            expected,
            actual: tensor.ncols(),
        });
    }
    if !geometry.is_valid() {
        return Err(PostprocessError::InvalidRatio(geometry.ratio));
    }

    let (mut clean, sanitized) = sanitize(tensor, config.sentinel);
    if sanitized > 0 {
        log::warn!("Replaced {} non-finite values in the detection tensor", sanitized);
    }

    if let HeadDecode::Raw { strides } = &config.head_decode {
        grid_decode(&mut clean, config.input_width, config.input_height, strides)?;
    }

    let (img_w, img_h) = (geometry.width as f32, geometry.height as f32);
    let anchors = clean
        .axis_iter(Axis(0))
        .into_par_iter()
        .enumerate()
        .map(|(anchor, row)| {
            let model_box = DetBox::default().with_cxcy_wh(row[0], row[1], row[2], row[3]);
            let bbox = model_box
                .unletterbox(geometry.ratio, geometry.pad_x, geometry.pad_y)
                .clip(img_w, img_h);
            let objectness = row[4];
            let scores = row.iter().skip(5).map(|p| objectness * p).collect();
            DecodedAnchor {
                anchor,
                model_box,
                bbox,
                objectness,
                scores,
            }
        })
        .collect::<Vec<_>>();

    log::debug!("Decoded {} anchors ({} classes)", anchors.len(), config.nc());

    Ok(DecodedTensor { anchors, sanitized })
}
