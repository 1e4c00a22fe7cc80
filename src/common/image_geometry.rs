use serde::{Deserialize, Serialize};

/// Original image size and the letterbox transform that produced the model input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageGeometry {
    pub width: u32,
    pub height: u32,
    pub ratio: f32,
    #[serde(default)]
    pub pad_x: f32,
    #[serde(default)]
    pub pad_y: f32,
}

impl ImageGeometry {
    pub fn new(width: u32, height: u32, ratio: f32) -> Self {
        Self {
            width,
            height,
            ratio,
            pad_x: 0.,
            pad_y: 0.,
        }
    }

    /// Top-left letterbox: the image is resized by `min(input_h / h, input_w / w)` and padded
    /// on the right and bottom.
    pub fn letterbox(input_width: u32, input_height: u32, width: u32, height: u32) -> Self {
        Self::new(width, height, Self::fit_ratio(input_width, input_height, width, height))
    }

    /// Letterbox with the resized image centred in the model input.
    pub fn centered(input_width: u32, input_height: u32, width: u32, height: u32) -> Self {
        let ratio = Self::fit_ratio(input_width, input_height, width, height);
        let new_w = (width as f32 * ratio).round();
        let new_h = (height as f32 * ratio).round();
        Self {
            width,
            height,
            ratio,
            pad_x: (input_width as f32 - new_w) / 2.,
            pad_y: (input_height as f32 - new_h) / 2.,
        }
    }

    fn fit_ratio(input_width: u32, input_height: u32, width: u32, height: u32) -> f32 {
        (input_height as f32 / height as f32).min(input_width as f32 / width as f32)
    }

    pub fn is_valid(&self) -> bool {
        self.ratio.is_finite() && self.ratio > 0. && self.pad_x.is_finite() && self.pad_y.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letterbox_ratio() {
        let g = ImageGeometry::letterbox(640, 640, 1280, 720);
        assert!((g.ratio - 0.5).abs() < 1e-6);
        assert_eq!((g.pad_x, g.pad_y), (0., 0.));
    }

    #[test]
    fn centered_padding() {
        let g = ImageGeometry::centered(640, 640, 1280, 720);
        assert!((g.ratio - 0.5).abs() < 1e-6);
        assert_eq!(g.pad_x, 0.);
        assert_eq!(g.pad_y, 140.);
    }

    #[test]
    fn zero_sized_image_is_invalid() {
        assert!(!ImageGeometry::new(0, 0, 0.).is_valid());
        assert!(!ImageGeometry::new(10, 10, f32::NAN).is_valid());
    }
}
