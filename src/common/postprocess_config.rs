use std::fmt;
use serde::{Deserialize, Serialize};
use crate::common::ClassLabels;
use crate::data::ClassThresholds;
use crate::error::PostprocessError;

pub const DEFAULT_IOU: f32 = 0.45;
pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_SENTINEL: f32 = 1e6;
pub const DEFAULT_STRIDES: [u32; 3] = [8, 16, 32];

/// Layout of the box columns in the detection tensor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HeadDecode {
    /// Rows already hold pixel-space `cx, cy, w, h` and activated probabilities.
    #[default]
    Decoded,
    /// Rows hold grid offsets and log-space sizes; anchors are laid out stride by stride.
    Raw { strides: Vec<u32> },
}

impl HeadDecode {
    pub fn raw() -> Self {
        HeadDecode::Raw { strides: DEFAULT_STRIDES.to_vec() }
    }
}

/// Bounds on model-space box width and height. Both bounds are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeBounds {
    pub min_side: f32,
    /// `None` means the model input width/height.
    #[serde(default)]
    pub max_side: Option<f32>,
}

impl Default for SizeBounds {
    fn default() -> Self {
        Self {
            min_side: 1.0,
            max_side: None,
        }
    }
}

impl SizeBounds {
    pub fn accepts(&self, w: f32, h: f32, input_width: u32, input_height: u32) -> bool {
        let (max_w, max_h) = match self.max_side {
            Some(m) => (m, m),
            None => (input_width as f32, input_height as f32),
        };
        w > self.min_side && h > self.min_side && w < max_w && h < max_h
    }
}

/// Immutable settings for decode, filter and NMS. Build once, then pass by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostprocessConfig {
    pub names: ClassLabels,
    pub thresholds: ClassThresholds,
    pub iou: f32,
    pub class_agnostic: bool,
    pub input_width: u32,
    pub input_height: u32,
    pub size_bounds: SizeBounds,
    pub min_objectness: Option<f32>,
    pub head_decode: HeadDecode,
    pub sentinel: f32,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            names: ClassLabels::default(),
            thresholds: ClassThresholds::default(),
            iou: DEFAULT_IOU,
            class_agnostic: false,
            input_width: DEFAULT_INPUT_SIZE,
            input_height: DEFAULT_INPUT_SIZE,
            size_bounds: SizeBounds::default(),
            min_objectness: None,
            head_decode: HeadDecode::Decoded,
            sentinel: DEFAULT_SENTINEL,
        }
    }
}

impl PostprocessConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_names(mut self, names: &[&str]) -> Self {
        self.names = ClassLabels::new(names);
        self
    }

    pub fn with_labels(mut self, names: ClassLabels) -> Self {
        self.names = names;
        self
    }

    pub fn with_conf(mut self, x: f32) -> Self {
        self.thresholds.default = x;
        self
    }

    pub fn with_class_conf(mut self, class_id: usize, x: f32) -> Self {
        self.thresholds = self.thresholds.with_class(class_id, x);
        self
    }

    pub fn with_iou(mut self, x: f32) -> Self {
        self.iou = x;
        self
    }

    pub fn with_class_agnostic(mut self, x: bool) -> Self {
        self.class_agnostic = x;
        self
    }

    pub fn with_input_size(mut self, width: u32, height: u32) -> Self {
        self.input_width = width;
        self.input_height = height;
        self
    }

    pub fn with_size_bounds(mut self, x: SizeBounds) -> Self {
        self.size_bounds = x;
        self
    }

    pub fn with_min_objectness(mut self, x: f32) -> Self {
        self.min_objectness = Some(x);
        self
    }

    pub fn with_head_decode(mut self, x: HeadDecode) -> Self {
        self.head_decode = x;
        self
    }

    pub fn with_sentinel(mut self, x: f32) -> Self {
        self.sentinel = x;
        self
    }

    /// Number of classes C.
    pub fn nc(&self) -> usize {
        self.names.len()
    }

    /// Expected tensor row width, `5 + C`.
    pub fn row_width(&self) -> usize {
        5 + self.nc()
    }

    pub fn validate(&self) -> Result<(), PostprocessError> {
        let invalid = |msg: String| Err(PostprocessError::InvalidConfig(msg));

        if self.names.is_empty() {
            return invalid("at least one class name is required".to_string());
        }
        if let Some(t) = self.thresholds.values().find(|t| !(0.0..=1.0).contains(t)) {
            return invalid(format!("confidence threshold {} is outside [0, 1]", t));
        }
        if !(self.iou > 0.0 && self.iou < 1.0) {
            return invalid(format!("IoU threshold {} is outside (0, 1)", self.iou));
        }
        if self.input_width == 0 || self.input_height == 0 {
            return invalid(format!("input size {}x{} is empty", self.input_width, self.input_height));
        }
        if !(self.size_bounds.min_side >= 0.0) {
            return invalid(format!("minimum box side {} is negative", self.size_bounds.min_side));
        }
        if let Some(max) = self.size_bounds.max_side {
            if !(max > self.size_bounds.min_side) {
                return invalid(format!(
                    "maximum box side {} is not above minimum {}",
                    max, self.size_bounds.min_side
                ));
            }
        }
        if let Some(t) = self.min_objectness {
            if !(0.0..=1.0).contains(&t) {
                return invalid(format!("objectness gate {} is outside [0, 1]", t));
            }
        }
        if let HeadDecode::Raw { strides } = &self.head_decode {
            if strides.is_empty() || strides.contains(&0) {
                return invalid(format!("invalid head strides {:?}", strides));
            }
        }
        if !(self.sentinel.is_finite() && self.sentinel > 0.0) {
            return invalid(format!("sentinel {} must be finite and positive", self.sentinel));
        }
        Ok(())
    }
}

impl fmt::Display for PostprocessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Classes: {:?}\n\
            Model Input Resolution: {}x{}\n\
            Detection Threshold: {} (overrides: {:?})\n\
            IoU Threshold: {}\n\
            Class Agnostic: {}\n\
            Head Decode: {:?}",
            self.names.names(),
            self.input_width, self.input_height,
            self.thresholds.default,
            self.thresholds.per_class.iter().map(|x| (x.id, x.threshold)).collect::<Vec<_>>(),
            self.iou, self.class_agnostic, self.head_decode
        )
    }
}
