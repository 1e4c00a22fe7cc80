use serde::{Deserialize, Serialize};
use crate::common::DetBox;
use crate::postprocess::nms::Nms;

/// A scored detection: corner-form box, `objectness * class_prob` score and class index.
#[derive(Default, Debug, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: DetBox,
    pub score: f32,
    pub class_id: usize,
    /// Row of the detection tensor this detection was decoded from.
    pub anchor: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Nms for Detection {
    fn iou(&self, other: &Self) -> f32 {
        self.bbox.iou(&other.bbox)
    }

    fn confidence(&self) -> f32 {
        self.score
    }

    fn class_id(&self) -> usize {
        self.class_id
    }
}

impl Detection {
    pub fn new(class_id: usize, bbox: DetBox, score: f32) -> Self {
        Self {
            bbox,
            score,
            class_id,
            anchor: 0,
            label: None,
        }
    }

    /// Records which tensor row produced this detection.
    pub fn with_anchor(mut self, anchor: usize) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn get_label(&self) -> String {
        self.label.clone().unwrap_or(format!("class_{}", self.class_id))
    }

    /// Output boundary tuple `(x1, y1, x2, y2, score, class_index)`.
    pub fn as_tuple(&self) -> (f32, f32, f32, f32, f32, usize) {
        (self.bbox.x1, self.bbox.y1, self.bbox.x2, self.bbox.y2, self.score, self.class_id)
    }

    pub fn describe(&self) -> String {
        format!(
            "{}: score={:.3}, box=({:.1},{:.1},{:.1},{:.1}) size=({:.1}x{:.1})",
            self.get_label(), self.score,
            self.bbox.x1, self.bbox.y1, self.bbox.x2, self.bbox.y2,
            self.bbox.w, self.bbox.h
        )
    }
}
