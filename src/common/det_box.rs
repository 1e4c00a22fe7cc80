use serde::{Deserialize, Serialize};

/// Axis-aligned box in corner form. Width and height are cached alongside the corners.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize, PartialOrd)]
pub struct DetBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub w: f32,
    pub h: f32,
}

impl DetBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            w: x2 - x1,
            h: y2 - y1,
        }
    }

    /// Returns the width of the bounding box.
    pub fn width(&self) -> f32 {
        self.w
    }

    /// Returns the height of the bounding box.
    pub fn height(&self) -> f32 {
        self.h
    }

    /// Returns the center x-coordinate of the bounding box.
    pub fn cx(&self) -> f32 {
        self.x1 + self.w / 2.
    }

    /// Returns the center y-coordinate of the bounding box.
    pub fn cy(&self) -> f32 {
        self.y1 + self.h / 2.
    }

    /// Returns the bounding box coordinates as `(x1, y1, x2, y2)`.
    pub fn xy1_xy2(&self) -> (f32, f32, f32, f32) {
        (self.x1, self.y1, self.x2, self.y2)
    }

    /// Returns the center coordinates and size of the bounding box as `(cx, cy, w, h)`.
    pub fn cxy_wh(&self) -> (f32, f32, f32, f32) {
        (self.cx(), self.cy(), self.w, self.h)
    }

    /// Computes the area of the bounding box. Inverted boxes have zero area.
    pub fn area(&self) -> f32 {
        self.w.max(0.) * self.h.max(0.)
    }

    /// Computes the intersection area between this bounding box and another.
    pub fn intersect(&self, other: &DetBox) -> f32 {
        let left = self.x1.max(other.x1);
        let right = self.x2.min(other.x2);
        let top = self.y1.max(other.y1);
        let bottom = self.y2.min(other.y2);
        (right - left).max(0.) * (bottom - top).max(0.)
    }

    /// Computes the union area between this bounding box and another.
    pub fn union(&self, other: &DetBox) -> f32 {
        self.area() + other.area() - self.intersect(other)
    }

    /// Computes the intersection over union (IoU) between this bounding box and another.
    ///
    /// Returns `0.0` when the union is empty, so two zero-area boxes never suppress each other.
    pub fn iou(&self, other: &DetBox) -> f32 {
        let union = self.union(other);
        if union > 0. {
            self.intersect(other) / union
        } else {
            0.
        }
    }

    /// True when every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    /// True when `x1 <= x2` and `y1 <= y2`.
    pub fn is_ordered(&self) -> bool {
        self.x1 <= self.x2 && self.y1 <= self.y2
    }

    /// Maps a box from letterboxed model space back into image space: `(v - pad) / ratio`.
    pub fn unletterbox(self, ratio: f32, pad_x: f32, pad_y: f32) -> Self {
        Self::new(
            (self.x1 - pad_x) / ratio,
            (self.y1 - pad_y) / ratio,
            (self.x2 - pad_x) / ratio,
            (self.y2 - pad_y) / ratio,
        )
    }

    /// Clips x coordinates to `[0, max_x]` and y coordinates to `[0, max_y]`.
    pub fn clip(self, max_x: f32, max_y: f32) -> Self {
        Self::new(
            self.x1.clamp(0., max_x),
            self.y1.clamp(0., max_y),
            self.x2.clamp(0., max_x),
            self.y2.clamp(0., max_y),
        )
    }

    /// Sets the box from its center and size.
    pub fn with_cxcy_wh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.x1 = cx - (w / 2.0);
        self.y1 = cy - (h / 2.0);
        self.x2 = cx + (w / 2.0);
        self.y2 = cy + (h / 2.0);

        self.w = self.x2 - self.x1;
        self.h = self.y2 - self.y1;
        self
    }
}
