use std::fmt;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use crate::common::{ClassLabels, Detection};
use crate::error::PostprocessError;

/// Min/max/mean over the finite values of a column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub count: usize,
}

impl ValueStats {
    /// Returns `None` when there is no finite value.
    pub fn from_values(values: impl Iterator<Item = f32>) -> Option<Self> {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0f64;
        let mut count = 0usize;
        for v in values.filter(|v| v.is_finite()) {
            min = min.min(v);
            max = max.max(v);
            sum += v as f64;
            count += 1;
        }
        (count > 0).then(|| Self {
            min,
            max,
            mean: (sum / count as f64) as f32,
            count,
        })
    }
}

impl fmt::Display for ValueStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "min={:.4}, max={:.4}, mean={:.4}", self.min, self.max, self.mean)
    }
}

/// A high-scoring anchor for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopAnchor {
    pub anchor: usize,
    pub score: f32,
    pub objectness: f32,
    pub prob: f32,
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

/// Diagnostics over a raw `(N, 5 + C)` detection tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorStats {
    pub shape: [usize; 2],
    pub non_finite: usize,
    pub values: Option<ValueStats>,
    pub objectness: Option<ValueStats>,
    pub class_probs: Vec<Option<ValueStats>>,
    /// Top anchors per class by `objectness * prob`, best first.
    pub top: Vec<Vec<TopAnchor>>,
}

impl TensorStats {
    pub fn from_tensor(tensor: ArrayView2<f32>, nc: usize, top_k: usize) -> Result<Self, PostprocessError> {
        if tensor.ncols() != 5 + nc {
            return Err(PostprocessError::InvalidShape {
                expected: 5 + nc,
                actual: tensor.ncols(),
            });
        }

        let non_finite = tensor.iter().filter(|v| !v.is_finite()).count();
        let values = ValueStats::from_values(tensor.iter().copied());
        let objectness = ValueStats::from_values(tensor.column(4).iter().copied());
        let class_probs = (0..nc)
            .map(|c| ValueStats::from_values(tensor.column(5 + c).iter().copied()))
            .collect();

        let top = (0..nc)
            .map(|c| {
                let mut ranked: Vec<TopAnchor> = tensor
                    .outer_iter()
                    .enumerate()
                    .map(|(anchor, row)| TopAnchor {
                        anchor,
                        score: row[4] * row[5 + c],
                        objectness: row[4],
                        prob: row[5 + c],
                        cx: row[0],
                        cy: row[1],
                        w: row[2],
                        h: row[3],
                    })
                    .filter(|a| a.score.is_finite())
                    .collect();
                ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
                ranked.truncate(top_k);
                ranked
            })
            .collect();

        Ok(Self {
            shape: [tensor.nrows(), tensor.ncols()],
            non_finite,
            values,
            objectness,
            class_probs,
            top,
        })
    }

    pub fn describe(&self, labels: &ClassLabels) -> String {
        let fmt_stats = |s: &Option<ValueStats>| match s {
            Some(s) => s.to_string(),
            None => "no finite values".to_string(),
        };

        let mut out = format!("Output shape: {:?}\n", self.shape);
        out += &format!("Value range: {}\n", fmt_stats(&self.values));
        if self.non_finite > 0 {
            out += &format!("Warning: {} non-finite values\n", self.non_finite);
        }
        out += &format!("Objectness: {}\n", fmt_stats(&self.objectness));
        for (c, s) in self.class_probs.iter().enumerate() {
            out += &format!("{} prob: {}\n", labels.name(c), fmt_stats(s));
        }
        for (c, top) in self.top.iter().enumerate() {
            out += &format!("Top {} {} detections:\n", top.len(), labels.name(c));
            for a in top {
                out += &format!(
                    "  idx={}: score={:.4}, obj={:.4}, prob={:.4}, coords=(cx={:.1}, cy={:.1}, w={:.1}, h={:.1})\n",
                    a.anchor, a.score, a.objectness, a.prob, a.cx, a.cy, a.w, a.h
                );
            }
        }
        out
    }
}

/// Detection counts, overall and per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub total: usize,
    pub per_class: Vec<(String, usize)>,
}

impl DetectionSummary {
    pub fn from_detections(detections: &[Detection], labels: &ClassLabels) -> Self {
        let nc = detections
            .iter()
            .map(|d| d.class_id + 1)
            .max()
            .unwrap_or(0)
            .max(labels.len());
        let mut counts = vec![0usize; nc];
        for d in detections {
            counts[d.class_id] += 1;
        }
        Self {
            total: detections.len(),
            per_class: counts
                .into_iter()
                .enumerate()
                .map(|(c, n)| (labels.name(c), n))
                .collect(),
        }
    }
}
