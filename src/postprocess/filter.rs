use serde::{Deserialize, Serialize};
use crate::common::{Detection, PostprocessConfig};
use crate::postprocess::decoder::{DecodedAnchor, DecodedTensor};

/// Per-call counters for the filter and suppression stages. Rejections are counted per anchor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterReport {
    pub anchors: usize,
    pub sanitized_values: usize,
    pub below_objectness: usize,
    pub below_threshold: usize,
    pub non_finite: usize,
    pub degenerate: usize,
    /// `(box, class)` pairs handed to NMS.
    pub candidates: usize,
    pub kept: usize,
}

impl FilterReport {
    pub fn summary(&self) -> String {
        format!(
            "anchors={} sanitized={} below_objectness={} below_threshold={} non_finite={} degenerate={} candidates={} kept={}",
            self.anchors, self.sanitized_values, self.below_objectness, self.below_threshold,
            self.non_finite, self.degenerate, self.candidates, self.kept
        )
    }
}

enum Verdict {
    BelowObjectness,
    BelowThreshold,
    NonFinite,
    Degenerate,
    Pass(Vec<usize>),
}

fn judge(anchor: &DecodedAnchor, config: &PostprocessConfig) -> Verdict {
    if let Some(gate) = config.min_objectness {
        if anchor.objectness <= gate || anchor.objectness.is_nan() {
            return Verdict::BelowObjectness;
        }
    }

    let classes: Vec<usize> = anchor
        .scores
        .iter()
        .enumerate()
        .filter(|&(c, &s)| config.thresholds.passes(c, s))
        .map(|(c, _)| c)
        .collect();
    if classes.is_empty() {
        return Verdict::BelowThreshold;
    }

    if !anchor.model_box.is_finite()
        || !anchor.bbox.is_finite()
        || classes.iter().any(|&c| !anchor.scores[c].is_finite())
    {
        return Verdict::NonFinite;
    }

    let sized = config.size_bounds.accepts(
        anchor.model_box.width(),
        anchor.model_box.height(),
        config.input_width,
        config.input_height,
    );
    if !sized || !anchor.bbox.is_ordered() || anchor.bbox.area() <= 0. {
        return Verdict::Degenerate;
    }

    Verdict::Pass(classes)
}

/// Keeps `(box, class)` pairs whose score is above the class threshold and whose geometry is sane.
///
/// Candidates are returned grouped by ascending class, then by ascending anchor index.
pub fn filter(decoded: &DecodedTensor, config: &PostprocessConfig) -> (Vec<Detection>, FilterReport) {
    let mut report = FilterReport {
        anchors: decoded.anchors.len(),
        sanitized_values: decoded.sanitized,
        ..Default::default()
    };

    let mut per_class: Vec<Vec<Detection>> = vec![Vec::new(); config.nc()];
    for anchor in &decoded.anchors {
        match judge(anchor, config) {
            Verdict::BelowObjectness => report.below_objectness += 1,
            Verdict::BelowThreshold => report.below_threshold += 1,
            Verdict::NonFinite => report.non_finite += 1,
            Verdict::Degenerate => report.degenerate += 1,
            Verdict::Pass(classes) => {
                for c in classes {
                    per_class[c].push(
                        Detection::new(c, anchor.bbox, anchor.scores[c])
                            .with_anchor(anchor.anchor)
                            .with_label(&config.names.name(c)),
                    );
                }
            }
        }
    }

    let candidates: Vec<Detection> = per_class.into_iter().flatten().collect();
    report.candidates = candidates.len();

    log::debug!(
        "Filter: {} candidates from {} anchors ({} below threshold, {} degenerate, {} non-finite)",
        report.candidates, report.anchors, report.below_threshold, report.degenerate, report.non_finite
    );

    (candidates, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use crate::common::{ImageGeometry, SizeBounds};
    use crate::postprocess::decoder::decode;

    fn run(t: ndarray::Array2<f32>, config: &PostprocessConfig) -> (Vec<Detection>, FilterReport) {
        let decoded = decode(t.view(), &ImageGeometry::new(640, 640, 1.0), config).unwrap();
        filter(&decoded, config)
    }

    #[test]
    fn threshold_is_strict_and_per_class() {
        let config = PostprocessConfig::new().with_conf(0.5).with_class_conf(1, 0.2);
        let t = array![
            [100., 100., 20., 20., 1.0, 0.5, 0.1],
            [200., 200., 20., 20., 1.0, 0.6, 0.3],
        ];
        let (c, report) = run(t, &config);
        let got: Vec<(usize, usize)> = c.iter().map(|d| (d.class_id, d.anchor)).collect();
        assert_eq!(got, vec![(0, 1), (1, 1)]);
        assert_eq!(report.below_threshold, 1);
        assert_eq!(report.candidates, 2);
        assert_eq!(c[1].label.as_deref(), Some("doc_quad"));
    }

    #[test]
    fn rejects_degenerate_and_runaway_sizes() {
        let config = PostprocessConfig::new();
        let t = array![
            [100., 100., 1., 20., 0.9, 0.9, 0.],
            [100., 100., 20., 700., 0.9, 0.9, 0.],
            [100., 100., -20., 20., 0.9, 0.9, 0.],
            [-100., -100., 20., 20., 0.9, 0.9, 0.],
            [100., 100., 20., 20., 0.9, 0.9, 0.],
        ];
        let (c, report) = run(t, &config);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].anchor, 4);
        assert_eq!(report.degenerate, 4);
    }

    #[test]
    fn configurable_size_bounds() {
        let config = PostprocessConfig::new().with_size_bounds(SizeBounds { min_side: 30., max_side: None });
        let t = array![[100., 100., 20., 40., 0.9, 0.9, 0.]];
        let (c, report) = run(t, &config);
        assert!(c.is_empty());
        assert_eq!(report.degenerate, 1);
    }

    #[test]
    fn objectness_gate() {
        let config = PostprocessConfig::new().with_min_objectness(0.5);
        let t = array![
            [100., 100., 20., 20., 0.5, 1.0, 1.0],
            [200., 200., 20., 20., 0.6, 1.0, 1.0],
        ];
        let (c, report) = run(t, &config);
        assert_eq!(c.len(), 2);
        assert!(c.iter().all(|d| d.anchor == 1));
        assert_eq!(report.below_objectness, 1);
    }

    #[test]
    fn nan_objectness_never_passes() {
        let config = PostprocessConfig::new();
        let t = array![[100., 100., 20., 20., f32::NAN, 0.9, 0.9]];
        let (c, report) = run(t, &config);
        assert!(c.is_empty());
        assert_eq!(report.sanitized_values, 1);
        assert_eq!(report.below_threshold, 1);
    }

    #[test]
    fn overflowing_raw_sizes_are_non_finite() {
        let config = PostprocessConfig::new()
            .with_input_size(32, 32)
            .with_head_decode(crate::common::HeadDecode::Raw { strides: vec![32] });
        // exp(1e6) overflows to infinity.
        let t = array![[0.5, 0.5, f32::INFINITY, 0., 0.9, 0.9, 0.]];
        let (c, report) = run(t, &config);
        assert!(c.is_empty());
        assert_eq!(report.non_finite, 1);
    }
}
