use serde::{Deserialize, Serialize};
use crate::common::{ClassLabels, Detection};
use crate::data::{DetectionSummary, TimeCalc};
use crate::postprocess::filter::FilterReport;

/// Result of one post-processing call.
///
/// # Fields
///
/// * `detections` - Final detections, grouped by ascending class and ordered by descending score.
/// * `report` - Filter and suppression counters.
/// * `timings` - Per-stage durations.
#[derive(Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PostprocessOutput {
    detections: Vec<Detection>,
    report: FilterReport,
    #[serde(skip)]
    timings: TimeCalc,
}

impl std::fmt::Debug for PostprocessOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut f = f.debug_struct("PostprocessOutput");
        if !self.detections.is_empty() {
            f.field("Detections", &self.detections);
        }
        f.field("Report", &self.report);
        f.finish()
    }
}

impl PostprocessOutput {
    pub fn with_detections(mut self, detections: Vec<Detection>) -> Self {
        self.report.kept = detections.len();
        self.detections = detections;
        self
    }

    pub fn with_report(mut self, report: FilterReport) -> Self {
        self.report = FilterReport {
            kept: self.detections.len(),
            ..report
        };
        self
    }

    pub fn with_timings(mut self, timings: TimeCalc) -> Self {
        self.timings = timings;
        self
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn into_detections(self) -> Vec<Detection> {
        self.detections
    }

    pub fn report(&self) -> &FilterReport {
        &self.report
    }

    pub fn timings(&self) -> &TimeCalc {
        &self.timings
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn summary(&self, labels: &ClassLabels) -> DetectionSummary {
        DetectionSummary::from_detections(&self.detections, labels)
    }
}
