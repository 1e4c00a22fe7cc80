mod class_thresholds;
mod tensor_stats;
mod time_calc;
pub mod tensor_io;

pub use class_thresholds::{ClassThresholds, LabelThreshold};
pub use tensor_stats::{DetectionSummary, TensorStats, TopAnchor, ValueStats};
pub use time_calc::TimeCalc;
