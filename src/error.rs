use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PostprocessError {
    #[error("detection tensor rows have width {actual}, expected {expected} (5 + number of classes)")]
    InvalidShape { expected: usize, actual: usize },
    #[error("detection tensor has {actual} anchors, the raw head layout needs {expected}")]
    AnchorCountMismatch { expected: usize, actual: usize },
    #[error("tensor shapes differ: reference {reference:?}, candidate {candidate:?}")]
    ShapeMismatch {
        reference: Vec<usize>,
        candidate: Vec<usize>,
    },
    #[error("resize ratio {0} must be finite and positive")]
    InvalidRatio(f32),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
