mod class_labels;
mod det_box;
mod detection;
mod image_geometry;
mod postprocess_config;

pub use class_labels::*;
pub use det_box::*;
pub use detection::*;
pub use image_geometry::*;
pub use postprocess_config::*;
