//! Pixel-level steps between the rendered page and the recognizer.

pub mod crop;
pub mod preprocess;

pub use crop::{crop_bounds, crop_region, CropRect};
pub use preprocess::preprocess;
