// src/core/imaging/mod.rs
pub mod filters;
pub mod hough;
pub mod normalizer;

pub use hough::{detect_circles, Circle, HoughParams};
pub use normalizer::ImageNormalizer;
