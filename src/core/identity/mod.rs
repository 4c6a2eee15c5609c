// src/core/identity/mod.rs
pub mod biometric;
pub mod features;
pub mod landmarks;
pub mod matcher;
pub mod quality;
pub mod segmenter;
pub mod types;

pub use biometric::{BiometricProcessor, BiometricSample};
pub use landmarks::{EyeRegionLocator, FixedLayoutDetector, LandmarkDetector};
pub use matcher::{cosine_similarity, MatchPolicy, Matcher};
pub use types::*;
