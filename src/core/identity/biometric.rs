// src/core/identity/biometric.rs
use std::sync::Arc;

use tracing::{debug, instrument};

use super::features::FeatureExtractor;
use super::landmarks::{EyeRegionLocator, FixedLayoutDetector, LandmarkDetector};
use super::quality::QualityScorer;
use super::segmenter::IrisSegmenter;
use super::types::FeatureVector;
use crate::core::imaging::ImageNormalizer;
use crate::utils::config::{BiometricConfig, LandmarkBackend};
use crate::utils::error::{AuthError, Result};

pub const ALGORITHM_VERSION: &str = "iris-gabor-v1";

/// Output of the pipeline for one capture.
#[derive(Debug, Clone, PartialEq)]
pub struct BiometricSample {
    pub features: FeatureVector,
    /// Mean quality of the two iris patches.
    pub quality: f64,
}

/// Stateless image-to-template pipeline. Safe to share across worker threads.
pub struct BiometricProcessor {
    normalizer: ImageNormalizer,
    locator: EyeRegionLocator,
    segmenter: IrisSegmenter,
    scorer: QualityScorer,
    extractor: FeatureExtractor,
}

impl BiometricProcessor {
    pub fn new(config: &BiometricConfig, detector: Arc<dyn LandmarkDetector>) -> Self {
        Self {
            normalizer: ImageNormalizer,
            locator: EyeRegionLocator::new(detector, config.face_selection),
            segmenter: IrisSegmenter::new(config.circle_selection),
            scorer: QualityScorer::default(),
            extractor: FeatureExtractor::new(),
        }
    }

    pub fn from_config(config: &BiometricConfig) -> Result<Self> {
        let detector = landmark_detector(config)?;
        Ok(Self::new(config, detector))
    }

    #[instrument(skip_all, fields(bytes = image_data.len()))]
    pub fn process(&self, image_data: &[u8]) -> Result<BiometricSample> {
        let image = self.normalizer.decode(image_data)?;
        let eyes = self.locator.locate(&image)?;

        let left = self.segmenter.segment(&eyes.left)?;
        let right = self.segmenter.segment(&eyes.right)?;

        let quality = (self.scorer.score(&left) + self.scorer.score(&right)) / 2.0;
        let features = self.extractor.extract_pair(&left, &right);
        debug!(quality, len = features.len(), "extracted iris features");

        Ok(BiometricSample { features, quality })
    }
}

pub fn landmark_detector(config: &BiometricConfig) -> Result<Arc<dyn LandmarkDetector>> {
    match config.landmark_backend {
        LandmarkBackend::Fixed => Ok(Arc::new(FixedLayoutDetector::new(config.left_eye, config.right_eye))),
        LandmarkBackend::Dlib => dlib_detector(config),
    }
}

#[cfg(feature = "dlib")]
fn dlib_detector(config: &BiometricConfig) -> Result<Arc<dyn LandmarkDetector>> {
    let model = config
        .landmark_model
        .as_deref()
        .ok_or_else(|| AuthError::Config("biometric.landmark_model is required for dlib".into()))?;
    let detector = super::landmarks::DlibLandmarkDetector::new(std::path::Path::new(model))?;
    Ok(Arc::new(detector))
}

#[cfg(not(feature = "dlib"))]
fn dlib_detector(_config: &BiometricConfig) -> Result<Arc<dyn LandmarkDetector>> {
    Err(AuthError::Config("built without the `dlib` feature".into()))
}
