// src/core/identity/quality.rs
use image::GrayImage;
use serde::Serialize;

use crate::core::imaging::filters::{laplacian, mean_and_std};

const INTENSITY_SCALE: f64 = 127.5;
const CONTRAST_SCALE: f64 = 64.0;
const SHARPNESS_SCALE: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityReport {
    pub intensity: f64,
    pub contrast: f64,
    pub sharpness: f64,
    pub score: f64,
}

/// Scores how usable a grayscale capture is. Every sub-score and the
/// weighted total lie in [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct QualityScorer {
    pub intensity_weight: f64,
    pub contrast_weight: f64,
    pub sharpness_weight: f64,
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self {
            intensity_weight: 0.3,
            contrast_weight: 0.3,
            sharpness_weight: 0.4,
        }
    }
}

impl QualityScorer {
    pub fn assess(&self, image: &GrayImage) -> QualityReport {
        if image.width() == 0 || image.height() == 0 {
            return QualityReport { intensity: 0.0, contrast: 0.0, sharpness: 0.0, score: 0.0 };
        }

        let (mean, std) = mean_and_std(image.as_raw().iter().map(|&v| v as f64));
        let response = laplacian(image);
        let (_, lap_std) = mean_and_std(response.iter().copied());

        let intensity = (mean / INTENSITY_SCALE).clamp(0.0, 1.0);
        let contrast = (std / CONTRAST_SCALE).clamp(0.0, 1.0);
        let sharpness = (lap_std * lap_std / SHARPNESS_SCALE).clamp(0.0, 1.0);

        let score = (self.intensity_weight * intensity
            + self.contrast_weight * contrast
            + self.sharpness_weight * sharpness)
            .clamp(0.0, 1.0);

        QualityReport { intensity, contrast, sharpness, score }
    }

    pub fn score(&self, image: &GrayImage) -> f64 {
        self.assess(image).score
    }
}
