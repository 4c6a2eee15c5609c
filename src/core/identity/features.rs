// src/core/identity/features.rs
use std::f64::consts::PI;

use image::GrayImage;

use super::segmenter::PATCH_SIZE;
use super::types::FeatureVector;
use crate::core::imaging::filters::{filter2d, resize_bilinear, saturate_u8};

pub const KERNEL_SIZE: usize = 21;
pub const SIGMA: f64 = 5.0;
pub const GAMMA: f64 = 0.5;
pub const ORIENTATIONS: [f64; 4] = [0.0, PI / 4.0, PI / 2.0, 3.0 * PI / 4.0];
pub const FREQUENCIES: [f64; 3] = [0.1, 0.2, 0.3];

pub const FILTER_COUNT: usize = ORIENTATIONS.len() * FREQUENCIES.len();
pub const FEATURES_PER_EYE: usize = FILTER_COUNT * (PATCH_SIZE * PATCH_SIZE) as usize;
pub const FEATURE_LENGTH: usize = 2 * FEATURES_PER_EYE;

/// Real Gabor kernel, `ksize` x `ksize`, stored ready for correlation.
pub fn gabor_kernel(ksize: usize, sigma: f64, theta: f64, lambda: f64, gamma: f64, psi: f64) -> Vec<f64> {
    let sigma_x = sigma;
    let sigma_y = sigma / gamma;
    let half = (ksize / 2) as i64;
    let (c, s) = (theta.cos(), theta.sin());
    let ex = -0.5 / (sigma_x * sigma_x);
    let ey = -0.5 / (sigma_y * sigma_y);
    let cscale = 2.0 * PI / lambda;

    let mut kernel = vec![0f64; ksize * ksize];
    for y in -half..=half {
        for x in -half..=half {
            let xr = x as f64 * c + y as f64 * s;
            let yr = -(x as f64) * s + y as f64 * c;
            let value = (ex * xr * xr + ey * yr * yr).exp() * (cscale * xr + psi).cos();
            let row = (half - y) as usize;
            let col = (half - x) as usize;
            kernel[row * ksize + col] = value;
        }
    }
    kernel
}

/// Fixed bank of 12 oriented Gabor filters (orientation-major order).
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    kernels: Vec<Vec<f64>>,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor {
    pub fn new() -> Self {
        let kernels = ORIENTATIONS
            .iter()
            .flat_map(|&theta| {
                FREQUENCIES
                    .iter()
                    .map(move |&freq| gabor_kernel(KERNEL_SIZE, SIGMA, theta, 1.0 / freq, GAMMA, 0.0))
            })
            .collect();
        Self { kernels }
    }

    /// Responses of one iris patch, each saturated to the 8-bit range.
    pub fn extract(&self, patch: &GrayImage) -> FeatureVector {
        let resized;
        let patch = if patch.dimensions() == (PATCH_SIZE, PATCH_SIZE) {
            patch
        } else {
            resized = resize_bilinear(patch, PATCH_SIZE, PATCH_SIZE);
            &resized
        };

        let mut features = Vec::with_capacity(FEATURES_PER_EYE);
        for kernel in &self.kernels {
            let response = filter2d(patch, kernel, KERNEL_SIZE);
            features.extend(response.into_iter().map(|v| saturate_u8(v) as f32));
        }
        features
    }

    /// Left eye features followed by right eye features.
    pub fn extract_pair(&self, left: &GrayImage, right: &GrayImage) -> FeatureVector {
        let mut features = self.extract(left);
        features.extend(self.extract(right));
        features
    }
}
