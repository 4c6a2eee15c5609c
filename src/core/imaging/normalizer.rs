// src/core/imaging/normalizer.rs
use image::{ImageFormat, RgbImage};
use tracing::debug;

use crate::utils::error::{AuthError, Result};

/// Decodes uploaded bytes into an RGB pixel grid. Only JPEG and PNG are accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageNormalizer;

impl ImageNormalizer {
    pub fn decode(&self, bytes: &[u8]) -> Result<RgbImage> {
        if bytes.is_empty() {
            return Err(AuthError::InvalidImage("empty image buffer".into()));
        }

        let format = image::guess_format(bytes)
            .map_err(|e| AuthError::InvalidImage(format!("unrecognised format: {}", e)))?;
        if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
            return Err(AuthError::InvalidImage(format!("unsupported format {:?}", format)));
        }

        let decoded = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| AuthError::InvalidImage(format!("failed to decode image: {}", e)))?;
        let rgb = decoded.to_rgb8();
        if rgb.width() == 0 || rgb.height() == 0 {
            return Err(AuthError::InvalidImage("image has no pixels".into()));
        }

        debug!(width = rgb.width(), height = rgb.height(), ?format, "decoded image");
        Ok(rgb)
    }
}
