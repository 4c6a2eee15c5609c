// src/core/identity/segmenter.rs
use image::{GrayImage, Luma, RgbImage};
use tracing::debug;

use crate::core::imaging::filters::{equalize_histogram, gaussian_blur_7x7, resize_bilinear, to_gray};
use crate::core::imaging::{detect_circles, Circle, HoughParams};
use crate::utils::config::CircleSelection;
use crate::utils::error::{AuthError, Result};

pub const PATCH_SIZE: u32 = 100;

/// Isolates the iris disc inside one eye crop and normalizes it to a
/// `PATCH_SIZE` x `PATCH_SIZE` grayscale patch.
#[derive(Debug, Clone)]
pub struct IrisSegmenter {
    params: HoughParams,
    selection: CircleSelection,
}

impl IrisSegmenter {
    pub fn new(selection: CircleSelection) -> Self {
        Self { params: HoughParams::default(), selection }
    }

    pub fn with_params(params: HoughParams, selection: CircleSelection) -> Self {
        Self { params, selection }
    }

    pub fn segment(&self, eye: &RgbImage) -> Result<GrayImage> {
        if eye.width() == 0 || eye.height() == 0 {
            return Err(AuthError::NoIrisDetected);
        }

        let equalized = equalize_histogram(&to_gray(eye));
        let blurred = gaussian_blur_7x7(&equalized);
        let circles = detect_circles(&blurred, &self.params);

        let circle = select_circle(&circles, self.selection).ok_or(AuthError::NoIrisDetected)?;
        let (cx, cy, r) = (circle.x.round(), circle.y.round(), circle.radius.round());
        debug!(candidates = circles.len(), cx, cy, r, "iris circle selected");

        let r_sq = r * r;
        let masked = GrayImage::from_fn(equalized.width(), equalized.height(), |x, y| {
            let (dx, dy) = (x as f64 - cx, y as f64 - cy);
            if dx * dx + dy * dy <= r_sq {
                *equalized.get_pixel(x, y)
            } else {
                Luma([0])
            }
        });

        Ok(resize_bilinear(&masked, PATCH_SIZE, PATCH_SIZE))
    }
}

pub fn select_circle(circles: &[Circle], selection: CircleSelection) -> Option<&Circle> {
    match selection {
        CircleSelection::First => circles.first(),
        CircleSelection::Largest => circles
            .iter()
            .reduce(|best, c| if c.radius > best.radius { c } else { best }),
    }
}
