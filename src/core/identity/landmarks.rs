// src/core/identity/landmarks.rs
use std::sync::Arc;

use image::{imageops, RgbImage};
use tracing::debug;

use super::types::{BoundingBox, Face, Point};
use crate::utils::config::{EyeBox, FaceSelection};
use crate::utils::error::{AuthError, Result};

pub const LANDMARK_COUNT: usize = 68;
pub const LEFT_EYE: std::ops::Range<usize> = 36..42;
pub const RIGHT_EYE: std::ops::Range<usize> = 42..48;

/// Face and landmark capability. An empty result is not an error.
pub trait LandmarkDetector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Face>>;
}

/// Detector for fixed capture rigs where the eyes always sit in known boxes.
/// Produces a single face whose eye windows outline the configured boxes, or
/// no face when a box does not fit inside the image.
#[derive(Debug, Clone)]
pub struct FixedLayoutDetector {
    left_eye: EyeBox,
    right_eye: EyeBox,
}

impl FixedLayoutDetector {
    pub fn new(left_eye: EyeBox, right_eye: EyeBox) -> Self {
        Self { left_eye, right_eye }
    }

    fn fits(eye: &EyeBox, image: &RgbImage) -> bool {
        eye.width > 0
            && eye.height > 0
            && eye.x as u64 + eye.width as u64 <= image.width() as u64
            && eye.y as u64 + eye.height as u64 <= image.height() as u64
    }

    /// Six points around the box, in the 68-point eye order: outer corner,
    /// two upper lid points, inner corner, two lower lid points.
    fn outline(eye: &EyeBox) -> [Point; 6] {
        let (x, y) = (eye.x as i64, eye.y as i64);
        let (w, h) = (eye.width as i64, eye.height as i64);
        [
            Point::new(x, y + h / 2),
            Point::new(x + w / 3, y),
            Point::new(x + 2 * w / 3, y),
            Point::new(x + w - 1, y + h / 2),
            Point::new(x + 2 * w / 3, y + h - 1),
            Point::new(x + w / 3, y + h - 1),
        ]
    }
}

impl LandmarkDetector for FixedLayoutDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Face>> {
        if !Self::fits(&self.left_eye, image) || !Self::fits(&self.right_eye, image) {
            debug!(
                width = image.width(),
                height = image.height(),
                "configured eye boxes fall outside the image"
            );
            return Ok(Vec::new());
        }

        let centre = Point::new(image.width() as i64 / 2, image.height() as i64 / 2);
        let mut landmarks = vec![centre; LANDMARK_COUNT];
        landmarks[LEFT_EYE].copy_from_slice(&Self::outline(&self.left_eye));
        landmarks[RIGHT_EYE].copy_from_slice(&Self::outline(&self.right_eye));

        Ok(vec![Face {
            bounding_box: BoundingBox {
                left: 0,
                top: 0,
                right: image.width() as i64,
                bottom: image.height() as i64,
            },
            landmarks,
        }])
    }
}

#[cfg(feature = "dlib")]
pub use self::dlib::DlibLandmarkDetector;

#[cfg(feature = "dlib")]
mod dlib {
    use std::path::Path;

    use dlib_face_recognition::{
        FaceDetector, FaceDetectorTrait, ImageMatrix, LandmarkPredictor, LandmarkPredictorTrait,
    };
    use image::RgbImage;
    use parking_lot::Mutex;
    use tracing::debug;

    use super::LandmarkDetector;
    use crate::core::identity::types::{BoundingBox, Face, Point};
    use crate::utils::error::{AuthError, Result};

    /// HOG frontal face detector plus the 68-point shape predictor.
    pub struct DlibLandmarkDetector {
        models: Mutex<Models>,
    }

    struct Models {
        detector: FaceDetector,
        predictor: LandmarkPredictor,
    }

    // The dlib handles own their native state; access is serialized by the mutex.
    unsafe impl Send for Models {}

    impl DlibLandmarkDetector {
        pub fn new(model: &Path) -> Result<Self> {
            debug!(path = %model.display(), "loading landmark model");
            let predictor = LandmarkPredictor::open(model).map_err(|message| {
                AuthError::Config(format!("failed to load {}: {}", model.display(), message))
            })?;
            Ok(Self {
                models: Mutex::new(Models { detector: FaceDetector::new(), predictor }),
            })
        }
    }

    impl LandmarkDetector for DlibLandmarkDetector {
        fn detect(&self, image: &RgbImage) -> Result<Vec<Face>> {
            let matrix = ImageMatrix::from_image(image);
            let models = self.models.lock();
            let locations = models.detector.face_locations(&matrix);

            let mut faces = Vec::with_capacity(locations.len());
            for rect in locations.iter() {
                let shape = models.predictor.face_landmarks(&matrix, rect);
                let landmarks = shape.iter().map(|p| Point::new(p.x(), p.y())).collect();
                faces.push(Face {
                    bounding_box: BoundingBox {
                        left: rect.left,
                        top: rect.top,
                        right: rect.right,
                        bottom: rect.bottom,
                    },
                    landmarks,
                });
            }
            Ok(faces)
        }
    }
}

#[derive(Debug, Clone)]
pub struct EyeRegions {
    pub left: RgbImage,
    pub right: RgbImage,
}

/// Crops both eyes from the selected face using the landmark eye windows.
pub struct EyeRegionLocator {
    detector: Arc<dyn LandmarkDetector>,
    selection: FaceSelection,
}

impl EyeRegionLocator {
    pub fn new(detector: Arc<dyn LandmarkDetector>, selection: FaceSelection) -> Self {
        Self { detector, selection }
    }

    pub fn locate(&self, image: &RgbImage) -> Result<EyeRegions> {
        let faces = self.detector.detect(image)?;
        let face = select_face(&faces, self.selection).ok_or(AuthError::NoFaceDetected)?;
        debug!(faces = faces.len(), selection = ?self.selection, "selected face");

        if face.landmarks.len() < LANDMARK_COUNT {
            return Err(AuthError::Internal(format!(
                "landmark detector returned {} points, expected {}",
                face.landmarks.len(),
                LANDMARK_COUNT
            )));
        }

        let left = crop_eye(image, &face.landmarks[LEFT_EYE]).ok_or(AuthError::NoFaceDetected)?;
        let right = crop_eye(image, &face.landmarks[RIGHT_EYE]).ok_or(AuthError::NoFaceDetected)?;
        Ok(EyeRegions { left, right })
    }
}

pub fn select_face(faces: &[Face], selection: FaceSelection) -> Option<&Face> {
    match selection {
        FaceSelection::First => faces.first(),
        FaceSelection::Largest => faces.iter().reduce(|best, face| {
            if face.bounding_box.area() > best.bounding_box.area() {
                face
            } else {
                best
            }
        }),
    }
}

/// Crops the inclusive bounding rectangle of `points`, clipped to the image.
/// Returns `None` when nothing of the rectangle lies inside the image.
fn crop_eye(image: &RgbImage, points: &[Point]) -> Option<RgbImage> {
    let min_x = points.iter().map(|p| p.x).min()?.max(0);
    let min_y = points.iter().map(|p| p.y).min()?.max(0);
    let max_x = points.iter().map(|p| p.x).max()?.min(image.width() as i64 - 1);
    let max_y = points.iter().map(|p| p.y).max()?.min(image.height() as i64 - 1);

    if max_x < min_x || max_y < min_y {
        return None;
    }

    let crop = imageops::crop_imm(
        image,
        min_x as u32,
        min_y as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    )
    .to_image();
    Some(crop)
}
