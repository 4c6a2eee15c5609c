// tests/common/mod.rs
#![allow(dead_code)]

use std::io::Cursor;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use biolock::{
    core::{
        clock::{Clock, ManualClock},
        identity::{BiometricProcessor, BiometricTemplate, EnrollmentResult, FeatureVector},
        security::{AuditSink, MemoryAuditLog},
        services::IrisAuthenticator,
    },
    storage::{MemoryTemplateStore, TemplateStore},
    utils::{config::Config, error::Result},
    Application,
};
use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use tempfile::TempDir;

pub const PASSWORD: &str = "Iris#Secure1";
pub const WRONG_PASSWORD: &str = "Wrong#Pass1";

pub fn encode_png(image: RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

/// Two bright discs of radius 20, centred inside the default eye boxes.
pub fn two_eyes_png() -> Vec<u8> {
    two_eyes_png_with_radius(20.0)
}

/// Same layout as `two_eyes_png` with discs of another radius. Radii the
/// circle search accepts and the eye boxes hold run from 10 to 30.
pub fn two_eyes_png_with_radius(radius: f64) -> Vec<u8> {
    encode_png(RgbImage::from_fn(200, 100, |x, y| {
        let inside = |cx: f64| (x as f64 - cx).powi(2) + (y as f64 - 50.0).powi(2) <= radius * radius;
        if inside(50.0) || inside(150.0) {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    }))
}

/// Uniform image: a face is located but no iris can be found.
pub fn flat_png() -> Vec<u8> {
    encode_png(RgbImage::from_pixel(200, 100, Rgb([128, 128, 128])))
}

pub fn origin(last: u8) -> IpAddr {
    IpAddr::from([10, 0, 0, last])
}

pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.path = dir.path().join("templates").to_string_lossy().into_owned();
    config.storage.encryption_key = "integration-secret".into();
    config.security.credential_iterations = 1_000;
    config.security.rate_limit_max_attempts = 100;
    config
}

pub fn features_of(image: &[u8]) -> FeatureVector {
    BiometricProcessor::from_config(&Config::default().biometric)
        .unwrap()
        .process(image)
        .unwrap()
        .features
}

pub struct TestContext {
    pub app: Application,
    pub clock: Arc<ManualClock>,
    pub config: Config,
    pub dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir);
        adjust(&mut config);
        let clock = Arc::new(ManualClock::default());
        let app = Application::with_clock(config.clone(), clock.clone()).unwrap();
        Self { app, clock, config, dir }
    }

    pub fn auth(&self) -> &IrisAuthenticator {
        self.app.authenticator()
    }

    pub fn audit(&self) -> &Arc<MemoryAuditLog> {
        self.app.audit_log()
    }

    pub fn register(&self, id: &str) {
        self.auth().register_identity(id, PASSWORD).unwrap();
    }

    /// Session for `id`, signed with the application's key.
    pub fn token(&self, id: &str) -> String {
        self.auth().sessions().issue(id, self.clock.now()).unwrap().token
    }

    pub fn enroll(&self, id: &str, image: &[u8]) -> EnrollmentResult {
        self.auth().enroll(id, &self.token(id), image, origin(200)).unwrap()
    }
}

/// Counts full scans of the active template set.
#[derive(Default)]
pub struct ScanCountingStore {
    inner: MemoryTemplateStore,
    scans: AtomicUsize,
}

impl ScanCountingStore {
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

impl TemplateStore for ScanCountingStore {
    fn get_active_templates(&self) -> Result<Vec<BiometricTemplate>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        self.inner.get_active_templates()
    }

    fn get_active_template(&self, identity_id: &str) -> Result<Option<BiometricTemplate>> {
        self.inner.get_active_template(identity_id)
    }

    fn replace_active_template(
        &self,
        identity_id: &str,
        features: FeatureVector,
        quality: f64,
        captured_at: DateTime<Utc>,
    ) -> Result<BiometricTemplate> {
        self.inner.replace_active_template(identity_id, features, quality, captured_at)
    }

    fn template_history(&self, identity_id: &str) -> Result<Vec<BiometricTemplate>> {
        self.inner.template_history(identity_id)
    }

    fn count_active(&self) -> Result<usize> {
        self.inner.count_active()
    }
}

/// Authenticator over an arbitrary store, outside of `Application`.
pub fn authenticator_with(store: Arc<dyn TemplateStore>) -> (IrisAuthenticator, Arc<MemoryAuditLog>) {
    let mut config = Config::default();
    config.security.credential_iterations = 1_000;
    config.security.rate_limit_max_attempts = 100;
    config.storage.encryption_key = "integration-secret".into();

    let clock = Arc::new(ManualClock::default());
    let audit = Arc::new(MemoryAuditLog::new(chrono::Duration::days(1), clock.clone()));
    let sink: Arc<dyn AuditSink> = audit.clone();
    let processor = Arc::new(BiometricProcessor::from_config(&config.biometric).unwrap());
    let auth = IrisAuthenticator::new(&config, processor, store, sink, clock).unwrap();
    (auth, audit)
}
