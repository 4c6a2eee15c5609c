use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use config::{Config as ConfigLib, ConfigError, Environment, File};
use crate::utils::error::{Result, AuthError};

/// Upper bound for every configured policy duration (30 days).
pub const MAX_POLICY_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub biometric: BiometricConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_dir: String,
    pub max_image_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub path: String,
    pub encryption_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceSelection {
    First,
    Largest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircleSelection {
    First,
    Largest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicyKind {
    First,
    Best,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkBackend {
    Fixed,
    Dlib,
}

/// Pixel rectangle, inclusive of `x + width - 1` / `y + height - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EyeBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BiometricConfig {
    pub match_threshold: f64,
    pub quality_threshold: f64,
    pub face_selection: FaceSelection,
    pub circle_selection: CircleSelection,
    pub match_policy: MatchPolicyKind,
    pub best_match_margin: f64,
    pub landmark_backend: LandmarkBackend,
    pub left_eye: EyeBox,
    pub right_eye: EyeBox,
    pub landmark_model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub lockout_attempt_limit: u32,
    pub lockout_duration_secs: u64,
    pub reset_counter_on_expiry: bool,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max_attempts: u32,
    pub rate_limit_cleanup_interval: u64,
    pub credential_iterations: u32,
    pub min_password_length: usize,
    pub session_ttl_secs: u64,
}

impl SecurityConfig {
    pub fn lockout_duration(&self) -> Result<chrono::Duration> {
        policy_duration("lockout_duration_secs", self.lockout_duration_secs)
    }

    pub fn rate_limit_window(&self) -> Result<chrono::Duration> {
        policy_duration("rate_limit_window_secs", self.rate_limit_window_secs)
    }

    pub fn session_ttl(&self) -> Result<chrono::Duration> {
        policy_duration("session_ttl_secs", self.session_ttl_secs)
    }
}

fn policy_duration(name: &str, secs: u64) -> Result<chrono::Duration> {
    if secs == 0 || secs > MAX_POLICY_DURATION_SECS {
        return Err(AuthError::Config(format!(
            "{} must be within [1, {}]",
            name, MAX_POLICY_DURATION_SECS
        )));
    }
    chrono::Duration::from_std(Duration::from_secs(secs))
        .map_err(|e| AuthError::Config(format!("{} out of range: {}", name, e)))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                log_level: "info".to_string(),
                log_dir: "logs".to_string(),
                max_image_bytes: 16 * 1024 * 1024,
            },
            storage: StorageConfig {
                path: "data/templates".to_string(),
                encryption_key: String::new(),
            },
            biometric: BiometricConfig {
                match_threshold: 0.8,
                quality_threshold: 0.7,
                face_selection: FaceSelection::First,
                circle_selection: CircleSelection::First,
                match_policy: MatchPolicyKind::First,
                best_match_margin: 0.0,
                landmark_backend: LandmarkBackend::Fixed,
                left_eye: EyeBox { x: 20, y: 20, width: 61, height: 61 },
                right_eye: EyeBox { x: 120, y: 20, width: 61, height: 61 },
                landmark_model: None,
            },
            security: SecurityConfig {
                lockout_attempt_limit: 5,
                lockout_duration_secs: 30 * 60,
                reset_counter_on_expiry: false,
                rate_limit_window_secs: 3600,
                rate_limit_max_attempts: 5,
                rate_limit_cleanup_interval: 100,
                credential_iterations: 100_000,
                min_password_length: 8,
                session_ttl_secs: 15 * 60,
            },
        }
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        Self::load(None)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(Some(path.as_ref()))
    }

    fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigLib::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.log_level", "info")?
            .set_default("server.log_dir", "logs")?
            .set_default("server.max_image_bytes", 16_777_216)?  // 16MB
            .set_default("storage.path", "data/templates")?
            .set_default("biometric.match_threshold", 0.8)?
            .set_default("biometric.quality_threshold", 0.7)?
            .set_default("biometric.face_selection", "first")?
            .set_default("biometric.circle_selection", "first")?
            .set_default("biometric.match_policy", "first")?
            .set_default("biometric.best_match_margin", 0.0)?
            .set_default("biometric.landmark_backend", "fixed")?
            .set_default("biometric.left_eye.x", 20)?
            .set_default("biometric.left_eye.y", 20)?
            .set_default("biometric.left_eye.width", 61)?
            .set_default("biometric.left_eye.height", 61)?
            .set_default("biometric.right_eye.x", 120)?
            .set_default("biometric.right_eye.y", 20)?
            .set_default("biometric.right_eye.width", 61)?
            .set_default("biometric.right_eye.height", 61)?
            .set_default("security.lockout_attempt_limit", 5)?
            .set_default("security.lockout_duration_secs", 1800)?
            .set_default("security.reset_counter_on_expiry", false)?
            .set_default("security.rate_limit_window_secs", 3600)?
            .set_default("security.rate_limit_max_attempts", 5)?
            .set_default("security.rate_limit_cleanup_interval", 100)?
            .set_default("security.credential_iterations", 100_000)?
            .set_default("security.min_password_length", 8)?
            .set_default("security.session_ttl_secs", 900)?;

        builder = match explicit {
            Some(path) => builder.add_source(File::from(path)),
            None => builder
                .add_source(File::with_name("config/default").required(false))
                .add_source(File::with_name("config/local").required(false)),
        };

        // Override with environment variables (e.g., APP__SECURITY__RATE_LIMIT_WINDOW_SECS)
        let config = builder
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AuthError::Config("Invalid port number".into()));
        }
        if self.server.max_image_bytes == 0 {
            return Err(AuthError::Config("max_image_bytes must be greater than 0".into()));
        }

        if self.storage.encryption_key.is_empty() {
            return Err(AuthError::Config("encryption_key must be set".into()));
        }

        for (name, value) in [
            ("match_threshold", self.biometric.match_threshold),
            ("quality_threshold", self.biometric.quality_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AuthError::Config(format!("{} must be within [0, 1]", name)));
            }
        }
        if self.biometric.best_match_margin < 0.0 {
            return Err(AuthError::Config("best_match_margin must not be negative".into()));
        }
        if self.biometric.landmark_backend == LandmarkBackend::Dlib
            && self.biometric.landmark_model.is_none()
        {
            return Err(AuthError::Config("landmark_model must be set for the dlib backend".into()));
        }

        if self.security.lockout_attempt_limit == 0 {
            return Err(AuthError::Config("lockout_attempt_limit must be greater than 0".into()));
        }
        if self.security.rate_limit_max_attempts == 0 {
            return Err(AuthError::Config("rate_limit_max_attempts must be greater than 0".into()));
        }
        self.security.lockout_duration()?;
        self.security.rate_limit_window()?;
        self.security.session_ttl()?;
        if self.security.credential_iterations == 0 {
            return Err(AuthError::Config("credential_iterations must be greater than 0".into()));
        }

        Ok(())
    }

    pub fn get_lockout_duration(&self) -> Duration {
        Duration::from_secs(self.security.lockout_duration_secs)
    }

    pub fn get_rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.security.rate_limit_window_secs)
    }
}

impl From<ConfigError> for AuthError {
    fn from(error: ConfigError) -> Self {
        AuthError::Config(error.to_string())
    }
}
