pub mod api;
pub mod core;
pub mod storage;
pub mod utils;

use std::sync::Arc;

use actix_web::web::Data;
use tracing::{error, info};

use crate::{
    api::{ApiState, RestApi},
    core::{
        clock::{Clock, SystemClock},
        identity::BiometricProcessor,
        security::{AuditSink, FanoutAuditSink, MemoryAuditLog, TracingAuditSink},
        services::{HealthService, IrisAuthenticator},
    },
    storage::{EncryptedTemplateStore, IdentityStore, TemplateStore},
    utils::{
        config::Config,
        error::{AuthError, Result},
    },
};

/// How long the in-process audit log keeps records.
const AUDIT_RETENTION_DAYS: i64 = 7;

pub struct Application {
    config: Arc<Config>,
    authenticator: Data<IrisAuthenticator>,
    health: Data<HealthService>,
    store: Arc<EncryptedTemplateStore>,
    audit_log: Arc<MemoryAuditLog>,
}

impl Application {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        info!("Opening template store at {}", config.storage.path);
        let store = Arc::new(
            EncryptedTemplateStore::open(&config.storage.path, config.storage.encryption_key.as_bytes())
                .map_err(AuthError::from)?,
        );

        info!("Loading biometric pipeline ({:?} landmarks)", config.biometric.landmark_backend);
        let processor = Arc::new(BiometricProcessor::from_config(&config.biometric)?);

        let audit_log = Arc::new(MemoryAuditLog::new(
            chrono::Duration::days(AUDIT_RETENTION_DAYS),
            clock.clone(),
        ));
        let audit: Arc<dyn AuditSink> =
            Arc::new(FanoutAuditSink::new(vec![Arc::new(TracingAuditSink)]).with(audit_log.clone()));

        let templates: Arc<dyn TemplateStore> = store.clone();
        let identities: Arc<dyn IdentityStore> = store.clone();
        let authenticator = IrisAuthenticator::new(&config, processor, templates.clone(), audit, clock)?
            .with_identity_store(identities)?;

        Ok(Self {
            config,
            authenticator: Data::new(authenticator),
            health: Data::new(HealthService::new(templates)),
            store,
            audit_log,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn authenticator(&self) -> &IrisAuthenticator {
        &self.authenticator
    }

    pub fn audit_log(&self) -> &Arc<MemoryAuditLog> {
        &self.audit_log
    }

    pub fn api_state(&self) -> ApiState {
        ApiState {
            authenticator: self.authenticator.clone(),
            health: self.health.clone(),
            max_image_bytes: self.config.server.max_image_bytes,
        }
    }

    /// Re-encrypts every stored template and identity under a new secret.
    /// Sessions stay signed with the key derived at startup.
    pub fn rotate_encryption_key(&self, new_secret: &str) -> Result<usize> {
        self.store
            .rotate_encryption_key(new_secret.as_bytes())
            .map_err(AuthError::from)
    }

    pub async fn start(&self) -> Result<()> {
        let api = RestApi::new(self.config.server.host.clone(), self.config.server.port, self.api_state());

        api.start().await.map_err(|e| {
            error!("API server failed: {}", e);
            AuthError::Internal(format!("Failed to run API server: {}", e))
        })?;

        info!("API server stopped");
        Ok(())
    }
}
