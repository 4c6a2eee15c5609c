// src/api/rest.rs
use actix_web::{
    dev::Service as _,
    middleware::DefaultHeaders,
    web::{self, Data},
    App, HttpServer,
};
use tracing::{error, info};

use super::handlers;
use crate::core::services::{HealthService, IrisAuthenticator};

/// Shared handles injected into every worker's `App`.
#[derive(Clone)]
pub struct ApiState {
    pub authenticator: Data<IrisAuthenticator>,
    pub health: Data<HealthService>,
    pub max_image_bytes: usize,
}

impl ApiState {
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.authenticator.clone())
            .app_data(self.health.clone())
            .app_data(web::PayloadConfig::new(self.max_image_bytes))
            .service(handlers::identity::scope())
            .configure(handlers::verification::configure);
    }
}

pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("Referrer-Policy", "no-referrer"))
        .add(("Cache-Control", "no-store"))
}

pub struct RestApi {
    host: String,
    port: u16,
    state: ApiState,
}

impl RestApi {
    pub fn new(host: impl Into<String>, port: u16, state: ApiState) -> Self {
        Self { host: host.into(), port, state }
    }

    pub async fn start(&self) -> std::io::Result<()> {
        let state = self.state.clone();

        info!("Starting API server on {}:{}", self.host, self.port);
        let server = HttpServer::new(move || {
            let health = state.health.clone();
            App::new()
                .wrap(security_headers())
                .wrap_fn(move |req, srv| {
                    health.record_request();
                    srv.call(req)
                })
                .configure(|cfg| state.configure(cfg))
        })
        .bind((self.host.as_str(), self.port))?
        .disable_signals()
        .run();

        let handle = server.handle();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    handle.stop(true).await;
                }
                Err(err) => error!("Failed to listen for shutdown signal: {}", err),
            }
        });

        server.await
    }
}
