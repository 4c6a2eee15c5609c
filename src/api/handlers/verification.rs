// src/api/handlers/verification.rs
use actix_web::{
    web::{self, Bytes, Data},
    HttpRequest, HttpResponse,
};
use tracing::debug;

use super::{identity::verification_response, origin};
use crate::core::services::{HealthService, IrisAuthenticator};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/verify").route(web::post().to(verify)))
        .service(web::resource("/health").route(web::get().to(health)));
}

async fn verify(
    req: HttpRequest,
    service: Data<IrisAuthenticator>,
    body: Bytes,
) -> Result<HttpResponse, actix_web::Error> {
    let origin = origin(&req);
    debug!("Received verification request from {} ({} bytes)", origin, body.len());

    let outcome = web::block(move || service.verify(&body, origin)).await??;
    verification_response(outcome)
}

async fn health(service: Data<HealthService>) -> Result<HttpResponse, actix_web::Error> {
    let metrics = web::block(move || service.get_metrics()).await?;
    Ok(HttpResponse::Ok().json(metrics))
}
