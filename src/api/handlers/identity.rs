// src/api/handlers/identity.rs
use actix_web::{
    web::{self, Bytes, Data, Json, Path},
    HttpRequest, HttpResponse, Scope,
};
use tracing::{info, warn};

use super::{bearer, origin};
use crate::{
    api::types::{
        EnrollmentResponse, ErrorResponse, IdentityResponse, LoginRequest, LoginResponse, MatchResponse,
        RegisterRequest, TemplateSummary,
    },
    core::{
        identity::types::{EnrollmentResult, LoginResult, VerificationResult},
        services::IrisAuthenticator,
    },
    utils::error::AuthError,
};

pub fn scope() -> Scope {
    web::scope("/identity")
        .service(web::resource("").route(web::post().to(register_identity)))
        .service(web::resource("/{id}").route(web::get().to(get_identity)))
        .service(web::resource("/{id}/login").route(web::post().to(login)))
        .service(web::resource("/{id}/enroll").route(web::post().to(enroll)))
        .service(web::resource("/{id}/verify").route(web::post().to(verify_identity)))
        .service(web::resource("/{id}/templates").route(web::get().to(template_history)))
}

async fn register_identity(
    service: Data<IrisAuthenticator>,
    request: Json<RegisterRequest>,
) -> Result<HttpResponse, actix_web::Error> {
    let RegisterRequest { identity_id, password } = request.into_inner();
    if identity_id.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: true,
            message: "identity_id must not be empty".into(),
            status_code: 400,
            timestamp: chrono::Utc::now(),
        }));
    }

    info!("Received registration request for identity: {}", identity_id);
    // PBKDF2 runs on the blocking pool.
    let identity = web::block(move || service.register_identity(&identity_id, &password)).await??;

    Ok(HttpResponse::Created().json(IdentityResponse::from(&identity)))
}

async fn get_identity(
    req: HttpRequest,
    service: Data<IrisAuthenticator>,
    id: Path<String>,
) -> Result<HttpResponse, actix_web::Error> {
    service.authorize(&id, &bearer(&req))?;
    let identity = service.identity(&id).ok_or_else(|| {
        warn!("Identity {} not found", id);
        AuthError::UnknownIdentity(id.to_string())
    })?;

    Ok(HttpResponse::Ok().json(IdentityResponse::from(&identity)))
}

async fn login(
    req: HttpRequest,
    service: Data<IrisAuthenticator>,
    id: Path<String>,
    request: Json<LoginRequest>,
) -> Result<HttpResponse, actix_web::Error> {
    let origin = origin(&req);
    let id = id.into_inner();
    let password = request.into_inner().password;

    let outcome = web::block(move || service.authenticate_password(&id, &password, origin)).await??;

    match outcome {
        LoginResult::Authenticated { identity_id, session } => Ok(HttpResponse::Ok().json(LoginResponse {
            identity_id,
            authenticated: true,
            token: session.token,
            expires_at: session.expires_at,
        })),
        LoginResult::InvalidCredentials => Err(AuthError::InvalidCredentials.into()),
        LoginResult::Rejected { reason } => Err(reason.into()),
    }
}

async fn enroll(
    req: HttpRequest,
    service: Data<IrisAuthenticator>,
    id: Path<String>,
    body: Bytes,
) -> Result<HttpResponse, actix_web::Error> {
    let origin = origin(&req);
    let token = bearer(&req);
    let id = id.into_inner();
    info!("Received enrollment request for identity {} ({} bytes)", id, body.len());

    let outcome = web::block(move || service.enroll(&id, &token, &body, origin)).await??;

    match outcome {
        EnrollmentResult::Accepted { template_id, quality } => {
            Ok(HttpResponse::Ok().json(EnrollmentResponse { template_id, quality }))
        }
        EnrollmentResult::Rejected { reason } => Err(reason.into()),
    }
}

async fn verify_identity(
    req: HttpRequest,
    service: Data<IrisAuthenticator>,
    id: Path<String>,
    body: Bytes,
) -> Result<HttpResponse, actix_web::Error> {
    let origin = origin(&req);
    let id = id.into_inner();

    let outcome = web::block(move || service.verify_identity(&id, &body, origin)).await??;
    verification_response(outcome)
}

async fn template_history(
    req: HttpRequest,
    service: Data<IrisAuthenticator>,
    id: Path<String>,
) -> Result<HttpResponse, actix_web::Error> {
    service.authorize(&id, &bearer(&req))?;
    if service.identity(&id).is_none() {
        return Err(AuthError::UnknownIdentity(id.to_string()).into());
    }

    let id = id.into_inner();
    let history = web::block(move || service.store().template_history(&id)).await??;
    let summaries: Vec<TemplateSummary> = history.iter().map(TemplateSummary::from).collect();

    Ok(HttpResponse::Ok().json(summaries))
}

pub(super) fn verification_response(outcome: VerificationResult) -> Result<HttpResponse, actix_web::Error> {
    match outcome {
        VerificationResult::Matched { identity_id, score, session } => Ok(HttpResponse::Ok().json(MatchResponse {
            identity_id,
            score,
            token: session.token,
            expires_at: session.expires_at,
        })),
        VerificationResult::NoMatch => Err(AuthError::NoMatch.into()),
        VerificationResult::Rejected { reason } => Err(reason.into()),
    }
}
