// src/api/handlers/mod.rs
use std::net::{IpAddr, Ipv4Addr};

use actix_web::{http::header, HttpRequest};

pub mod identity;
pub mod verification;

/// Peer address of the connection. Forwarding headers are not trusted.
/// Requests without a peer address share one unspecified-address bucket.
pub(crate) fn origin(req: &HttpRequest) -> IpAddr {
    req.peer_addr()
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Session token from `Authorization: Bearer <token>`, empty when absent.
pub(crate) fn bearer(req: &HttpRequest) -> String {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .unwrap_or_default()
}
