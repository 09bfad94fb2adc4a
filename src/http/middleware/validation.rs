//! Request gate middleware.
//!
//! Runs before any file is served. Blocked peers and maintenance windows are
//! answered here; everything else goes through the validator against the
//! snapshot current at the time the request arrived.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::config::ConfigStore;
use crate::security::{validate_request, RecordedRedirect, RequestView};

pub async fn validation_middleware(
    State(store): State<Arc<ConfigStore>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let snapshot = store.snapshot();

    let peer_ip = peer.ip().to_string();
    if snapshot.is_blocked(&peer_ip) {
        tracing::warn!(peer = %peer_ip, path = %request.uri().path(), "Blocked address refused");
        return StatusCode::FORBIDDEN.into_response();
    }

    if snapshot.maintenance_window_on {
        return (StatusCode::SERVICE_UNAVAILABLE, "Down for maintenance").into_response();
    }

    let mut redirect = RecordedRedirect::default();
    let verdict = {
        let remote_addr = peer.to_string();
        let host = request
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| request.uri().host())
            .unwrap_or_default();
        let view = RequestView {
            method: request.method().as_str(),
            host,
            path: request.uri().path(),
            query: request.uri().query().unwrap_or_default(),
            remote_addr: &remote_addr,
            headers: request.headers(),
        };
        validate_request(&snapshot, &view, &mut redirect)
    };

    if verdict.allowed {
        return next.run(request).await;
    }

    if let Some(location) = redirect.location {
        return Redirect::temporary(&location).into_response();
    }

    StatusCode::from_u16(verdict.status_code)
        .unwrap_or(StatusCode::NOT_FOUND)
        .into_response()
}
