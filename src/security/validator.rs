//! Request validation against the live configuration.
//!
//! # Responsibilities
//! - Host header check (optional)
//! - Allowed methods
//! - restrict-paths, exclude-paths, forward-paths
//! - conditional-http-service rules
//!
//! # Design Decisions
//! - Stages run in a fixed order and the first decisive one wins
//! - Pure function of the snapshot and request; no I/O
//! - Loopback hosts get no exemption from the Host check

use axum::http::HeaderMap;

use crate::config::schema::{ConfigSnapshot, ERROR_SENTINEL};
use crate::observability::metrics;
use crate::security::conditional;

/// The parts of a request the validator looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    pub method: &'a str,
    /// Raw Host header, possibly with a port.
    pub host: &'a str,
    pub path: &'a str,
    /// Raw query string without the leading `?`.
    pub query: &'a str,
    /// Peer address as `ip:port`.
    pub remote_addr: &'a str,
    pub headers: &'a HeaderMap,
}

/// Receives the redirect issued by a matching forward-paths rule.
pub trait RedirectSink {
    fn redirect(&mut self, location: &str, status: u16);
}

/// A sink that remembers the redirect for the caller to act on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedRedirect {
    pub location: Option<String>,
    pub status: Option<u16>,
}

impl RedirectSink for RecordedRedirect {
    fn redirect(&mut self, location: &str, status: u16) {
        self.location = Some(location.to_string());
        self.status = Some(status);
    }
}

/// Allow/deny decision. `status_code` is zero when allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    pub status_code: u16,
}

impl Verdict {
    pub const ALLOW: Verdict = Verdict {
        allowed: true,
        status_code: 0,
    };

    pub const fn deny(status_code: u16) -> Self {
        Self {
            allowed: false,
            status_code,
        }
    }
}

pub const STATUS_UNAUTHORIZED: u16 = 401;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_METHOD_NOT_ALLOWED: u16 = 405;
pub const STATUS_TEMPORARY_REDIRECT: u16 = 307;
pub const STATUS_BAD_GATEWAY: u16 = 502;

/// Runs the validation pipeline.
pub fn validate_request(
    config: &ConfigSnapshot,
    request: &RequestView<'_>,
    sink: &mut dyn RedirectSink,
) -> Verdict {
    let verdict = evaluate(config, request, sink);
    if !verdict.allowed {
        tracing::debug!(
            method = %request.method,
            path = %request.path,
            status = verdict.status_code,
            "Request denied"
        );
    }
    metrics::record_verdict(&verdict);
    verdict
}

fn evaluate(config: &ConfigSnapshot, request: &RequestView<'_>, sink: &mut dyn RedirectSink) -> Verdict {
    // 1. Host header
    if config.validate_remote_host && !config.site.hostname.is_empty() {
        let host = request_host(request.host).to_lowercase();
        if !config.site.answers_to(&host) {
            return Verdict::deny(STATUS_BAD_GATEWAY);
        }
    }

    // 2. Method
    if !config.http.allowed_methods.iter().any(|m| m == request.method) {
        return Verdict::deny(STATUS_METHOD_NOT_ALLOWED);
    }

    let path = request.path.to_lowercase();

    // 3. restrict-paths
    if path_listed(&config.url_paths.restrict, &path) {
        return Verdict::deny(STATUS_UNAUTHORIZED);
    }

    // 4. exclude-paths
    if path_listed(&config.url_paths.exclude, &path) {
        return Verdict::deny(STATUS_NOT_FOUND);
    }

    // 5. forward-paths
    if let Some(rule) = config
        .url_paths
        .forward
        .iter()
        .filter(|r| r.is_valid())
        .find(|r| r.from.to_lowercase() == path)
    {
        sink.redirect(&rule.to, STATUS_TEMPORARY_REDIRECT);
        return Verdict::deny(STATUS_TEMPORARY_REDIRECT);
    }

    // 6. conditional-http-service
    conditional::evaluate(&config.url_paths.conditional, request).unwrap_or(Verdict::ALLOW)
}

fn path_listed(entries: &[String], path: &str) -> bool {
    entries
        .iter()
        .filter(|e| !e.starts_with(ERROR_SENTINEL))
        .any(|e| e.to_lowercase() == path)
}

/// Host header without its port.
pub fn request_host(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split(':').next().unwrap_or_default()
}
