//! Request spans for the HTTP trace layer

use axum::{body::Body, http::Request};
use tracing::Span;

use super::fingerprint;

/// Path prefixes whose next segment is a correlation key
const KEYED_PREFIXES: &[&str] = &["/token/", "/status/"];

/// Request path safe to log
///
/// The correlation key segment is replaced by its fingerprint. The query
/// string never reaches this function, so `/callback?code=...` logs as
/// `/callback`.
pub fn redact_path(path: &str) -> String {
    for prefix in KEYED_PREFIXES {
        if let Some(key) = path.strip_prefix(prefix) {
            if key.is_empty() {
                return path.to_string();
            }
            return format!("{}{}", prefix, fingerprint(key));
        }
    }
    path.to_string()
}

/// Span for one HTTP request: method, redacted path and version only
pub fn make_request_span(request: &Request<Body>) -> Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        path = %redact_path(request.uri().path()),
        version = ?request.version(),
    )
}
