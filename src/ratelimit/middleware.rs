//! Rate limiting middleware

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::common::caller::caller_identity;
use crate::relay::types::ErrorResponse;

use super::{Decision, RateLimiter};

/// Paths served without counting against the caller's limit
const EXEMPT_PATHS: &[&str] = &["/health", "/terms", "/privacy"];

/// Rate limiting shared state
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
}

impl RateLimitState {
    pub fn new(limiter: RateLimiter) -> Self {
        Self {
            limiter: Arc::new(limiter),
        }
    }
}

/// Reject callers over their request budget with 429
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if EXEMPT_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    // Unidentifiable callers are let through
    let Some(identity) = caller_identity(&request) else {
        return next.run(request).await;
    };

    match state.limiter.check(&identity) {
        Decision::Allowed => next.run(request).await,
        Decision::Limited { retry_after } => {
            tracing::warn!("Rate limit exceeded for {}", identity);
            let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorResponse::new(
                    "rate_limited",
                    format!("Too many requests, retry in {} seconds", secs),
                )),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            response
        }
    }
}
