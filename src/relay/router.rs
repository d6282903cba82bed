//! Relay Router
//!
//! Browser-facing `/callback` plus the JSON polling endpoints used by the CLI

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;

use crate::common::fingerprint;
use crate::model::config::OAuthClient;

use super::controller::TokenLifecycle;
use super::error::CallbackError;
use super::exchange::TokenExchanger;
use super::templates::render_success_page;
use super::types::{
    ErrorResponse, HealthResponse, PendingResponse, StatusResponse, TokenResponse, TokenStatus,
};

/// Relay state for handlers
#[derive(Clone)]
pub struct RelayState {
    pub lifecycle: Arc<TokenLifecycle>,
    pub exchanger: Arc<dyn TokenExchanger>,
    /// `None` when the server has no client credentials configured
    pub client: Option<OAuthClient>,
}

/// Create relay router
///
/// # Endpoints
/// - `GET /health` - Liveness check
/// - `GET /callback` - OAuth redirect target, exchanges the code and stores the token
/// - `GET /status/{state}` - Token status without consuming it
/// - `GET /token/{state}` - One-time token retrieval
pub fn create_relay_router(state: RelayState) -> Router {
    Router::new()
        .route("/health", get(handle_health).fallback(json_method_not_allowed))
        .route("/callback", get(handle_callback).fallback(method_not_allowed))
        .route("/status/", get(handle_missing_state).fallback(json_method_not_allowed))
        .route("/status/{state}", get(handle_status).fallback(json_method_not_allowed))
        .route("/token/", get(handle_missing_state).fallback(json_method_not_allowed))
        .route("/token/{state}", get(handle_token).fallback(json_method_not_allowed))
        .with_state(state)
}

/// Query parameters of the provider redirect
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Handle health check (GET /health)
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

/// Handle provider redirect (GET /callback)
async fn handle_callback(
    State(state): State<RelayState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    match complete_callback(&state, params).await {
        Ok(correlation_key) => Html(render_success_page(&correlation_key)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Validate the redirect, exchange the code and store the resulting record
async fn complete_callback(
    state: &RelayState,
    params: CallbackParams,
) -> Result<String, CallbackError> {
    if let Some(error) = present(params.error) {
        tracing::warn!("OAuth provider returned error: {}", error);
        return Err(CallbackError::ProviderDenied {
            error,
            description: params.error_description,
        });
    }

    let code = present(params.code).ok_or(CallbackError::MissingCode)?;
    let correlation_key = present(params.state).ok_or(CallbackError::MissingState)?;

    let Some(client) = state.client.as_ref() else {
        tracing::error!("Callback received but client ID / secret are not configured");
        return Err(CallbackError::MissingClientCredentials);
    };

    let tokens = state.exchanger.exchange(&code, client).await.map_err(|e| {
        tracing::error!(
            state = %fingerprint(&correlation_key),
            "Token exchange failed: {}",
            e
        );
        CallbackError::ExchangeFailed(e)
    })?;

    let record = tokens.into_record(Utc::now()).map_err(|e| {
        tracing::error!(
            state = %fingerprint(&correlation_key),
            "Unusable token response: {}",
            e
        );
        CallbackError::ExchangeFailed(e)
    })?;
    state
        .lifecycle
        .store(&correlation_key, &record)
        .await
        .map_err(|e| {
            tracing::error!(
                state = %fingerprint(&correlation_key),
                "Failed to store token: {}",
                e
            );
            CallbackError::StoreFailed(e)
        })?;

    tracing::info!(state = %fingerprint(&correlation_key), "Token stored");
    Ok(correlation_key)
}

/// Handle status polling (GET /status/{state})
async fn handle_status(
    State(state): State<RelayState>,
    Path(correlation_key): Path<String>,
) -> Json<StatusResponse> {
    let status = state.lifecycle.status(&correlation_key).await;
    Json(StatusResponse { status })
}

/// Handle one-time retrieval (GET /token/{state})
async fn handle_token(
    State(state): State<RelayState>,
    Path(correlation_key): Path<String>,
) -> Response {
    let (record, status) = state.lifecycle.consume(&correlation_key).await;

    match (record, status) {
        (Some(record), TokenStatus::Ready) => Json(TokenResponse::from(record)).into_response(),
        (_, TokenStatus::Pending) => (
            StatusCode::ACCEPTED,
            Json(PendingResponse {
                status: TokenStatus::Pending,
                message: "Token not yet available, please try again".to_string(),
            }),
        )
            .into_response(),
        (_, TokenStatus::Consumed) => (
            StatusCode::GONE,
            Json(ErrorResponse::new(
                "consumed",
                "Token has already been retrieved",
            )),
        )
            .into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("not_found", "Token not found or expired")),
        )
            .into_response(),
    }
}

/// GET /status/ and GET /token/ without a state segment
async fn handle_missing_state() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::bare("Missing state parameter")),
    )
        .into_response()
}

async fn json_method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorResponse::bare("Method not allowed")),
    )
        .into_response()
}

async fn method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use parking_lot::Mutex;
    use tower::ServiceExt;

    use std::time::Duration;

    use crate::relay::controller::TOKEN_TTL_SECS;
    use crate::relay::exchange::{ExchangeError, ProviderTokens};
    use crate::relay::types::TokenRecord;
    use crate::store::MemoryStore;

    /// Exchanger that answers from a canned result and records the codes it saw
    struct FakeExchanger {
        result: Mutex<Option<Result<ProviderTokens, ExchangeError>>>,
        codes: Mutex<Vec<String>>,
    }

    impl FakeExchanger {
        fn returning(result: Result<ProviderTokens, ExchangeError>) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(Some(result)),
                codes: Mutex::new(Vec::new()),
            })
        }

        fn tokens(access_token: &str) -> Arc<Self> {
            Self::returning(Ok(ProviderTokens {
                access_token: access_token.to_string(),
                refresh_token: Some("refresh".to_string()),
                token_type: None,
                expires_in: Some(3600),
            }))
        }
    }

    #[async_trait]
    impl TokenExchanger for FakeExchanger {
        async fn exchange(
            &self,
            code: &str,
            _client: &OAuthClient,
        ) -> Result<ProviderTokens, ExchangeError> {
            self.codes.lock().push(code.to_string());
            self.result
                .lock()
                .take()
                .unwrap_or_else(|| Err(ExchangeError::InvalidResponse("code reused".to_string())))
        }
    }

    fn oauth_client() -> OAuthClient {
        OAuthClient {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:8080/callback".to_string(),
        }
    }

    fn relay(exchanger: Arc<FakeExchanger>, client: Option<OAuthClient>) -> (RelayState, Router) {
        let lifecycle = Arc::new(TokenLifecycle::with_ttl(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(TOKEN_TTL_SECS),
        ));
        let state = RelayState {
            lifecycle,
            exchanger,
            client,
        };
        let router = create_relay_router(state.clone());
        (state, router)
    }

    async fn send(router: &Router, method: &str, uri: &str) -> (StatusCode, String) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn json(body: &str) -> serde_json::Value {
        serde_json::from_str(body).unwrap()
    }

    fn ready_record(access_token: &str) -> TokenRecord {
        ProviderTokens {
            access_token: access_token.to_string(),
            refresh_token: None,
            token_type: None,
            expires_in: Some(3600),
        }
        .into_record(Utc::now())
        .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_, router) = relay(FakeExchanger::tokens("tok"), None);
        let (status, body) = send(&router, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        let body = json(&body);
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_non_get_is_method_not_allowed() {
        let (_, router) = relay(FakeExchanger::tokens("tok"), None);
        for uri in ["/health", "/callback", "/status/abc", "/token/abc"] {
            let (status, _) = send(&router, "POST", uri).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "POST {}", uri);
        }
        let (_, body) = send(&router, "DELETE", "/token/abc").await;
        assert_eq!(json(&body)["error"], "Method not allowed");
    }

    #[tokio::test]
    async fn test_token_not_found() {
        let (_, router) = relay(FakeExchanger::tokens("tok"), None);
        let (status, body) = send(&router, "GET", "/token/nonexistent").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json(&body)["error"], "not_found");
    }

    #[tokio::test]
    async fn test_token_ready_then_consumed() {
        let (state, router) = relay(FakeExchanger::tokens("tok"), None);
        state.lifecycle.store("s1", &ready_record("tok")).await.unwrap();

        let (status, body) = send(&router, "GET", "/token/s1").await;
        assert_eq!(status, StatusCode::OK);
        let body = json(&body);
        assert_eq!(body["access_token"], "tok");
        assert_eq!(body["refresh_token"], "");
        assert_eq!(body["token_type"], "Bearer");
        assert!(body["expiry"].is_string());
        assert!(body.get("consumed").is_none());

        let (status, body) = send(&router, "GET", "/token/s1").await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(json(&body)["error"], "consumed");
    }

    #[tokio::test]
    async fn test_token_pending() {
        let (state, router) = relay(FakeExchanger::tokens("tok"), None);
        state.lifecycle.store("p", &ready_record("")).await.unwrap();

        let (status, body) = send(&router, "GET", "/token/p").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json(&body)["status"], "pending");
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let (state, router) = relay(FakeExchanger::tokens("tok"), None);

        let (status, body) = send(&router, "GET", "/status/s2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["status"], "not_found");

        state.lifecycle.store("s2", &ready_record("tok")).await.unwrap();
        let (_, body) = send(&router, "GET", "/status/s2").await;
        assert_eq!(json(&body)["status"], "ready");

        // Status checks never consume
        let (_, body) = send(&router, "GET", "/status/s2").await;
        assert_eq!(json(&body)["status"], "ready");

        send(&router, "GET", "/token/s2").await;
        let (_, body) = send(&router, "GET", "/status/s2").await;
        assert_eq!(json(&body)["status"], "consumed");
    }

    #[tokio::test]
    async fn test_missing_state_segment() {
        let (_, router) = relay(FakeExchanger::tokens("tok"), None);
        for uri in ["/token/", "/status/"] {
            let (status, body) = send(&router, "GET", uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json(&body)["error"], "Missing state parameter");
        }
    }

    #[tokio::test]
    async fn test_callback_missing_code() {
        let exchanger = FakeExchanger::tokens("tok");
        let (_, router) = relay(exchanger.clone(), Some(oauth_client()));
        let (status, body) = send(&router, "GET", "/callback?state=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Missing authorization code"));
        assert!(exchanger.codes.lock().is_empty());
    }

    #[tokio::test]
    async fn test_callback_missing_state() {
        let (_, router) = relay(FakeExchanger::tokens("tok"), Some(oauth_client()));
        let (status, body) = send(&router, "GET", "/callback?code=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Missing state parameter"));
    }

    #[tokio::test]
    async fn test_callback_provider_error() {
        let exchanger = FakeExchanger::tokens("tok");
        let (state, router) = relay(exchanger.clone(), Some(oauth_client()));
        let (status, body) = send(
            &router,
            "GET",
            "/callback?error=access_denied&error_description=User%20declined&state=s3",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("access_denied"));
        assert!(body.contains("User declined"));
        assert!(exchanger.codes.lock().is_empty());
        assert_eq!(state.lifecycle.status("s3").await, TokenStatus::NotFound);
    }

    #[tokio::test]
    async fn test_callback_without_client_credentials() {
        let exchanger = FakeExchanger::tokens("tok");
        let (state, router) = relay(exchanger.clone(), None);
        let (status, body) = send(&router, "GET", "/callback?code=c&state=s4").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("missing OAuth credentials"));
        assert!(exchanger.codes.lock().is_empty());
        assert_eq!(state.lifecycle.status("s4").await, TokenStatus::NotFound);
    }

    #[tokio::test]
    async fn test_callback_exchange_failure_stores_nothing() {
        let exchanger = FakeExchanger::returning(Err(ExchangeError::Rejected {
            status: 400,
            body: r#"{"error":"invalid_grant"}"#.to_string(),
        }));
        let (state, router) = relay(exchanger, Some(oauth_client()));
        let (status, body) = send(&router, "GET", "/callback?code=bad&state=s5").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("Failed to exchange authorization code for token"));
        assert!(!body.contains("invalid_grant"));
        assert_eq!(state.lifecycle.status("s5").await, TokenStatus::NotFound);
    }

    #[tokio::test]
    async fn test_callback_huge_expires_in_from_provider() {
        use crate::relay::exchange::HttpTokenExchanger;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "a",
                "expires_in": 9223372036854775807i64
            })))
            .mount(&server)
            .await;

        let state = RelayState {
            lifecycle: Arc::new(TokenLifecycle::with_ttl(
                Arc::new(MemoryStore::new()),
                Duration::from_secs(TOKEN_TTL_SECS),
            )),
            exchanger: Arc::new(HttpTokenExchanger::with_client(
                format!("{}/token", server.uri()),
                reqwest::Client::new(),
            )),
            client: Some(oauth_client()),
        };
        let router = create_relay_router(state.clone());

        let (status, body) = send(&router, "GET", "/callback?code=c&state=s6").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("Failed to exchange authorization code for token"));
        assert_eq!(state.lifecycle.status("s6").await, TokenStatus::NotFound);
    }

    #[tokio::test]
    async fn test_callback_unrepresentable_expiry_stores_nothing() {
        let exchanger = FakeExchanger::returning(Ok(ProviderTokens {
            access_token: "a".to_string(),
            refresh_token: None,
            token_type: None,
            expires_in: Some(i64::MAX),
        }));
        let (state, router) = relay(exchanger, Some(oauth_client()));
        let (status, _) = send(&router, "GET", "/callback?code=c&state=s7").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(state.lifecycle.status("s7").await, TokenStatus::NotFound);
    }

    #[tokio::test]
    async fn test_callback_success_stores_token() {
        let exchanger = FakeExchanger::tokens("ya29.fresh");
        let (_, router) = relay(exchanger.clone(), Some(oauth_client()));
        let state_param = urlencoding::encode("st<ate>&1");
        let uri = format!("/callback?code=good-code&state={}", state_param);

        let (status, body) = send(&router, "GET", &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Authorization Successful"));
        assert!(body.contains("st&lt;ate&gt;&amp;1"));
        assert_eq!(exchanger.codes.lock().as_slice(), ["good-code".to_string()]);

        let token_uri = format!("/token/{}", state_param);
        let (status, body) = send(&router, "GET", &token_uri).await;
        assert_eq!(status, StatusCode::OK);
        let body = json(&body);
        assert_eq!(body["access_token"], "ya29.fresh");
        assert_eq!(body["refresh_token"], "refresh");
        assert_eq!(body["token_type"], "Bearer");
    }

    #[tokio::test]
    async fn test_callback_response_is_html() {
        let (_, router) = relay(FakeExchanger::tokens("tok"), Some(oauth_client()));
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/callback?state=x")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/html"));
    }
}
