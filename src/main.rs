mod common;
mod http_client;
mod legal;
mod model;
mod ratelimit;
mod relay;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use clap::Parser;
use model::arg::Args;
use model::config::Config;
use model::credentials::ClientCredentials;
use ratelimit::{RateLimitState, RateLimiter, rate_limit_middleware};
use relay::{HttpTokenExchanger, RelayState, TokenLifecycle};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config_path = args
        .config
        .unwrap_or_else(|| Config::default_config_path().to_string());
    let mut config = Config::load(&config_path).unwrap_or_else(|e| {
        tracing::error!("Failed to load config: {:#}", e);
        std::process::exit(1);
    });
    if let Some(port) = args.port {
        config.port = port;
    }
    config.apply_env();
    if let Err(e) = config.validate() {
        tracing::error!("Invalid config: {:#}", e);
        std::process::exit(1);
    }

    // Client credentials file only fills what config and environment left empty
    if let Some(credentials_path) = &args.credentials {
        let credentials = ClientCredentials::load(credentials_path).unwrap_or_else(|e| {
            tracing::error!("Failed to load client credentials: {:#}", e);
            std::process::exit(1);
        });
        config.apply_client_credentials(credentials);
    }

    let oauth_client = config.oauth_client();
    match &oauth_client {
        Some(client) => tracing::info!("Redirect URI: {}", client.redirect_uri),
        None => tracing::warn!(
            "OAuth client ID / secret not configured, /callback will answer 500 until they are set"
        ),
    }

    // Build entry store
    let store_handle = store::build_store(&config).await.unwrap_or_else(|e| {
        tracing::error!("Failed to initialize entry store: {:#}", e);
        std::process::exit(1);
    });

    let lifecycle = Arc::new(TokenLifecycle::with_ttl(
        store_handle.store.clone(),
        Duration::from_secs(config.token_ttl_secs),
    ));
    tracing::info!("Token TTL: {}s", lifecycle.ttl().as_secs());

    let exchanger = HttpTokenExchanger::new(&config).unwrap_or_else(|e| {
        tracing::error!("Failed to create token exchanger: {:#}", e);
        std::process::exit(1);
    });
    if let Some(proxy_url) = &config.proxy_url {
        tracing::info!("HTTP proxy configured: {}", proxy_url);
    }

    let relay_state = RelayState {
        lifecycle,
        exchanger: Arc::new(exchanger),
        client: oauth_client,
    };

    let mut app = relay::create_relay_router(relay_state).merge(legal::create_legal_router());

    if config.rate_limit_requests > 0 {
        let limiter = RateLimiter::new(
            config.rate_limit_requests,
            Duration::from_secs(config.rate_limit_window_secs.max(1)),
        );
        tracing::info!(
            "Rate limit: {} requests per {}s per caller",
            config.rate_limit_requests,
            config.rate_limit_window_secs.max(1)
        );
        app = app.layer(middleware::from_fn_with_state(
            RateLimitState::new(limiter),
            rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    // Request spans carry the redacted path only
    let app =
        app.layer(TraceLayer::new_for_http().make_span_with(common::trace::make_request_span));

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting OAuth relay: {}", addr);
    tracing::info!("Available endpoints:");
    tracing::info!("  GET  /callback");
    tracing::info!("  GET  /status/{{state}}");
    tracing::info!("  GET  /token/{{state}}");
    tracing::info!("  GET  /health");
    tracing::info!("  GET  /terms");
    tracing::info!("  GET  /privacy");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        tracing::error!("Server error: {}", e);
    }

    store_handle.shutdown().await;
    tracing::info!("Server stopped");
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
