//! Social login demo site
//!
//! Single-binary service that:
//! 1. Loads provider credentials from config and environment
//! 2. Sends visitors to Google or Facebook to sign in
//! 3. Completes the authorization code flow on the callback
//! 4. Keeps the signed-in user in cookies and shows their profile

mod auth;
mod config;
mod error;
mod metrics;
mod pages;
mod session;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metrics_exporter_prometheus::PrometheusHandle;
use social_auth::{HttpTransport, OAuth2Flow, Provider, ReqwestTransport};

use crate::config::Config;
use crate::metrics::ServiceMetrics;
use crate::session::CookieSession;

/// How long in-flight callbacks get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub(crate) struct AppState {
    flow: Arc<OAuth2Flow<CookieSession>>,
    metrics: ServiceMetrics,
    prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/", get(pages::index_handler))
        .route("/logout", get(session::logout_handler))
        .route("/auth/{provider}", get(auth::login_handler))
        .route("/auth/{provider}/callback", get(auth::callback_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs; LOG_LEVEL wins over RUST_LOG
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting social-login");

    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let registry = Arc::new(config.registry());
    for provider in Provider::ALL {
        if let Err(e) = registry.get(provider) {
            warn!(%provider, error = %e, "provider not configured, sign-in will be refused");
        }
    }

    info!(
        listen_addr = %config.server.listen_addr,
        public_url = %config.server.public_url,
        timeout_secs = config.server.timeout_secs,
        "configuration loaded"
    );

    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(
        reqwest::Client::new(),
        Duration::from_secs(config.server.timeout_secs),
    ));
    let flow = OAuth2Flow::new(
        registry,
        transport,
        CookieSession::new(config.server.public_url.as_str()),
    );

    let app_state = AppState {
        flow: Arc::new(flow),
        metrics: ServiceMetrics::new(),
        prometheus: prometheus_handle,
    };

    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timer starts when the signal fires, not when the server starts.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: 200 while at least one provider can sign users in,
/// 503 otherwise.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.flow.registry();
    let providers: serde_json::Map<String, serde_json::Value> = Provider::ALL
        .iter()
        .map(|p| {
            let status = if registry.is_configured(*p) {
                "configured"
            } else {
                "unconfigured"
            };
            (p.as_str().to_string(), status.into())
        })
        .collect();
    let healthy = Provider::ALL.iter().any(|p| registry.is_configured(*p));

    let (status_code, status) = if healthy {
        (axum::http::StatusCode::OK, "healthy")
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = serde_json::json!({
        "status": status,
        "uptime_seconds": state.metrics.started_at.elapsed().as_secs(),
        "signins_total": state.metrics.signins_total.load(Ordering::Relaxed),
        "failures_total": state.metrics.failures_total.load(Ordering::Relaxed),
        "providers": providers,
    });

    (
        status_code,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
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
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
