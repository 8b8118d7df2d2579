//! Login and callback routes

use std::sync::atomic::Ordering;
use std::time::Instant;

use axum::extract::{Path, RawQuery, State};
use axum::response::{IntoResponse, Redirect, Response};
use social_auth::{CallbackParams, Provider};
use tracing::{info, instrument, warn};

use crate::AppState;
use crate::error::AuthError;
use crate::metrics;

fn new_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().as_simple())
}

/// Bounded label for metrics: unknown provider names from the URL must not
/// create new series.
fn provider_label(provider: &str) -> &'static str {
    provider
        .parse::<Provider>()
        .map(|p| p.as_str())
        .unwrap_or("unsupported")
}

/// `GET /auth/{provider}`: send the browser to the provider.
pub async fn login_handler(State(state): State<AppState>, Path(provider): Path<String>) -> Response {
    let request_id = new_request_id();
    match login(&state, &provider, &request_id) {
        Ok(redirect) => redirect.into_response(),
        Err(e) => e.into_response(),
    }
}

#[instrument(skip_all, fields(request_id = %request_id, provider = %provider))]
fn login(state: &AppState, provider: &str, request_id: &str) -> Result<Redirect, AuthError> {
    let label = provider_label(provider);
    match state.flow.initiate_login(provider) {
        Ok(redirect) => {
            metrics::record_redirect(label);
            Ok(Redirect::to(&redirect.url))
        }
        Err(e) => {
            warn!(error = %e, error_type = e.error_type(), "login redirect refused");
            metrics::record_failure(label, e.error_type());
            state.metrics.failures_total.fetch_add(1, Ordering::Relaxed);
            Err(AuthError::new(e, request_id))
        }
    }
}

/// `GET /auth/{provider}/callback`: finish the sign-in started by
/// `login_handler`.
///
/// The raw query is parsed leniently so a provider error without a code
/// still reaches the flow instead of being rejected by the extractor.
pub async fn callback_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let request_id = new_request_id();
    let params = CallbackParams::from_query(query.as_deref().unwrap_or_default());
    callback(&state, &provider, &params, request_id).await
}

#[instrument(skip_all, fields(request_id = %request_id, provider = %provider))]
async fn callback(
    state: &AppState,
    provider: &str,
    params: &CallbackParams,
    request_id: String,
) -> Response {
    let label = provider_label(provider);
    let start = Instant::now();

    match state.flow.handle_callback(provider, params).await {
        Ok(response) => {
            let elapsed = start.elapsed();
            metrics::record_signin(label, elapsed.as_secs_f64());
            state.metrics.signins_total.fetch_add(1, Ordering::Relaxed);
            info!(duration_ms = elapsed.as_millis() as u64, "callback completed");
            response
        }
        Err(e) => {
            metrics::record_failure(label, e.error_type());
            state.metrics.failures_total.fetch_add(1, Ordering::Relaxed);
            AuthError::new(e, request_id).into_response()
        }
    }
}
