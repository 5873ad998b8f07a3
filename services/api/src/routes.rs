use crate::infra::AppState;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use grant_pipeline::error::AppError;
use grant_pipeline::workflows::grants::{grant_router, WebhookEnvelope};
use serde_json::json;
use tracing::warn;

pub(crate) const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Grant routes plus the operational and billing endpoints. The caller layers
/// `Extension(AppState)` on top.
pub(crate) fn with_operational_routes(state: &AppState) -> Router {
    grant_router(state.service.clone())
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/billing/webhook", post(billing_webhook_endpoint))
        .route("/api/v1/billing/prices", get(prices_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn prices_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    Json(state.billing.prices.clone())
}

/// Subscription lifecycle events from the payment provider. When a shared secret
/// is configured the header must match it.
pub(crate) async fn billing_webhook_endpoint(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(envelope): Json<WebhookEnvelope>,
) -> Result<Response, AppError> {
    if let Some(expected) = state.billing.webhook_secret.as_deref() {
        let provided = headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected) {
            warn!(event_type = %envelope.event_type, "rejected billing webhook with bad secret");
            let payload = json!({ "error": "invalid webhook secret" });
            return Ok((StatusCode::UNAUTHORIZED, Json(payload)).into_response());
        }
    }

    let outcome = state.service.handle_billing_webhook(&envelope)?;
    Ok(Json(outcome).into_response())
}
