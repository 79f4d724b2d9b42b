use crate::infra::{deserialize_optional_date, AppState};
use academy::membership::status::{self, SubscriptionStatus};
use academy::membership::{console_router, MembershipConsole};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct StatusPreviewRequest {
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) has_paid_flag: bool,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusPreviewResponse {
    pub(crate) expiry_date: Option<NaiveDate>,
    pub(crate) has_paid_flag: bool,
    pub(crate) today: NaiveDate,
    pub(crate) status: SubscriptionStatus,
    pub(crate) days_remaining: Option<u32>,
}

pub(crate) fn with_membership_routes(console: Arc<MembershipConsole>) -> axum::Router {
    console_router(console)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/status/preview",
            axum::routing::post(status_preview_endpoint),
        )
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

/// Stateless status derivation for a hypothetical expiry date.
pub(crate) async fn status_preview_endpoint(
    Json(payload): Json<StatusPreviewRequest>,
) -> Json<StatusPreviewResponse> {
    let StatusPreviewRequest {
        expiry_date,
        has_paid_flag,
        today,
    } = payload;

    let today = today.unwrap_or_else(status::today);
    let derived = status::derive(has_paid_flag, expiry_date, today);

    Json(StatusPreviewResponse {
        expiry_date,
        has_paid_flag,
        today,
        status: derived.status,
        days_remaining: derived.days_remaining,
    })
}
