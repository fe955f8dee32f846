//! Prometheus metrics endpoint and HTTP request tracking middleware.
//!
//! Request counters are recorded by `metrics_middleware`; sales and
//! celebration counters are recorded by the handlers that produce them.

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;

use super::auth::AuthUser;
use super::error::ApiError;
use crate::db::{Sale, SaleScope};
use crate::engine::Tier;
use crate::AppState;

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const SALES_RECORDED_TOTAL: &str = "sales_recorded_total";
pub const CELEBRATIONS_TOTAL: &str = "celebrations_total";
pub const SALES_VOLUME_TOTAL: &str = "sales_volume_total";

/// Install the global Prometheus recorder. Call once at startup.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    describe_counter!(
        HTTP_REQUESTS_TOTAL,
        "Total number of HTTP requests received"
    );
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(SALES_RECORDED_TOTAL, "Sales recorded, by product category");
    describe_counter!(
        CELEBRATIONS_TOTAL,
        "Tier celebrations shown to sellers, by tier reached"
    );
    describe_gauge!(SALES_VOLUME_TOTAL, "Summed value of every recorded sale");

    Ok(handle)
}

/// GET /metrics - Prometheus text format, admins only
pub async fn metrics_endpoint(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<(StatusCode, String), ApiError> {
    auth.require_admin()?;
    update_gauge_metrics(&state).await;

    Ok(match state.metrics_handle.as_ref() {
        Some(h) => (StatusCode::OK, h.render()),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Metrics not initialized".to_string(),
        ),
    })
}

async fn update_gauge_metrics(state: &AppState) {
    match Sale::total(&state.db, &SaleScope::All).await {
        Ok(total) => gauge!(SALES_VOLUME_TOTAL).set(total),
        Err(e) => tracing::warn!("Failed to compute sales volume: {}", e),
    }
}

/// Records `http_requests_total` and `http_request_duration_seconds`
/// labelled by method and matched route.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let method = request.method().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

pub fn record_sale(product: &str) {
    counter!(SALES_RECORDED_TOTAL, "product" => product.to_string()).increment(1);
}

pub fn record_celebration(tier: Tier) {
    counter!(CELEBRATIONS_TOTAL, "tier" => tier.as_str()).increment(1);
}
