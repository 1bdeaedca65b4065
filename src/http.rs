use crate::metrics::Metrics;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;

pub fn build_router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    uptime_seconds: i64,
    batch_snapshots: u64,
    last_collect_unix: Option<i64>,
    last_flush_unix: Option<i64>,
}

fn timestamp(value: f64) -> Option<i64> {
    (value > 0.0).then_some(value as i64)
}

/// Liveness plus where the agent is in its collect/flush cycle. `status` is
/// `starting` until the first snapshot has been collected.
async fn healthz(State(metrics): State<Arc<Metrics>>) -> Json<Health> {
    let last_collect_unix = timestamp(metrics.agent_last_collect_timestamp_seconds.get());
    Json(Health {
        status: if last_collect_unix.is_some() { "ok" } else { "starting" },
        uptime_seconds: metrics.uptime_seconds(),
        batch_snapshots: metrics.agent_batch_snapshots.get() as u64,
        last_collect_unix,
        last_flush_unix: timestamp(metrics.agent_last_flush_timestamp_seconds.get()),
    })
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> Response {
    metrics.inc_scrape_count();
    match metrics.encode_metrics() {
        Ok(encoded) => (
            [(CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
            encoded,
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("could not encode agent metrics: {err}"),
        )
            .into_response(),
    }
}
