//! The `/metrics` HTTP exporter surface (§6 "Metrics (out of scope but
//! contractual)"). Grounded in the original implementation's
//! `promhttp.Handler()` registration, reimplemented on axum the way this
//! crate's sibling web surfaces are built.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use log::{error, info};
use prometheus::{Encoder, TextEncoder};

use crate::sink::PrometheusMetricSink;

#[derive(Clone)]
struct AppState {
    sink: Arc<PrometheusMetricSink>,
}

/// Binds `addr` and serves `/metrics` until the process exits. Errors
/// binding the listener are logged and the function returns; callers that
/// need this surface to be mandatory should check the return value.
pub async fn serve_metrics(addr: SocketAddr, sink: Arc<PrometheusMetricSink>) {
    let app = Router::new().route("/metrics", get(metrics_handler)).with_state(AppState { sink });

    info!("metrics exporter listening on http://{addr}/metrics");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind metrics exporter to {addr}: {err}");
            return;
        }
    };

    if let Err(err) = axum::serve(listener, app).await {
        error!("metrics exporter encountered an error: {err}");
    }
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let metric_families = state.sink.registry().gather();
    let mut buffer = Vec::new();
    if let Err(err) = TextEncoder::new().encode(&metric_families, &mut buffer) {
        error!("failed to encode metrics: {err}");
        return (axum::http::StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }
    (axum::http::StatusCode::OK, String::from_utf8_lossy(&buffer).into_owned())
}
