//! Prometheus-backed [`echonet_lite::MetricSink`] plus the `/metrics` HTTP
//! exporter surface shared by both bridge binaries.

pub mod server;
pub mod sink;

pub use server::serve_metrics;
pub use sink::PrometheusMetricSink;
