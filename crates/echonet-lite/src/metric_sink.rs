//! Write-only metric interface consumed by the controller (§4.G).
//!
//! This crate defines only the seam; a production implementation (backed
//! by `prometheus`, for instance) lives outside it.

use std::collections::HashMap;

/// Narrow write-side interface for gauge/counter emission.
pub trait MetricSink {
    fn set_gauge(&self, name: &str, labels: &HashMap<String, String>, value: f64);
    fn inc_counter(&self, name: &str, labels: &HashMap<String, String>);
}

/// A sink that discards everything. Used by tests and by controllers run
/// without a configured exporter.
#[derive(Debug, Default)]
pub struct NoopMetricSink;

impl MetricSink for NoopMetricSink {
    fn set_gauge(&self, _name: &str, _labels: &HashMap<String, String>, _value: f64) {}
    fn inc_counter(&self, _name: &str, _labels: &HashMap<String, String>) {}
}

/// Builds the label map for `home_aircon_temperature{ip,type,location}`
/// (§4.F).
pub fn aircon_temperature_labels(ip: &str, kind: &str, location: &str) -> HashMap<String, String> {
    HashMap::from([
        ("ip".to_string(), ip.to_string()),
        ("type".to_string(), kind.to_string()),
        ("location".to_string(), location.to_string()),
    ])
}

/// Builds the label map for the smart-meter gauges, which carry only `ip`
/// (§6 Metrics).
pub fn smart_meter_labels(ip: &str) -> HashMap<String, String> {
    HashMap::from([("ip".to_string(), ip.to_string())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_accepts_any_call_without_panicking() {
        let sink = NoopMetricSink;
        sink.set_gauge("x", &HashMap::new(), 1.0);
        sink.inc_counter("y", &HashMap::new());
    }
}
