//! `prometheus`-backed implementation of [`echonet_lite::MetricSink`].

use std::collections::HashMap;
use std::sync::Mutex;

use echonet_lite::MetricSink;
use prometheus::{GaugeVec, IntCounterVec, Opts, Registry};

/// Gauges and counters this bridge emits (§6 Metrics). Every `MetricSink`
/// call that names one of these gets routed to the matching vec; anything
/// else is registered lazily the first time it's seen, so the sink never
/// has to know the full metric set up front.
pub struct PrometheusMetricSink {
    registry: Registry,
    gauges: Mutex<HashMap<(String, Vec<String>), GaugeVec>>,
    counters: Mutex<HashMap<(String, Vec<String>), IntCounterVec>>,
}

impl PrometheusMetricSink {
    pub fn new() -> Self {
        Self { registry: Registry::new(), gauges: Mutex::new(HashMap::new()), counters: Mutex::new(HashMap::new()) }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn gauge_vec(&self, name: &str, label_names: &[String]) -> GaugeVec {
        let key = (name.to_string(), label_names.to_vec());
        let mut gauges = self.gauges.lock().expect("gauge registry mutex poisoned");
        gauges
            .entry(key)
            .or_insert_with(|| {
                let label_refs: Vec<&str> = label_names.iter().map(String::as_str).collect();
                let vec = GaugeVec::new(Opts::new(name, name), &label_refs)
                    .expect("metric name/labels are valid Prometheus identifiers");
                self.registry.register(Box::new(vec.clone())).ok();
                vec
            })
            .clone()
    }

    fn counter_vec(&self, name: &str, label_names: &[String]) -> IntCounterVec {
        let key = (name.to_string(), label_names.to_vec());
        let mut counters = self.counters.lock().expect("counter registry mutex poisoned");
        counters
            .entry(key)
            .or_insert_with(|| {
                let label_refs: Vec<&str> = label_names.iter().map(String::as_str).collect();
                let vec = IntCounterVec::new(Opts::new(name, name), &label_refs)
                    .expect("metric name/labels are valid Prometheus identifiers");
                self.registry.register(Box::new(vec.clone())).ok();
                vec
            })
            .clone()
    }
}

impl Default for PrometheusMetricSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSink for PrometheusMetricSink {
    fn set_gauge(&self, name: &str, labels: &HashMap<String, String>, value: f64) {
        let mut names: Vec<String> = labels.keys().cloned().collect();
        names.sort();
        let vec = self.gauge_vec(name, &names);
        let values: Vec<&str> = names.iter().map(|n| labels[n].as_str()).collect();
        vec.with_label_values(&values).set(value);
    }

    fn inc_counter(&self, name: &str, labels: &HashMap<String, String>) {
        let mut names: Vec<String> = labels.keys().cloned().collect();
        names.sort();
        let vec = self.counter_vec(name, &names);
        let values: Vec<&str> = names.iter().map(|n| labels[n].as_str()).collect();
        vec.with_label_values(&values).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Encoder;

    #[test]
    fn set_gauge_registers_and_records_the_value() {
        let sink = PrometheusMetricSink::new();
        let labels = HashMap::from([
            ("ip".to_string(), "192.168.1.10".to_string()),
            ("type".to_string(), "room".to_string()),
            ("location".to_string(), "living".to_string()),
        ]);
        sink.set_gauge("home_aircon_temperature", &labels, 26.0);

        let mut buffer = Vec::new();
        prometheus::TextEncoder::new().encode(&sink.registry().gather(), &mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("home_aircon_temperature"));
        assert!(output.contains("26"));
    }

    #[test]
    fn inc_counter_accumulates_across_calls() {
        let sink = PrometheusMetricSink::new();
        let labels = HashMap::from([("version".to_string(), "0.1.0".to_string())]);
        sink.inc_counter("home_smartmeter_exporter_version", &labels);
        sink.inc_counter("home_smartmeter_exporter_version", &labels);

        let mut buffer = Vec::new();
        prometheus::TextEncoder::new().encode(&sink.registry().gather(), &mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("home_smartmeter_exporter_version{version=\"0.1.0\"} 2"));
    }
}
