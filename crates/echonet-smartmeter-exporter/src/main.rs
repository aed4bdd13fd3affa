//! Wi-SUN smart-meter binary: establishes a B-route session over the
//! RL7023 modem, polls cumulative/instantaneous power on an interval, and
//! exports Prometheus metrics (§4.D, §5, §6).
//!
//! The modem session is not safe for concurrent use (§5 "Shared
//! resources"), so it lives on one dedicated OS thread for its whole
//! lifetime; the async runtime only owns the metrics HTTP server and the
//! shutdown signal.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use echonet_lite::{MetricSink, SmartMeterController};
use echonet_lite_monitor::{serve_metrics, PrometheusMetricSink};
use echonet_lite_wisun::{ModemDriver, PortSerialLine};
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

/// Ceiling on session establishment (§5 "smart-meter `Connect` ≤ 300 s").
/// The blocking HAL has no preemptive cancel, so this is enforced by
/// logging rather than aborting an in-flight read.
const CONNECT_DEADLINE: Duration = Duration::from_secs(300);

#[derive(Parser, Debug)]
#[command(about = "Bridges a Wi-SUN smart meter B-route session to Prometheus")]
struct Cli {
    /// B-route ID issued by the utility.
    #[arg(long)]
    brouteid: String,

    /// B-route password issued by the utility.
    #[arg(long)]
    broutepw: String,

    /// Serial device for the RL7023 modem.
    #[arg(long, default_value = "/dev/ttyS1")]
    serial_port: String,

    /// Port the /metrics HTTP exporter binds to (§6).
    #[arg(long, default_value_t = 8080)]
    exporter_port: u16,

    /// Interval between smart-meter polling rounds, e.g. "30s", "1m" (§6).
    #[arg(long, value_parser = parse_duration, default_value = "1m")]
    interval: Duration,
}

fn parse_duration(text: &str) -> Result<Duration, String> {
    let (digits, unit) = text.split_at(text.len().saturating_sub(1));
    let value: u64 = digits.parse().map_err(|_| format!("invalid duration: {text}"))?;
    match unit {
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(format!("unsupported duration unit in {text}, expected s/m/h")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::try_init().ok();
    let cli = Cli::parse();

    let sink = Arc::new(PrometheusMetricSink::new());
    sink.inc_counter(
        "home_smartmeter_exporter_version",
        &std::collections::HashMap::from([("version".to_string(), env!("CARGO_PKG_VERSION").to_string())]),
    );

    let cancel = CancellationToken::new();
    let metrics_cancel = cancel.clone();
    let metrics_sink = sink.clone();
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], cli.exporter_port));
    let metrics = tokio::spawn(async move {
        tokio::select! {
            _ = serve_metrics(metrics_addr, metrics_sink) => {}
            _ = metrics_cancel.cancelled() => {}
        }
    });

    let shutdown = Arc::new(AtomicBool::new(false));
    let modem_shutdown = shutdown.clone();
    let modem_sink = sink.clone();
    let modem = tokio::task::spawn_blocking(move || run_modem(cli, modem_sink, modem_shutdown));

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received");
    shutdown.store(true, Ordering::SeqCst);
    cancel.cancel();

    if let Err(err) = modem.await.context("modem task panicked")? {
        error!("modem session ended with error: {err}");
    }
    let _ = metrics.await;
    Ok(())
}

/// Owns the modem for the process lifetime: connects once, polls on
/// `cli.interval` until `shutdown` is set, then issues `SKTERM` (§4.D
/// `Close`).
fn run_modem(cli: Cli, sink: Arc<PrometheusMetricSink>, shutdown: Arc<AtomicBool>) -> Result<()> {
    let serial = PortSerialLine::open(&cli.serial_port)
        .with_context(|| format!("failed to open serial port {}", cli.serial_port))?;
    let mut driver = ModemDriver::new(serial);

    let connect_started = Instant::now();
    driver.connect(&cli.brouteid, &cli.broutepw).context("failed to establish Wi-SUN session")?;
    if connect_started.elapsed() > CONNECT_DEADLINE {
        warn!("Wi-SUN session establishment exceeded the 300s target ({:?})", connect_started.elapsed());
    }

    let ip = driver.pan_desc().map(|desc| desc.ipv6_addr.clone()).unwrap_or_default();
    let controller = SmartMeterController::new();

    while !shutdown.load(Ordering::SeqCst) {
        for err in controller.poll_once(&ip, &mut driver, sink.as_ref()) {
            warn!("smart-meter poll error: {err}");
        }
        sleep_responsively(cli.interval, &shutdown);
    }

    driver.close().context("failed to close modem session cleanly")?;
    Ok(())
}

/// Sleeps in short slices so a shutdown request lands within roughly one
/// second instead of blocking for the full polling interval.
fn sleep_responsively(total: Duration, shutdown: &AtomicBool) {
    let step = Duration::from_secs(1).min(total);
    let mut remaining = total;
    while remaining > Duration::ZERO && !shutdown.load(Ordering::SeqCst) {
        let slice = step.min(remaining);
        std::thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seconds_minutes_and_hours() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn rejects_unknown_units() {
        assert!(parse_duration("5x").is_err());
    }

    #[test]
    fn sleep_responsively_returns_early_once_shutdown_is_set() {
        let shutdown = AtomicBool::new(true);
        let started = Instant::now();
        sleep_responsively(Duration::from_secs(30), &shutdown);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
