//! LAN controller binary: discovers ECHONET Lite air conditioners over UDP
//! multicast/unicast and exports `home_aircon_temperature` (§4.F, §5, §6).
//!
//! Decomposed per §5 into R1 (multicast receive), R2 (unicast receive), T
//! (polling ticker), and M (this orchestrator), connected by an mpsc
//! channel rather than the raw callback style of the Go original.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use echonet_lite::transport::{
    MulticastReceiver, MulticastSender, UdpEvent, UnicastReceiver,
};
use echonet_lite::{Frame, LanController, UdpMulticastReceiver, UdpMulticastSender, UdpUnicastReceiver};
use echonet_lite_monitor::{serve_metrics, PrometheusMetricSink};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(about = "Bridges ECHONET Lite air conditioners on the LAN to Prometheus")]
struct Cli {
    /// Address the /metrics HTTP exporter binds to.
    #[arg(long, default_value = "0.0.0.0:8080")]
    exporter_addr: SocketAddr,

    /// Interval between aircon polling rounds, e.g. "30s", "1m".
    #[arg(long, value_parser = parse_duration, default_value = "1m")]
    interval: Duration,
}

/// Parses a duration suffixed with `s` or `m` (§6's `--interval` shape).
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

/// One received frame plus the peer it came from, handed from a receive
/// loop to the orchestrator (§5 "communicate ... through message
/// channels").
struct Inbound {
    peer: String,
    frame: Frame,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::try_init().ok();
    let cli = Cli::parse();

    let sink = Arc::new(PrometheusMetricSink::new());
    let controller = Arc::new(LanController::new());
    let cancel = CancellationToken::new();

    let sender = UdpMulticastSender::bind().context("failed to bind multicast sender")?;

    let (tx, mut rx) = mpsc::unbounded_channel::<Inbound>();

    let multicast_receiver = UdpMulticastReceiver::bind().context("failed to bind multicast receiver")?;
    let unicast_receiver = UdpUnicastReceiver::bind().context("failed to bind unicast receiver")?;

    let r1_cancel = cancel.clone();
    let r1_tx = tx.clone();
    let r1 = tokio::task::spawn_blocking(move || receive_loop(multicast_receiver, r1_tx, r1_cancel, "multicast"));

    let r2_cancel = cancel.clone();
    let r2_tx = tx;
    let r2 = tokio::task::spawn_blocking(move || receive_loop(unicast_receiver, r2_tx, r2_cancel, "unicast"));

    let metrics_cancel = cancel.clone();
    let metrics_sink = sink.clone();
    let metrics_addr = cli.exporter_addr;
    let metrics = tokio::spawn(async move {
        tokio::select! {
            _ = serve_metrics(metrics_addr, metrics_sink) => {}
            _ = metrics_cancel.cancelled() => {}
        }
    });

    for frame in controller.bootstrap_frames() {
        debug!("bootstrap send tid={}", frame.tid);
        if let Err(err) = sender.send(&frame.serialize()) {
            warn!("bootstrap send failed: {err}");
        }
    }
    tokio::time::sleep(Duration::from_secs(3)).await;

    let t_cancel = cancel.clone();
    let t_controller = controller.clone();
    let poll_interval = cli.interval;
    let poll_sender = UdpMulticastSender::bind().context("failed to bind polling sender")?;
    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    for (peer, frame) in t_controller.poll_frames() {
                        debug!("polling {peer} tid={}", frame.tid);
                        if let Err(err) = poll_sender.send(&frame.serialize()) {
                            warn!("poll send to {peer} failed: {err}");
                        }
                    }
                }
                _ = t_cancel.cancelled() => break,
            }
        }
    });

    info!("aircon exporter running, node_count={}", controller.node_count());

    loop {
        tokio::select! {
            Some(Inbound { peer, frame }) = rx.recv() => {
                controller.handle_frame(&peer, &frame, sink.as_ref());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                cancel.cancel();
                break;
            }
        }
    }

    let _ = tokio::join!(r1, r2, ticker, metrics);
    Ok(())
}

/// Runs one blocking UDP receive loop until cancelled (§5 R1/R2), parsing
/// each datagram and forwarding it to the orchestrator. Parse failures are
/// logged and dropped (§7); transient read errors (timeouts) never end the
/// loop.
fn receive_loop<R>(mut receiver: R, tx: mpsc::UnboundedSender<Inbound>, cancel: CancellationToken, label: &str)
where
    R: ReceiverLike,
{
    while !cancel.is_cancelled() {
        match receiver.recv() {
            Some(UdpEvent::Datagram { peer, bytes }) => match Frame::parse(&bytes) {
                Ok(frame) => {
                    if tx.send(Inbound { peer: peer.to_string(), frame }).is_err() {
                        break;
                    }
                }
                Err(err) => warn!("[{label}] dropping unparseable frame from {peer}: {err}"),
            },
            Some(UdpEvent::Transient(_)) => {}
            None => break,
        }
    }
    debug!("[{label}] receive loop exiting");
}

/// Lets [`receive_loop`] run over either the multicast or unicast receiver
/// without duplicating the loop body.
trait ReceiverLike {
    fn recv(&mut self) -> Option<UdpEvent>;
}

impl ReceiverLike for UdpMulticastReceiver {
    fn recv(&mut self) -> Option<UdpEvent> {
        MulticastReceiver::recv(self)
    }
}

impl ReceiverLike for UdpUnicastReceiver {
    fn recv(&mut self) -> Option<UdpEvent> {
        UnicastReceiver::recv(self)
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
}
