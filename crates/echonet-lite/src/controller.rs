//! Orchestration: device discovery, polling, and metric emission (§4.F).
//!
//! The I/O loops themselves (sockets, tickers, cancellation) are owned by
//! the binaries; this module holds the transport-agnostic logic so it can
//! be exercised without a network or a modem (§5 decomposes the runtime
//! loops as R1/R2/T/M around exactly this core).

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Mutex;

use crate::error::ControllerError;
use crate::frame::{self, Frame};
use crate::log::my_debug;
use crate::metric_sink::{aircon_temperature_labels, smart_meter_labels, MetricSink};
use crate::node_list::NodeList;
use crate::objects::{decode_object, DeviceObject};
use crate::types::{Esv, Eoj, CLASS_NODE_PROFILE};

/// Process-wide monotonic TID allocator (§5, §9). Wraps at 2^16; wraparound
/// collisions are tolerated per §3's invariants.
#[derive(Debug, Default)]
pub struct TidCounter(AtomicU16);

impl TidCounter {
    pub fn new() -> Self {
        Self(AtomicU16::new(0))
    }

    pub fn next(&self) -> u16 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// Orchestrates the LAN (UDP multicast/unicast) path: bootstrap discovery,
/// `NodeList` maintenance, and aircon temperature gauge updates.
pub struct LanController {
    tid: TidCounter,
    node_list: Mutex<NodeList>,
}

impl LanController {
    pub fn new() -> Self {
        Self { tid: TidCounter::new(), node_list: Mutex::new(NodeList::new()) }
    }

    /// The three bootstrap frames sent as multicast at startup, each with
    /// its own incrementing TID (§4.F Startup sequence). Callers are
    /// responsible for the 3 s settle sleep between sending these and
    /// reading accumulated responses.
    pub fn bootstrap_frames(&self) -> [Frame; 3] {
        [
            frame::make_inf(self.tid.next(), vec![0x00]),
            frame::make_inf_req(self.tid.next()),
            frame::make_get_all(self.tid.next()),
        ]
    }

    /// Builds the periodic per-device poll frames for every aircon known
    /// to `NodeList` so far.
    pub fn poll_frames(&self) -> Vec<(String, Frame)> {
        let node_list = self.node_list.lock().expect("node list mutex poisoned");
        node_list
            .peers_with_class(crate::types::CLASS_HOME_AIRCON)
            .into_iter()
            .map(|peer| (peer.to_string(), frame::make_aircon_get(self.tid.next())))
            .collect()
    }

    /// Processes one inbound frame from `peer` (§4.F Receive path). Parse
    /// failures are the caller's concern (§7: log + drop, loop continues);
    /// this function only ever sees already-parsed frames.
    pub fn handle_frame(&self, peer: &str, frame: &Frame, sink: &dyn MetricSink) {
        if frame.esv == Esv::Inf && frame.seoj.class == CLASS_NODE_PROFILE {
            self.register_announced_devices(peer, frame);
            return;
        }
        match decode_object(frame) {
            DeviceObject::Aircon(aircon) => {
                let location = aircon.install_location.map(|l| l.label()).unwrap_or_default();
                if let Some(internal) = aircon.internal_temp {
                    sink.set_gauge(
                        "home_aircon_temperature",
                        &aircon_temperature_labels(peer, "room", &location),
                        internal,
                    );
                }
                if let Some(outer) = aircon.outer_temp {
                    sink.set_gauge(
                        "home_aircon_temperature",
                        &aircon_temperature_labels(peer, "outside", &location),
                        outer,
                    );
                }
            }
            DeviceObject::SmartMeter(_) | DeviceObject::Unknown => {}
        }
    }

    fn register_announced_devices(&self, peer: &str, frame: &Frame) {
        let mut node_list = self.node_list.lock().expect("node list mutex poisoned");
        node_list.add(peer, frame.seoj);
        if let Some(property) = frame.property(0xD5) {
            for eoj_bytes in instance_list_entries(&property.edt) {
                my_debug!("registering announced device {:?} from {}", eoj_bytes, peer);
                node_list.add(peer, eoj_bytes);
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_list.lock().expect("node list mutex poisoned").len()
    }
}

impl Default for LanController {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes EPC `0xD5`'s instance-list payload: a count byte followed by
/// that many 3-byte EOJ entries (§3 `NodeList`, S2).
fn instance_list_entries(edt: &[u8]) -> Vec<Eoj> {
    let Some(&count) = edt.first() else { return Vec::new() };
    let mut entries = Vec::with_capacity(count as usize);
    let mut cursor = 1usize;
    for _ in 0..count {
        if cursor + 3 > edt.len() {
            break;
        }
        entries.push(Eoj::from_bytes([edt[cursor], edt[cursor + 1], edt[cursor + 2]]));
        cursor += 3;
    }
    entries
}

/// Round-trips a [`Frame`] over whatever session carries it to the target
/// device — UDP for the LAN controller is handled directly by the binary,
/// but the smart-meter controller goes through a Wi-SUN modem session,
/// whose `send`/`recv` pair cannot be serialized concurrently (§5 "Shared
/// resources"). This trait is the seam the modem driver implements.
pub trait FrameExchange {
    fn exchange(&mut self, frame: &Frame) -> Result<Frame, ControllerError>;
}

/// The properties this bridge polls from the smart meter on each tick
/// (§4.F "Smart-meter controller"): instantaneous power, then the three
/// properties needed to turn EPC `0xE0`'s raw count into watt-hours.
pub const SMART_METER_POLL_EPCS: [u8; 4] = [0xE7, 0xD3, 0xE1, 0xE0];

/// Accumulates the coefficient/unit needed to turn a cumulative-energy
/// reading into watt-hours, since `0xD3`/`0xE1`/`0xE0` each arrive in their
/// own `GetRes` rather than a single combined frame.
#[derive(Debug, Default)]
struct CumulativeEnergyState {
    coefficient: Option<u32>,
    unit: Option<f64>,
}

/// Orchestrates the Wi-SUN smart-meter path: periodic polling over an
/// already-joined modem session.
pub struct SmartMeterController {
    tid: TidCounter,
    energy_state: Mutex<CumulativeEnergyState>,
}

impl SmartMeterController {
    pub fn new() -> Self {
        Self { tid: TidCounter::new(), energy_state: Mutex::new(CumulativeEnergyState::default()) }
    }

    /// Issues one `Get` per polled property and updates the corresponding
    /// gauges from whatever responses come back. A per-property failure is
    /// logged by the caller and does not stop the remaining properties
    /// from being polled (§7: `ParseError` is a log + drop).
    pub fn poll_once(
        &self,
        ip: &str,
        session: &mut dyn FrameExchange,
        sink: &dyn MetricSink,
    ) -> Vec<ControllerError> {
        let mut errors = Vec::new();
        for &epc in &SMART_METER_POLL_EPCS {
            let request = frame::make_smart_meter_get(self.tid.next(), epc);
            match session.exchange(&request) {
                Ok(response) => self.apply_response(ip, &response, sink),
                Err(err) => errors.push(err),
            }
        }
        errors
    }

    fn apply_response(&self, ip: &str, frame: &Frame, sink: &dyn MetricSink) {
        let DeviceObject::SmartMeter(meter) = decode_object(frame) else { return };
        if let Some(Ok(watts)) = meter.instantaneous_power {
            sink.set_gauge("home_smartmeter_power", &smart_meter_labels(ip), watts as f64);
        }

        let mut state = self.energy_state.lock().expect("energy state mutex poisoned");
        if let Some(coefficient) = meter.coefficient {
            state.coefficient = Some(coefficient);
        }
        if let Some(unit) = meter.cumulative_energy_unit {
            state.unit = Some(unit);
        }
        if let Some(raw) = meter.cumulative_energy_raw {
            // Coefficient defaults to 1 when the meter doesn't support
            // EPC 0xD3 (§4.B), per the standard ECHONET convention.
            let coefficient = state.coefficient.unwrap_or(1) as f64;
            if let Some(unit) = state.unit {
                let watt_hours = raw as f64 * coefficient * unit * 1_000.0;
                sink.set_gauge("home_smartmeter_cumulative_energy_wh", &smart_meter_labels(ip), watt_hours);
            }
        }
    }
}

impl Default for SmartMeterController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric_sink::NoopMetricSink;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[test]
    fn tid_counter_increases_monotonically_and_wraps() {
        let counter = TidCounter::new();
        assert_eq!(counter.next(), 0);
        assert_eq!(counter.next(), 1);
        let counter = TidCounter(AtomicU16::new(u16::MAX));
        assert_eq!(counter.next(), u16::MAX);
        assert_eq!(counter.next(), 0);
    }

    #[test]
    fn bootstrap_frames_use_three_distinct_increasing_tids() {
        let controller = LanController::new();
        let frames = controller.bootstrap_frames();
        assert_eq!(frames[0].tid, 0);
        assert_eq!(frames[1].tid, 1);
        assert_eq!(frames[2].tid, 2);
    }

    #[test]
    fn inf_from_node_profile_registers_announced_instance_list() {
        let controller = LanController::new();
        let bytes: Vec<u8> = vec![
            0x10, 0x81, 0x00, 0x01, 0x0E, 0xF0, 0x01, 0x05, 0xFF, 0x01, 0x73, 0x01, 0xD5, 0x04,
            0x01, 0x01, 0x30, 0x01,
        ];
        let frame = Frame::parse(&bytes).unwrap();
        controller.handle_frame("192.168.1.10", &frame, &NoopMetricSink);
        assert_eq!(controller.node_count(), 1);
    }

    struct RecordingSink {
        gauges: RefCell<Vec<(String, HashMap<String, String>, f64)>>,
    }

    impl MetricSink for RecordingSink {
        fn set_gauge(&self, name: &str, labels: &HashMap<String, String>, value: f64) {
            self.gauges.borrow_mut().push((name.to_string(), labels.clone(), value));
        }
        fn inc_counter(&self, _name: &str, _labels: &HashMap<String, String>) {}
    }

    #[test]
    fn aircon_get_res_updates_room_and_outside_gauges() {
        let controller = LanController::new();
        let bytes: Vec<u8> = vec![
            0x10, 0x81, 0x00, 0x00, 0x01, 0x30, 0x01, 0x05, 0xFF, 0x01, 0x72, 0x02, 0xBB, 0x01,
            0x1A, 0xBE, 0x01, 0x0F,
        ];
        let frame = Frame::parse(&bytes).unwrap();
        let sink = RecordingSink { gauges: RefCell::new(Vec::new()) };
        controller.handle_frame("192.168.1.10", &frame, &sink);
        let gauges = sink.gauges.borrow();
        assert_eq!(gauges.len(), 2);
        assert!(gauges.iter().any(|(_, labels, value)| {
            labels.get("type").map(String::as_str) == Some("room") && *value == 26.0
        }));
        assert!(gauges.iter().any(|(_, labels, value)| {
            labels.get("type").map(String::as_str) == Some("outside") && *value == 15.0
        }));
    }

    struct StubSession {
        responses: std::collections::VecDeque<Frame>,
    }

    impl FrameExchange for StubSession {
        fn exchange(&mut self, _frame: &Frame) -> Result<Frame, ControllerError> {
            self.responses
                .pop_front()
                .ok_or_else(|| ControllerError::Network("no more scripted responses".into()))
        }
    }

    #[test]
    fn smart_meter_poll_updates_power_gauge() {
        let controller = SmartMeterController::new();
        let response_bytes: Vec<u8> = vec![
            0x10, 0x81, 0x00, 0x00, 0x02, 0x88, 0x01, 0x05, 0xFF, 0x01, 0x72, 0x01, 0xE7, 0x04,
            0x00, 0x00, 0x01, 0xF8,
        ];
        let mut session = StubSession {
            responses: std::collections::VecDeque::from([Frame::parse(&response_bytes).unwrap()]),
        };
        let sink = RecordingSink { gauges: RefCell::new(Vec::new()) };
        let errors = controller.poll_once("192.168.1.20", &mut session, &sink);
        assert_eq!(errors.len(), 3); // only the first scripted response was provided
        let gauges = sink.gauges.borrow();
        assert_eq!(gauges[0].2, 504.0);
    }

    #[test]
    fn smart_meter_poll_emits_cumulative_energy_once_unit_and_raw_are_both_known() {
        let controller = SmartMeterController::new();
        // GetRes for 0xD3 (coefficient=1), then 0xE1 (unit=0x01 => 1.0), then
        // 0xE0 (raw=0x00000005), in the order SMART_METER_POLL_EPCS polls
        // them after instantaneous power.
        let coefficient_bytes: Vec<u8> = vec![
            0x10, 0x81, 0x00, 0x00, 0x02, 0x88, 0x01, 0x05, 0xFF, 0x01, 0x72, 0x01, 0xD3, 0x04,
            0x00, 0x00, 0x00, 0x01,
        ];
        let unit_bytes: Vec<u8> = vec![
            0x10, 0x81, 0x00, 0x00, 0x02, 0x88, 0x01, 0x05, 0xFF, 0x01, 0x72, 0x01, 0xE1, 0x01, 0x01,
        ];
        let raw_bytes: Vec<u8> = vec![
            0x10, 0x81, 0x00, 0x00, 0x02, 0x88, 0x01, 0x05, 0xFF, 0x01, 0x72, 0x01, 0xE0, 0x04,
            0x00, 0x00, 0x00, 0x05,
        ];
        let power_bytes: Vec<u8> = vec![
            0x10, 0x81, 0x00, 0x00, 0x02, 0x88, 0x01, 0x05, 0xFF, 0x01, 0x72, 0x01, 0xE7, 0x04,
            0x00, 0x00, 0x01, 0xF8,
        ];
        let mut session = StubSession {
            responses: std::collections::VecDeque::from([
                Frame::parse(&power_bytes).unwrap(),
                Frame::parse(&coefficient_bytes).unwrap(),
                Frame::parse(&unit_bytes).unwrap(),
                Frame::parse(&raw_bytes).unwrap(),
            ]),
        };
        let sink = RecordingSink { gauges: RefCell::new(Vec::new()) };
        let errors = controller.poll_once("192.168.1.20", &mut session, &sink);
        assert!(errors.is_empty());
        let gauges = sink.gauges.borrow();
        let energy = gauges
            .iter()
            .find(|(name, ..)| name == "home_smartmeter_cumulative_energy_wh")
            .expect("cumulative energy gauge was not emitted");
        assert_eq!(energy.2, 5_000.0); // raw=5 * coefficient=1 * unit=1.0 * 1000
    }
}
