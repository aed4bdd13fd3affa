//! Platform-agnostic ECHONET Lite frame codec, class dictionary, and
//! device-bridge orchestration logic.
//!
//! Concrete transports (Wi-SUN serial modem, UDP sockets) and metric
//! exporters live in sibling crates; this crate only depends on `log` and
//! `thiserror`, so it can be exercised without any real I/O.

pub mod controller;
pub mod dictionary;
pub mod error;
pub mod frame;
pub mod log;
pub mod metric_sink;
pub mod node_list;
pub mod objects;
pub mod transport;
pub mod types;
pub mod udp;

pub use controller::{FrameExchange, LanController, SmartMeterController, TidCounter};
pub use dictionary::{ClassDictionary, ClassInfo, StaticDictionary};
pub use error::{ControllerError, DecodeError, DictionaryError, ParseError, TransportError};
pub use frame::Frame;
pub use metric_sink::{MetricSink, NoopMetricSink};
pub use node_list::NodeList;
pub use objects::{decode_object, AirconObject, DeviceObject, SmartMeterObject};
pub use types::{ClassCode, Eoj, Esv, Property};
pub use udp::{UdpMulticastReceiver, UdpMulticastSender, UdpUnicastReceiver};
