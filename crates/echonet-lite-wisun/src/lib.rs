//! Serial line transport and RL7023 Wi-SUN modem driver.

pub mod driver;
pub mod error;
pub mod serial;
pub mod state;
pub mod types;

pub use driver::ModemDriver;
pub use error::ModemError;
pub use serial::PortSerialLine;
pub use state::{ModemEvent, ModemState, ModemStateMachine};
pub use types::{ErxudpVariant, PanDesc};
