use echonet_lite::{ControllerError, TransportError};
use thiserror::Error;

/// Failures from the Wi-SUN modem driver (§4.D, §7).
#[derive(Debug, Error)]
pub enum ModemError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("modem rejected the command with {0}")]
    CommandFailed(String),
    #[error("unexpected modem response: {0}")]
    UnexpectedResponse(String),
    #[error("active scan gave up after dwell exceeded 8")]
    ScanExhausted,
    #[error("PANA join failed (EVENT 24)")]
    JoinFailed,
}

impl From<ModemError> for ControllerError {
    fn from(err: ModemError) -> Self {
        match err {
            ModemError::Transport(transport) => ControllerError::Transport(transport),
            other => ControllerError::Network(other.to_string()),
        }
    }
}
