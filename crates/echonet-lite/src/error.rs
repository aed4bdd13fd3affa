use thiserror::Error;

/// Failures from [`crate::frame::Frame::parse`] (§4.B, §7).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("frame shorter than the 12-byte fixed header: got {0} bytes")]
    TooShort(usize),
    #[error("bad header: expected EHD1=0x10 EHD2=0x81, got {ehd1:#04x} {ehd2:#04x}")]
    BadHeader { ehd1: u8, ehd2: u8 },
    #[error("property list truncated: expected {expected} more bytes, {remaining} available")]
    TruncatedProperties { expected: usize, remaining: usize },
    #[error("OPC={opc} but property length for EPC={epc:#04x} is {actual}, expected {expected}")]
    InconsistentOpc { opc: u8, epc: u8, expected: u8, actual: u8 },
}

/// Failures decoding a parsed [`crate::frame::Frame`] into a typed
/// [`crate::objects::DeviceObject`] (§4.B typed decoders).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("property {epc:#04x} missing required data")]
    MissingProperty { epc: u8 },
    #[error("property {epc:#04x} has wrong length: expected {expected}, got {actual}")]
    WrongLength { epc: u8, expected: usize, actual: usize },
    #[error("smart meter reports instantaneous power as not measured (0x7FFFFFFE)")]
    NotMeasured,
}

/// Errors surfaced by [`crate::dictionary::ClassDictionary`] loaders.
#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("dictionary source unavailable: {0}")]
    SourceUnavailable(String),
}

/// Generic transport-level failures shared by the serial line and UDP
/// transports (§4.C, §4.E, §7). Distinguishing `Timeout` from `Io` lets
/// callers swallow timeouts inside a polling loop while treating any other
/// I/O failure as fatal to the in-flight operation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("operation timed out")]
    Timeout,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the controller orchestration layer (§4.F).
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("network error: {0}")]
    Network(String),
}
