//! Structured logging helpers wrapping the `log` crate.

/// Trait for structs that provide metadata for logging.
pub trait LogMetadata {
    fn meta(&self) -> String;
}

/// Context used when logging around a single peer/device.
pub struct PeerContext {
    pub component: &'static str,
    pub peer: String,
}

impl LogMetadata for PeerContext {
    fn meta(&self) -> String {
        format!("component={}, peer={}", self.component, self.peer)
    }
}

// =============================================
// Logging macros (namespaced under crate::log)
// =============================================

macro_rules! my_info {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        log::info!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
    ($fmt:literal $(, $($arg:tt)+)?) => {{
        log::info!($fmt $(, $($arg)+)?);
    }};
}

macro_rules! my_warn {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        log::warn!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
    ($fmt:literal $(, $($arg:tt)+)?) => {{
        log::warn!($fmt $(, $($arg)+)?);
    }};
}

macro_rules! my_error {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        log::error!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
    ($fmt:literal $(, $($arg:tt)+)?) => {{
        log::error!($fmt $(, $($arg)+)?);
    }};
}

macro_rules! my_debug {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        log::debug!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
    ($fmt:literal $(, $($arg:tt)+)?) => {{
        log::debug!($fmt $(, $($arg)+)?);
    }};
}

pub(crate) use my_debug;
pub(crate) use my_error;
pub(crate) use my_info;
pub(crate) use my_warn;
