//! Error types for hs80-core.

use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HID device communication failure.
    #[error("HID error: {0}")]
    Hid(String),

    /// Interface not found during enumeration.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Permission denied while opening the interface.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The channel has no open device handle.
    #[error("not connected: {0}")]
    NotConnected(&'static str),

    /// `start_monitoring` called while the read loop is still running.
    #[error("event monitoring already running")]
    AlreadyMonitoring,

    /// One of the software-mode initialization packets failed.
    #[error("lighting initialization failed at step '{step}': {source}")]
    InitializationFailed {
        step: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// Value out of the accepted range.
    #[error("value out of range: {field} = {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    /// Background thread could not be started.
    #[error("background task error: {0}")]
    Task(String),

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// At least one sub-interface failed to connect.
    #[error("{}", session_connect_message(.lighting, .events))]
    SessionConnect {
        lighting: Option<Box<Error>>,
        events: Option<Box<Error>>,
    },
}

fn session_connect_message(lighting: &Option<Box<Error>>, events: &Option<Box<Error>>) -> String {
    let status = |e: &Option<Box<Error>>| match e {
        Some(err) => format!("FAILED ({err})"),
        None => "OK".to_string(),
    };
    format!(
        "could not connect all interfaces: lighting {}, events {}",
        status(lighting),
        status(events)
    )
}

impl Error {
    /// Whether the failure is an access problem the user can fix with
    /// elevated privileges or a udev rule.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::PermissionDenied(_) => true,
            Self::InitializationFailed { source, .. } => source.is_permission_denied(),
            Self::SessionConnect { lighting, events } => lighting
                .iter()
                .chain(events.iter())
                .any(|e| e.is_permission_denied()),
            _ => false,
        }
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
