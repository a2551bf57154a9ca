//! Error types for the handoff core
//!
//! The library reports failures through these `thiserror` enums; the daemon,
//! client and CLI wrap them in `anyhow` with context.

/// Status values reported on the control channel, modelled on device-control status codes
pub mod status {
    pub const SUCCESS: u32 = 0x0000_0000;
    pub const DEVICE_BUSY: u32 = 0x8000_0011;
    pub const CANCELLED: u32 = 0xC000_0120;
    pub const INVALID_DEVICE_REQUEST: u32 = 0xC000_0010;
    pub const INVALID_PARAMETER: u32 = 0xC000_000D;
}

/// Failure of a single control request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    /// Another WaitForNextEvent is already outstanding
    #[error("device busy: another wait is already outstanding")]
    Busy,
    /// The outstanding wait was terminated by shutdown
    #[error("wait cancelled: monitor is detaching")]
    Cancelled,
    /// Unknown control code
    #[error("invalid request: unknown control code {0:#x}")]
    InvalidRequest(u32),
    /// SubmitDecision carried a bad record
    #[error("malformed decision: {0}")]
    MalformedDecision(String),
}

impl ControlError {
    /// Status code reported to the consumer for this failure
    pub fn status_code(&self) -> u32 {
        match self {
            ControlError::Busy => status::DEVICE_BUSY,
            ControlError::Cancelled => status::CANCELLED,
            ControlError::InvalidRequest(_) => status::INVALID_DEVICE_REQUEST,
            ControlError::MalformedDecision(_) => status::INVALID_PARAMETER,
        }
    }

    /// Map a status code received over the wire back to an error
    pub fn from_status(code: u32, message: &str) -> Option<Self> {
        match code {
            status::DEVICE_BUSY => Some(ControlError::Busy),
            status::CANCELLED => Some(ControlError::Cancelled),
            status::INVALID_DEVICE_REQUEST => {
                Some(ControlError::InvalidRequest(rejected_code(message).unwrap_or(0)))
            }
            status::INVALID_PARAMETER => Some(ControlError::MalformedDecision(message.to_string())),
            _ => None,
        }
    }
}

/// Control code quoted at the end of an `InvalidRequest` message
fn rejected_code(message: &str) -> Option<u32> {
    let (_, hex) = message.rsplit_once("0x")?;
    u32::from_str_radix(hex.trim(), 16).ok()
}

/// Failure registering with the OS notification mechanism
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("a notification callback is already registered with this provider")]
    AlreadyRegistered,
    #[error("notification registration failed: {0}")]
    Os(String),
}

/// Fatal failure while attaching the monitor
#[derive(Debug, thiserror::Error)]
pub enum AttachError {
    #[error("failed to register process notification source")]
    Registration(#[source] RegistrationError),
}

/// Configuration validation failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Note: bounds must match POLLING_INTERVAL_MIN/MAX in constants.rs
    #[error("Invalid polling interval: {0}. Must be between 0.1 and 300.0 seconds")]
    InvalidInterval(f64),
    #[error("Control socket path must not be empty")]
    EmptySocketPath,
}
