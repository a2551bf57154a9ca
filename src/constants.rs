//! Global constants for procgate
//!
//! Centralized location for application-wide constants

/// Application identifier used for logging targets and default paths
pub const APP_NAME: &str = "procgate";

/// Default daemon category for structured logging
pub const DAEMON_CATEGORY: &str = "daemon";

/// Maximum image path length carried in a process event, in UTF-16 code units
pub const MAX_IMAGE_PATH_UNITS: usize = 260;

/// Default control socket path
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/procgate/control.sock";

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "procgate.toml";

/// Polling interval bounds for the snapshot notification source, in seconds.
/// Bounds must match the message in `ConfigError::InvalidInterval`.
pub const POLLING_INTERVAL_MIN: f64 = 0.1;
pub const POLLING_INTERVAL_MAX: f64 = 300.0;
pub const POLLING_INTERVAL_DEFAULT: f64 = 0.5;

/// Device type used when composing control codes
pub const CONTROL_DEVICE_TYPE: u32 = 0x22;

/// Backoff bounds for `watch` when the daemon reports another consumer is waiting
pub const WATCH_BACKOFF_INITIAL_MS: u64 = 100;
pub const WATCH_BACKOFF_MAX_MS: u64 = 5_000;
