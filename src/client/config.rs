//! Connection settings for device clients.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Baud rate used when none is configured.
pub const DEFAULT_BAUD_RATE: u32 = 9600;
/// Per-read timeout used when none is configured.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);
/// Per-write timeout used when none is configured.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Rejected connection settings.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The device address was empty or whitespace.
    #[error("device address must not be empty")]
    EmptyAddress,
    /// The baud rate was zero.
    #[error("baud rate must be greater than zero")]
    ZeroBaudRate,
}

/// Where and how to reach a device.
///
/// Settings are validated once at construction and immutable afterwards.
/// A zero timeout makes each read or write return immediately if it can not
/// make progress.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use devicewire::client::ConnectionInfo;
///
/// let info = ConnectionInfo::new("/dev/ttyACM0", 115_200)
///     .expect("valid settings")
///     .with_read_timeout(Duration::from_millis(100));
/// assert_eq!(info.address(), "/dev/ttyACM0");
/// assert_eq!(info.read_timeout(), Duration::from_millis(100));
/// ```
///
/// Settings can also be loaded with `serde`; omitted fields take their
/// defaults:
///
/// ```
/// use devicewire::client::{ConnectionInfo, DEFAULT_BAUD_RATE};
///
/// let info: ConnectionInfo =
///     serde_json::from_str(r#"{ "address": "COM3", "read_timeout_ms": 100 }"#)
///         .expect("valid settings");
/// assert_eq!(info.baud_rate(), DEFAULT_BAUD_RATE);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawConnectionInfo")]
pub struct ConnectionInfo {
    address: String,
    baud_rate: u32,
    read_timeout: Duration,
    write_timeout: Duration,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConnectionInfo {
    address: String,
    #[serde(default = "default_baud_rate")]
    baud_rate: u32,
    read_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
}

fn default_baud_rate() -> u32 { DEFAULT_BAUD_RATE }

impl TryFrom<RawConnectionInfo> for ConnectionInfo {
    type Error = ConfigError;

    fn try_from(raw: RawConnectionInfo) -> Result<Self, Self::Error> {
        let mut info = Self::new(raw.address, raw.baud_rate)?;
        if let Some(ms) = raw.read_timeout_ms {
            info.read_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = raw.write_timeout_ms {
            info.write_timeout = Duration::from_millis(ms);
        }
        Ok(info)
    }
}

impl ConnectionInfo {
    /// Validate and build settings with the default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `address` is blank or `baud_rate` is zero.
    pub fn new(address: impl Into<String>, baud_rate: u32) -> Result<Self, ConfigError> {
        let info = Self {
            address: address.into(),
            baud_rate,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        };
        info.validate()?;
        Ok(info)
    }

    /// Check the settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the address is blank or the baud rate is
    /// zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::EmptyAddress);
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::ZeroBaudRate);
        }
        Ok(())
    }

    /// Replace the read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Replace the write timeout.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Device address, such as `COM3` or `/dev/ttyUSB0`.
    #[must_use]
    pub fn address(&self) -> &str { &self.address }

    /// Line speed in bits per second.
    #[must_use]
    pub fn baud_rate(&self) -> u32 { self.baud_rate }

    /// Timeout applied to each read.
    #[must_use]
    pub fn read_timeout(&self) -> Duration { self.read_timeout }

    /// Timeout applied to each write.
    #[must_use]
    pub fn write_timeout(&self) -> Duration { self.write_timeout }
}
