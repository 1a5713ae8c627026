//! Error types for device client operations.

use super::{ConfigError, ConnectionState};
use crate::{codec::DecodeError, dispatch::DispatchError, transport::TransportError};

/// Errors emitted by [`DeviceClient`](super::DeviceClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The connection settings are invalid.
    #[error("invalid connection settings: {0}")]
    Config(#[from] ConfigError),
    /// The transport could not be opened.
    #[error("failed to open {address}: {source}")]
    Connection {
        /// Address of the device.
        address: String,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },
    /// The operation is not allowed in the current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State of the client at the time.
        state: ConnectionState,
    },
    /// The decoder failed.
    #[error("failed to decode message: {0}")]
    Decode(#[source] DecodeError),
    /// The dispatcher failed.
    #[error("failed to dispatch message: {0}")]
    Dispatch(#[source] DispatchError),
}
