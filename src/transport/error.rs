//! Error types for transports.

use std::{io, time::Duration};

use thiserror::Error;

use crate::segment::SegmentError;

/// Errors reported by a [`Transport`](super::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying I/O failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
    /// The serial port driver rejected an operation.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    /// A read or write did not complete within the configured timeout.
    #[error("{operation} timed out after {timeout:?}")]
    TimedOut {
        /// The operation that timed out.
        operation: &'static str,
        /// The timeout in force.
        timeout: Duration,
    },
    /// The operation requires an open transport.
    #[error("transport is not open")]
    NotOpen,
    /// The peer closed the stream.
    #[error("transport closed by peer")]
    Closed,
    /// The transport can not be opened again after being closed.
    #[error("transport can not be reopened")]
    Exhausted,
    /// Opening was abandoned because cancellation was requested.
    #[error("open cancelled")]
    Cancelled,
    /// Staging bytes through a pooled buffer failed.
    #[error("staging buffer error: {0}")]
    Staging(#[from] SegmentError),
}

impl TransportError {
    /// Returns `true` for read or write timeouts.
    #[must_use]
    pub fn is_timeout(&self) -> bool { matches!(self, Self::TimedOut { .. }) }
}
