//! Byte-stream transports consumed by the client engine.
//!
//! A [`Transport`] opens and closes a channel to the device and moves raw
//! bytes. The engine only opens, closes and queries it; decoders and
//! dispatchers use the read and write primitives.
//!
//! Two implementations are provided: [`SerialTransport`] for serial ports and
//! [`StreamTransport`] for any Tokio byte stream such as a TCP socket or an
//! in-memory duplex pipe.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

mod error;
mod serial;
mod stream;

pub use error::TransportError;
pub use serial::{SerialTransport, available_ports};
pub use stream::StreamTransport;

/// A channel to a byte-stream device.
///
/// Timeouts are configured before [`open`](Self::open) and apply to each
/// individual read or write. Reads return `Ok(0)` once the peer has closed
/// the stream.
#[async_trait]
pub trait Transport: Send {
    /// Human readable address used in logs and errors.
    fn name(&self) -> &str;

    /// Set the per-read timeout used by subsequent opens.
    fn set_read_timeout(&mut self, timeout: Duration);

    /// Set the per-write timeout used by subsequent opens.
    fn set_write_timeout(&mut self, timeout: Duration);

    /// Returns `true` while the channel is open.
    fn is_open(&self) -> bool;

    /// Open the channel, abandoning the attempt if `cancel` fires.
    ///
    /// Opening an already open transport succeeds without side effects.
    async fn open(&mut self, cancel: &CancellationToken) -> Result<(), TransportError>;

    /// Close the channel. Closing a closed transport is a no-op.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Read up to `buf.len()` bytes, returning how many were read.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write all of `data`.
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;
}
