//! Error type for message decoders.

use std::error::Error;

use thiserror::Error;

use crate::transport::TransportError;

/// Reasons a decoder did not produce a message.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Cancellation was requested while waiting for bytes.
    #[error("decode cancelled")]
    Cancelled,
    /// The peer closed the stream cleanly between messages.
    #[error("end of stream")]
    EndOfStream,
    /// The transport failed, timed out or closed mid-message.
    #[error("transport failed while decoding: {0}")]
    Transport(#[from] TransportError),
    /// The received bytes do not form a valid message.
    #[error("malformed message: {0}")]
    Malformed(#[source] Box<dyn Error + Send + Sync>),
}

impl DecodeError {
    /// Wrap a decoder specific failure as [`DecodeError::Malformed`].
    pub fn malformed(cause: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::Malformed(cause.into())
    }

    /// Returns `true` for the variants that end a listen cycle normally.
    #[must_use]
    pub fn is_termination(&self) -> bool { matches!(self, Self::Cancelled | Self::EndOfStream) }
}
