//! Message decoding strategies.
//!
//! A [`MessageDecoder`] turns the raw bytes of a [`Transport`] into complete
//! messages. The client engine asks it for one message at a time and never
//! inspects the bytes itself, so any wire format can be plugged in.
//!
//! [`CodecDecoder`] adapts any [`tokio_util::codec::Decoder`] and
//! [`LineDecoder`] decodes newline terminated text.
//!
//! # Termination
//!
//! Decoders report how a stream ended through [`DecodeError`]:
//!
//! - [`DecodeError::Cancelled`]: the cancellation token fired while waiting.
//! - [`DecodeError::EndOfStream`]: the peer closed the stream at a message boundary.
//! - [`DecodeError::Transport`]: the stream timed out or closed part-way through a message.
//! - [`DecodeError::Malformed`]: the bytes could not be interpreted.
//!
//! The first two end a listen cycle normally. The others are faults.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::transport::Transport;

mod error;
mod framed;

pub use error::DecodeError;
pub use framed::{CodecDecoder, DEFAULT_CHUNK_LEN, LineDecoder};

/// Produces the next complete message from a transport.
///
/// Implementations must observe `cancel` while waiting for bytes and must
/// never return a partially decoded message. Bytes read past the end of one
/// message stay buffered for the next call.
///
/// # Examples
///
/// A decoder that yields single bytes:
///
/// ```
/// use async_trait::async_trait;
/// use devicewire::{
///     codec::{DecodeError, MessageDecoder},
///     transport::Transport,
/// };
/// use tokio_util::sync::CancellationToken;
///
/// struct ByteDecoder;
///
/// #[async_trait]
/// impl MessageDecoder for ByteDecoder {
///     type Message = u8;
///
///     async fn read_message(
///         &mut self,
///         transport: &mut dyn Transport,
///         cancel: &CancellationToken,
///     ) -> Result<u8, DecodeError> {
///         let mut byte = [0u8; 1];
///         let n = tokio::select! {
///             () = cancel.cancelled() => return Err(DecodeError::Cancelled),
///             read = transport.read(&mut byte) => read?,
///         };
///         if n == 0 {
///             return Err(DecodeError::EndOfStream);
///         }
///         Ok(byte[0])
///     }
/// }
/// ```
#[async_trait]
pub trait MessageDecoder: Send {
    /// Decoded message type handed to the dispatcher.
    type Message: Send + 'static;

    /// Read bytes from `transport` until one message is complete.
    ///
    /// # Errors
    ///
    /// See the module documentation for the meaning of each
    /// [`DecodeError`] variant.
    async fn read_message(
        &mut self,
        transport: &mut dyn Transport,
        cancel: &CancellationToken,
    ) -> Result<Self::Message, DecodeError>;
}

#[cfg(test)]
mod tests;
