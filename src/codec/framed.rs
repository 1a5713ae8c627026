//! Decoders built from `tokio_util` codecs.

use std::error::Error;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio_util::{
    codec::{Decoder, LinesCodec},
    sync::CancellationToken,
};

use super::{DecodeError, MessageDecoder};
use crate::transport::{Transport, TransportError};

/// Bytes requested from the transport per read.
pub const DEFAULT_CHUNK_LEN: usize = 1024;

/// Drives a [`Decoder`] over a [`Transport`].
///
/// Bytes are accumulated in an internal buffer until the codec yields a
/// frame. A read timeout while nothing is buffered is treated as an idle
/// poll and the wait continues; a timeout with a partial frame buffered is a
/// fault. End of stream with an empty buffer is [`DecodeError::EndOfStream`];
/// with a partial frame it is [`TransportError::Closed`].
#[derive(Debug)]
pub struct CodecDecoder<C> {
    codec: C,
    buffer: BytesMut,
    chunk: Vec<u8>,
}

/// Decoder for newline terminated UTF-8 lines.
pub type LineDecoder = CodecDecoder<LinesCodec>;

impl<C> CodecDecoder<C> {
    /// Wrap `codec`, reading [`DEFAULT_CHUNK_LEN`] bytes at a time.
    pub fn new(codec: C) -> Self { Self::with_chunk_len(codec, DEFAULT_CHUNK_LEN) }

    /// Wrap `codec`, reading at most `chunk_len` bytes per transport read.
    pub fn with_chunk_len(codec: C, chunk_len: usize) -> Self {
        Self {
            codec,
            buffer: BytesMut::new(),
            chunk: vec![0; chunk_len.max(1)],
        }
    }

    /// The wrapped codec.
    #[must_use]
    pub fn codec(&self) -> &C { &self.codec }

    /// Number of bytes received but not yet decoded.
    #[must_use]
    pub fn buffered(&self) -> usize { self.buffer.len() }
}

impl CodecDecoder<LinesCodec> {
    /// Decode lines of any length.
    #[must_use]
    pub fn lines() -> Self { Self::new(LinesCodec::new()) }

    /// Decode lines, rejecting any longer than `max_length` bytes.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self::new(LinesCodec::new_with_max_length(max_length))
    }
}

impl<C> CodecDecoder<C> {
    fn finish(&self) -> DecodeError {
        if self.buffer.is_empty() {
            return DecodeError::EndOfStream;
        }
        tracing::debug!(
            buffered = self.buffer.len(),
            "stream closed with a partial message buffered"
        );
        DecodeError::Transport(TransportError::Closed)
    }
}

#[async_trait]
impl<C> MessageDecoder for CodecDecoder<C>
where
    C: Decoder + Send,
    C::Item: Send + 'static,
    C::Error: Error + Send + Sync + 'static,
{
    type Message = C::Item;

    async fn read_message(
        &mut self,
        transport: &mut dyn Transport,
        cancel: &CancellationToken,
    ) -> Result<C::Item, DecodeError> {
        loop {
            if let Some(message) = self
                .codec
                .decode(&mut self.buffer)
                .map_err(DecodeError::malformed)?
            {
                return Ok(message);
            }
            let read = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DecodeError::Cancelled),
                read = transport.read(&mut self.chunk) => read,
            };
            match read {
                Ok(0) => return Err(self.finish()),
                Ok(n) => {
                    let filled = n.min(self.chunk.len());
                    self.buffer.extend_from_slice(&self.chunk[..filled]);
                }
                Err(err) if err.is_timeout() && self.buffer.is_empty() => {}
                Err(err) => return Err(err.into()),
            }
        }
    }
}
