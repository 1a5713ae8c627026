//! Transport over any Tokio byte stream.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::{Transport, TransportError};

/// Wraps an already established stream.
///
/// `open` activates the stream handed to [`StreamTransport::new`]; `close`
/// shuts it down and drops it. A stream can only be opened once, so reopening
/// fails with [`TransportError::Exhausted`].
///
/// # Examples
///
/// ```
/// use devicewire::transport::{StreamTransport, Transport};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), devicewire::transport::TransportError> {
/// let (device, _host) = tokio::io::duplex(64);
/// let mut transport = StreamTransport::new("duplex", device);
/// transport.open(&CancellationToken::new()).await?;
/// assert!(transport.is_open());
/// transport.close().await?;
/// assert!(!transport.is_open());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StreamTransport<S> {
    name: String,
    pending: Option<S>,
    stream: Option<S>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl<S> StreamTransport<S> {
    /// Wrap `stream`, identified in logs by `name`.
    pub fn new(name: impl Into<String>, stream: S) -> Self {
        Self {
            name: name.into(),
            pending: Some(stream),
            stream: None,
            read_timeout: crate::client::DEFAULT_READ_TIMEOUT,
            write_timeout: crate::client::DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Current read timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Duration { self.read_timeout }

    /// Current write timeout.
    #[must_use]
    pub fn write_timeout(&self) -> Duration { self.write_timeout }
}

async fn bounded<T>(
    operation: &'static str,
    timeout: Duration,
    fut: impl Future<Output = std::io::Result<T>>,
) -> Result<T, TransportError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(TransportError::from),
        Err(_) => Err(TransportError::TimedOut { operation, timeout }),
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &str { &self.name }

    fn set_read_timeout(&mut self, timeout: Duration) { self.read_timeout = timeout; }

    fn set_write_timeout(&mut self, timeout: Duration) { self.write_timeout = timeout; }

    fn is_open(&self) -> bool { self.stream.is_some() }

    async fn open(&mut self, cancel: &CancellationToken) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        self.stream = Some(self.pending.take().ok_or(TransportError::Exhausted)?);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        bounded("shutdown", self.write_timeout, stream.shutdown()).await
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        bounded("read", self.read_timeout, stream.read(buf)).await
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        bounded("write", self.write_timeout, async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
    }
}
