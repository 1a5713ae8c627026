//! Serial port transport backed by the `serialport` crate.
//!
//! The driver is blocking, so every open, read and write runs on Tokio's
//! blocking pool. Bytes are staged through pooled [`BufferSegment`]s: one
//! read segment lives as long as the port is open, and each write rents a
//! segment sized to the payload and releases it once written.
//!
//! A blocking read cannot be interrupted. When a caller stops waiting on
//! [`Transport::read`], the driver call keeps running and its bytes are
//! delivered by the next read. [`Transport::close`] waits for it to finish
//! before the port and staging buffer are let go.

use std::{
    io::{self, Read, Write},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use bytes::BytesMut;
use serialport::SerialPort;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use super::{Transport, TransportError};
use crate::{
    client::{ConnectionInfo, DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT},
    segment::{BufferPool, BufferSegment, SegmentError},
};

/// Size of the per-connection read staging buffer.
pub const READ_STAGING_LEN: usize = 4096;

type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;
type PendingRead = JoinHandle<Result<io::Result<usize>, SegmentError>>;

/// List the serial ports visible to the operating system.
///
/// # Errors
///
/// Returns [`TransportError::Serial`] if enumeration fails.
pub fn available_ports() -> Result<Vec<String>, TransportError> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|port| port.port_name)
        .collect())
}

/// A serial port, opened on demand.
pub struct SerialTransport {
    path: String,
    baud_rate: u32,
    read_timeout: Duration,
    write_timeout: Duration,
    port: Option<SharedPort>,
    staging: BufferSegment<u8>,
    pending_read: Option<PendingRead>,
    backlog: BytesMut,
    pool: BufferPool<u8>,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.path)
            .field("baud_rate", &self.baud_rate)
            .field("open", &self.port.is_some())
            .finish_non_exhaustive()
    }
}

fn join_failure(err: JoinError) -> TransportError {
    TransportError::Io(io::Error::other(format!("blocking serial task failed: {err}")))
}

fn lock_port(port: &SharedPort) -> std::sync::MutexGuard<'_, Box<dyn SerialPort>> {
    port.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SerialTransport {
    /// Describe a port at `path` running at `baud_rate`. Nothing is opened
    /// until [`Transport::open`].
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            port: None,
            staging: BufferSegment::default(),
            pending_read: None,
            backlog: BytesMut::new(),
            pool: BufferPool::shared(),
        }
    }

    /// Describe the port named by `info`, including its timeouts.
    #[must_use]
    pub fn from_info(info: &ConnectionInfo) -> Self {
        let mut transport = Self::new(info.address(), info.baud_rate());
        transport.read_timeout = info.read_timeout();
        transport.write_timeout = info.write_timeout();
        transport
    }

    /// Stage I/O through `pool` instead of the process-wide pool.
    #[must_use]
    pub fn with_pool(mut self, pool: BufferPool<u8>) -> Self {
        self.pool = pool;
        self
    }

    /// Configured baud rate.
    #[must_use]
    pub fn baud_rate(&self) -> u32 { self.baud_rate }

    fn attach(&mut self, port: Box<dyn SerialPort>) {
        self.port = Some(Arc::new(Mutex::new(port)));
        self.staging = BufferSegment::rent(&self.pool, READ_STAGING_LEN);
    }

    fn start_read(&self, len: usize) -> Result<PendingRead, TransportError> {
        let port = self.port.clone().ok_or(TransportError::NotOpen)?;
        let window = self.staging.slice_len(0, len.min(self.staging.len()))?;
        Ok(tokio::task::spawn_blocking(move || {
            window.with_slice_mut(|dst| lock_port(&port).read(dst))
        }))
    }

    fn drain_backlog(&mut self, buf: &mut [u8]) -> usize {
        let n = self.backlog.len().min(buf.len());
        buf[..n].copy_from_slice(&self.backlog.split_to(n));
        n
    }

    fn release_staging(&mut self) {
        let staging = std::mem::take(&mut self.staging);
        if !staging.is_absent()
            && let Err(error) = staging.release()
        {
            tracing::warn!(port = %self.path, %error, "failed to release serial staging buffer");
        }
    }

    fn map_io(&self, operation: &'static str, err: io::Error) -> TransportError {
        if err.kind() == io::ErrorKind::TimedOut {
            let timeout = if operation == "read" {
                self.read_timeout
            } else {
                self.write_timeout
            };
            TransportError::TimedOut { operation, timeout }
        } else {
            TransportError::Io(err)
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn name(&self) -> &str { &self.path }

    fn set_read_timeout(&mut self, timeout: Duration) { self.read_timeout = timeout; }

    fn set_write_timeout(&mut self, timeout: Duration) { self.write_timeout = timeout; }

    fn is_open(&self) -> bool { self.port.is_some() }

    async fn open(&mut self, cancel: &CancellationToken) -> Result<(), TransportError> {
        if self.port.is_some() {
            return Ok(());
        }
        let builder = serialport::new(self.path.clone(), self.baud_rate).timeout(self.read_timeout);
        let opening = tokio::task::spawn_blocking(move || builder.open());
        let port = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(TransportError::Cancelled),
            joined = opening => joined.map_err(join_failure)??,
        };
        tracing::debug!(port = %self.path, baud = self.baud_rate, "serial port opened");
        self.attach(port);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(pending) = self.pending_read.take() {
            tracing::debug!(port = %self.path, "waiting for in-flight serial read");
            if let Err(error) = pending.await {
                tracing::warn!(port = %self.path, %error, "in-flight serial read failed");
            }
        }
        self.backlog.clear();
        if self.port.take().is_some() {
            tracing::debug!(port = %self.path, "serial port closed");
        }
        self.release_staging();
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.port.is_none() {
            return Err(TransportError::NotOpen);
        }
        if !self.backlog.is_empty() {
            return Ok(self.drain_backlog(buf));
        }
        if self.pending_read.is_none() {
            let started = self.start_read(buf.len())?;
            self.pending_read = Some(started);
        }
        let joined = match self.pending_read.as_mut() {
            Some(pending) => pending.await,
            None => return Err(TransportError::NotOpen),
        };
        self.pending_read = None;

        let n = joined
            .map_err(join_failure)??
            .map_err(|err| self.map_io("read", err))?;
        let filled = self.staging.slice_len(0, n)?;
        let direct = n.min(buf.len());
        filled.slice_len(0, direct)?.copy_to_slice(&mut buf[..direct])?;
        if direct < n {
            let backlog = &mut self.backlog;
            filled
                .slice(direct)?
                .with_slice(|rest| backlog.extend_from_slice(rest))?;
        }
        Ok(direct)
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let port = self.port.clone().ok_or(TransportError::NotOpen)?;
        let segment = BufferSegment::rent(&self.pool, data.len());
        segment.with_slice_mut(|dst| dst.copy_from_slice(data))?;
        let (read_timeout, write_timeout) = (self.read_timeout, self.write_timeout);
        let written = tokio::task::spawn_blocking(move || {
            let result = segment.with_slice(|src| {
                let mut port = lock_port(&port);
                port.set_timeout(write_timeout)?;
                let outcome = port.write_all(src).and_then(|()| port.flush());
                port.set_timeout(read_timeout)?;
                outcome
            });
            if let Err(error) = segment.release() {
                tracing::warn!(%error, "failed to release serial write buffer");
            }
            result
        })
        .await
        .map_err(join_failure)??;
        written.map_err(|err| self.map_io("write", err))
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.pending_read.is_some() {
            tracing::debug!(port = %self.path, "serial read in flight; staging buffer dropped with it");
            return;
        }
        self.release_staging();
    }
}
