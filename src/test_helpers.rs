#![cfg(any(test, feature = "test-helpers"))]
//! Scripted doubles for exercising the client engine.

use std::{
    collections::VecDeque,
    fmt,
    io,
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    client::{ClientError, ConnectionEvent, EventBus},
    codec::{DecodeError, MessageDecoder},
    dispatch::{DispatchError, MessageDispatcher},
    transport::{Transport, TransportError},
};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How [`MockTransport::open`] behaves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OpenBehaviour {
    /// Open successfully.
    #[default]
    Succeed,
    /// Fail without opening.
    Fail,
    /// Open, then report a failure.
    FailAfterOpening,
    /// Report success without opening.
    StayClosed,
}

/// In-memory transport that records how the engine drives it.
#[derive(Debug, Default)]
pub struct MockTransport {
    behaviour: OpenBehaviour,
    open: bool,
    open_calls: usize,
    close_calls: usize,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    incoming: VecDeque<Vec<u8>>,
}

impl MockTransport {
    /// A transport that opens successfully and reads end of stream.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// A transport whose `open` behaves as described by `behaviour`.
    #[must_use]
    pub fn with_behaviour(behaviour: OpenBehaviour) -> Self {
        Self {
            behaviour,
            ..Self::default()
        }
    }

    /// Queue `chunk` to be returned by a later read.
    #[must_use]
    pub fn with_incoming(mut self, chunk: impl Into<Vec<u8>>) -> Self {
        self.incoming.push_back(chunk.into());
        self
    }

    /// Times `open` was called.
    #[must_use]
    pub fn open_calls(&self) -> usize { self.open_calls }

    /// Times `close` was called.
    #[must_use]
    pub fn close_calls(&self) -> usize { self.close_calls }

    /// Last read timeout applied.
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> { self.read_timeout }

    /// Last write timeout applied.
    #[must_use]
    pub fn write_timeout(&self) -> Option<Duration> { self.write_timeout }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str { "mock" }

    fn set_read_timeout(&mut self, timeout: Duration) { self.read_timeout = Some(timeout); }

    fn set_write_timeout(&mut self, timeout: Duration) { self.write_timeout = Some(timeout); }

    fn is_open(&self) -> bool { self.open }

    async fn open(&mut self, _cancel: &CancellationToken) -> Result<(), TransportError> {
        self.open_calls += 1;
        match self.behaviour {
            OpenBehaviour::Succeed => {
                self.open = true;
                Ok(())
            }
            OpenBehaviour::Fail => Err(io::Error::from(io::ErrorKind::NotFound).into()),
            OpenBehaviour::FailAfterOpening => {
                self.open = true;
                Err(io::Error::from(io::ErrorKind::PermissionDenied).into())
            }
            OpenBehaviour::StayClosed => Ok(()),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.close_calls += 1;
        self.open = false;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        let Some(mut chunk) = self.incoming.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.incoming.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    async fn write(&mut self, _data: &[u8]) -> Result<(), TransportError> {
        if self.open {
            Ok(())
        } else {
            Err(TransportError::NotOpen)
        }
    }
}

/// What a [`ScriptedDecoder`] does once its messages run out.
#[derive(Clone, Debug)]
pub enum ScriptEnd {
    /// Report a clean end of stream.
    EndOfStream,
    /// Wait until cancelled.
    AwaitCancel,
    /// Report a malformed message with the given reason.
    Malformed(&'static str),
}

/// Decoder that yields a fixed list of messages without reading the
/// transport.
pub struct ScriptedDecoder<M> {
    script: VecDeque<M>,
    end: ScriptEnd,
    cancel_on: Option<(usize, CancellationToken)>,
    close_on: Option<usize>,
    reads: Arc<AtomicUsize>,
}

impl<M> fmt::Debug for ScriptedDecoder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedDecoder")
            .field("remaining", &self.script.len())
            .field("end", &self.end)
            .finish_non_exhaustive()
    }
}

impl<M> ScriptedDecoder<M> {
    /// Yield `messages` in order, then behave as `end` describes.
    pub fn new(messages: impl IntoIterator<Item = M>, end: ScriptEnd) -> Self {
        Self {
            script: messages.into_iter().collect(),
            end,
            cancel_on: None,
            close_on: None,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Cancel `token` while producing the `nth` message (1-based). The
    /// message is still returned.
    #[must_use]
    pub fn cancelling_on(mut self, nth: usize, token: CancellationToken) -> Self {
        self.cancel_on = Some((nth, token));
        self
    }

    /// Close the transport while producing the `nth` message (1-based). The
    /// message is still returned.
    #[must_use]
    pub fn closing_transport_on(mut self, nth: usize) -> Self {
        self.close_on = Some(nth);
        self
    }

    /// Shared count of `read_message` calls.
    #[must_use]
    pub fn reads(&self) -> Arc<AtomicUsize> { Arc::clone(&self.reads) }
}

#[async_trait]
impl<M: Send + 'static> MessageDecoder for ScriptedDecoder<M> {
    type Message = M;

    async fn read_message(
        &mut self,
        transport: &mut dyn Transport,
        cancel: &CancellationToken,
    ) -> Result<M, DecodeError> {
        let call = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(message) = self.script.pop_front() {
            if let Some((nth, token)) = &self.cancel_on
                && *nth == call
            {
                token.cancel();
            }
            if self.close_on == Some(call) {
                transport.close().await?;
            }
            return Ok(message);
        }
        match &self.end {
            ScriptEnd::EndOfStream => Err(DecodeError::EndOfStream),
            ScriptEnd::AwaitCancel => {
                cancel.cancelled().await;
                Err(DecodeError::Cancelled)
            }
            ScriptEnd::Malformed(reason) => Err(DecodeError::malformed(*reason)),
        }
    }
}

/// Dispatcher that records every message it accepts.
#[derive(Debug)]
pub struct RecordingDispatcher<M> {
    log: Arc<Mutex<Vec<M>>>,
    fail_on: Option<M>,
}

impl<M> Default for RecordingDispatcher<M> {
    fn default() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            fail_on: None,
        }
    }
}

impl<M> RecordingDispatcher<M> {
    /// Accept every message.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Reject `message` (without recording it) and accept the rest.
    #[must_use]
    pub fn failing_on(message: M) -> Self {
        Self {
            fail_on: Some(message),
            ..Self::default()
        }
    }

    /// Shared log of accepted messages.
    #[must_use]
    pub fn log(&self) -> Arc<Mutex<Vec<M>>> { Arc::clone(&self.log) }
}

#[async_trait]
impl<M> MessageDispatcher<M> for RecordingDispatcher<M>
where
    M: fmt::Debug + PartialEq + Send + 'static,
{
    async fn dispatch(&mut self, message: M) -> Result<(), DispatchError> {
        if self.fail_on.as_ref() == Some(&message) {
            return Err(DispatchError::new(format!("refused {message:?}")));
        }
        lock(&self.log).push(message);
        Ok(())
    }
}

/// Something an [`EventLog`] observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Observed {
    /// [`ConnectionEvent::Connected`] was raised.
    Connected,
    /// [`ConnectionEvent::Disconnected`] was raised.
    Disconnected,
    /// An exception was published; holds its message.
    Exception(String),
}

/// Records every event and exception published on an [`EventBus`].
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<Observed>>>,
}

impl EventLog {
    /// Subscribe a new log to every channel of `bus`.
    #[must_use]
    pub fn attach(bus: &mut EventBus) -> Self {
        let log = Self::default();
        for event in [ConnectionEvent::Connected, ConnectionEvent::Disconnected] {
            let entries = Arc::clone(&log.entries);
            bus.subscribe(event, move |raised| {
                lock(&entries).push(match raised {
                    ConnectionEvent::Connected => Observed::Connected,
                    ConnectionEvent::Disconnected => Observed::Disconnected,
                });
            });
        }
        let entries = Arc::clone(&log.entries);
        bus.subscribe_exceptions(move |error: &ClientError| {
            lock(&entries).push(Observed::Exception(error.to_string()));
        });
        log
    }

    /// Everything observed so far, in order.
    #[must_use]
    pub fn entries(&self) -> Vec<Observed> { lock(&self.entries).clone() }

    /// Number of times `entry` was observed.
    #[must_use]
    pub fn count(&self, entry: &Observed) -> usize {
        lock(&self.entries).iter().filter(|seen| *seen == entry).count()
    }

    /// Number of exceptions observed.
    #[must_use]
    pub fn exceptions(&self) -> usize {
        lock(&self.entries)
            .iter()
            .filter(|seen| matches!(seen, Observed::Exception(_)))
            .count()
    }
}
