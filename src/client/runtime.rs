//! Device client runtime.

use std::fmt;

use tokio_util::sync::CancellationToken;

use super::{ClientError, ConnectionEvent, ConnectionInfo, ConnectionState, EventBus};
use crate::{
    codec::MessageDecoder,
    dispatch::MessageDispatcher,
    metrics::{self, FaultStage},
    transport::{SerialTransport, Transport},
};

/// Requests shutdown of a client's listen cycle from another task.
///
/// Shutdown is permanent: once requested, the running listen cycle stops
/// after the message in flight and every later cycle stops before reading.
#[derive(Clone, Debug)]
pub struct ShutdownHandle(CancellationToken);

impl ShutdownHandle {
    /// Ask the client to stop listening.
    pub fn shutdown(&self) { self.0.cancel(); }

    /// Returns `true` once shutdown has been requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool { self.0.is_cancelled() }
}

/// Drives one device connection: connect, then decode and dispatch messages
/// until cancelled, disconnected or faulted.
///
/// The decoder `D` turns transport bytes into messages, the dispatcher `P`
/// handles each message, and `T` is the transport, a serial port by default.
///
/// # Examples
///
/// ```
/// use devicewire::{
///     client::{ConnectionEvent, ConnectionInfo, DeviceClient},
///     codec::LineDecoder,
///     dispatch::TracingDispatcher,
///     transport::StreamTransport,
/// };
/// use tokio::io::AsyncWriteExt;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), devicewire::client::ClientError> {
/// let (device, mut host) = tokio::io::duplex(64);
/// let info = ConnectionInfo::new("duplex", 9600)?;
/// let mut client = DeviceClient::new(
///     info,
///     LineDecoder::lines(),
///     TracingDispatcher::new("demo"),
///     StreamTransport::new("duplex", device),
/// );
/// client
///     .events_mut()
///     .subscribe(ConnectionEvent::Disconnected, |_| println!("device gone"));
///
/// let cancel = CancellationToken::new();
/// assert!(client.connect(&cancel).await?);
/// host.write_all(b"hello\n").await.expect("write");
/// drop(host);
/// client.listen(&cancel).await?;
/// assert!(!client.is_connected());
/// # Ok(())
/// # }
/// ```
pub struct DeviceClient<D, P, T = SerialTransport> {
    info: ConnectionInfo,
    decoder: D,
    dispatcher: P,
    transport: T,
    state: ConnectionState,
    events: EventBus,
    shutdown: CancellationToken,
    gauge_held: bool,
}

impl<D, P, T> fmt::Debug for DeviceClient<D, P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceClient")
            .field("info", &self.info)
            .field("state", &self.state)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl<D, P> DeviceClient<D, P, SerialTransport>
where
    D: MessageDecoder,
    P: MessageDispatcher<D::Message>,
{
    /// Build a client for the serial port described by `info`.
    #[must_use]
    pub fn serial(info: ConnectionInfo, decoder: D, dispatcher: P) -> Self {
        let transport = SerialTransport::from_info(&info);
        Self::new(info, decoder, dispatcher, transport)
    }
}

impl<D, P, T> DeviceClient<D, P, T>
where
    D: MessageDecoder,
    P: MessageDispatcher<D::Message>,
    T: Transport,
{
    /// Build a client over an unopened `transport`.
    #[must_use]
    pub fn new(info: ConnectionInfo, decoder: D, dispatcher: P, transport: T) -> Self {
        Self {
            info,
            decoder,
            dispatcher,
            transport,
            state: ConnectionState::Disconnected,
            events: EventBus::default(),
            shutdown: CancellationToken::new(),
            gauge_held: false,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState { self.state }

    /// Settings the client was built with.
    #[must_use]
    pub fn connection_info(&self) -> &ConnectionInfo { &self.info }

    /// Lifecycle subscriptions.
    pub fn events_mut(&mut self) -> &mut EventBus { &mut self.events }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T { &self.transport }

    /// Returns `true` while the transport is open.
    #[must_use]
    pub fn is_connected(&self) -> bool { self.transport.is_open() }

    /// Handle that stops [`listen`](Self::listen) from another task.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle { ShutdownHandle(self.shutdown.clone()) }

    /// Apply the configured timeouts and open the transport.
    ///
    /// Raises [`ConnectionEvent::Connected`] once if the transport reports
    /// itself open, and returns whether it did. A failed attempt is not
    /// retried and leaves the client disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidState`] if the client is already
    /// connected and [`ClientError::Connection`] if the transport fails to
    /// open.
    pub async fn connect(&mut self, cancel: &CancellationToken) -> Result<bool, ClientError> {
        if self.transport.is_open()
            || matches!(
                self.state,
                ConnectionState::Connected | ConnectionState::Listening
            )
        {
            return Err(ClientError::InvalidState {
                operation: "connect",
                state: self.state,
            });
        }

        self.transport.set_read_timeout(self.info.read_timeout());
        self.transport.set_write_timeout(self.info.write_timeout());
        tracing::debug!(
            address = %self.info.address(),
            baud = self.info.baud_rate(),
            "opening transport"
        );

        if let Err(source) = self.transport.open(cancel).await {
            if self.transport.is_open()
                && let Err(error) = self.transport.close().await
            {
                tracing::warn!(address = %self.info.address(), %error, "failed to close partially opened transport");
            }
            self.state = ConnectionState::Disconnected;
            tracing::warn!(address = %self.info.address(), error = %source, "connect failed");
            return Err(ClientError::Connection {
                address: self.info.address().to_owned(),
                source,
            });
        }

        let open = self.transport.is_open();
        if open {
            self.state = ConnectionState::Connected;
            if !self.gauge_held {
                metrics::inc_connections();
                self.gauge_held = true;
            }
            tracing::info!(address = %self.info.address(), "connected");
            self.events.raise(ConnectionEvent::Connected);
        }
        Ok(open)
    }

    /// Decode and dispatch messages until cancelled, disconnected or faulted.
    ///
    /// Messages are dispatched one at a time in decode order. The loop stops
    /// when `cancel` or the [`ShutdownHandle`] fires, when the transport
    /// closes, or when the decoder reports a clean end of stream. A message
    /// decoded after cancellation is discarded.
    ///
    /// Every exit releases the transport and raises
    /// [`ConnectionEvent::Disconnected`] once.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidState`] if the transport is not open; a
    /// faulted client stays [`ConnectionState::Faulted`].
    /// Decode and dispatch failures are published to the exception
    /// subscribers, leave the client [`ConnectionState::Faulted`] and are
    /// returned as [`ClientError::Decode`] or [`ClientError::Dispatch`].
    pub async fn listen(&mut self, cancel: &CancellationToken) -> Result<(), ClientError> {
        let result = if self.transport.is_open() {
            self.state = ConnectionState::Listening;
            tracing::debug!(address = %self.info.address(), "listening");
            let token = cancel.child_token();
            let relay = token.clone();
            let shutdown = self.shutdown.clone();
            let forward = async move {
                shutdown.cancelled().await;
                relay.cancel();
                std::future::pending::<()>().await;
            };
            tokio::select! {
                biased;
                () = forward => Ok(()),
                result = self.run_loop(&token) => result,
            }
        } else {
            Err(ClientError::InvalidState {
                operation: "listen",
                state: self.state,
            })
        };

        let stage = match &result {
            Err(ClientError::Decode(_)) => Some(FaultStage::Decode),
            Err(ClientError::Dispatch(_)) => Some(FaultStage::Dispatch),
            _ => None,
        };
        if let (Some(stage), Err(error)) = (stage, &result) {
            tracing::error!(address = %self.info.address(), %error, "listen faulted");
            metrics::inc_faults(stage);
            self.events.publish_exception(error);
        }
        let faulted = stage.is_some() || self.state == ConnectionState::Faulted;

        self.release_transport().await;
        self.state = if faulted {
            ConnectionState::Faulted
        } else {
            ConnectionState::Disconnected
        };
        tracing::info!(address = %self.info.address(), state = %self.state, "disconnected");
        self.events.raise(ConnectionEvent::Disconnected);
        result
    }

    async fn run_loop(&mut self, cancel: &CancellationToken) -> Result<(), ClientError> {
        while self.transport.is_open() && !cancel.is_cancelled() {
            let message = match self
                .decoder
                .read_message(&mut self.transport, cancel)
                .await
            {
                Ok(message) => message,
                Err(err) if err.is_termination() => {
                    tracing::debug!(reason = %err, "listen loop finished");
                    return Ok(());
                }
                Err(err) => return Err(ClientError::Decode(err)),
            };
            if cancel.is_cancelled() || !self.transport.is_open() {
                tracing::debug!("discarding message decoded during shutdown");
                return Ok(());
            }
            self.dispatcher
                .dispatch(message)
                .await
                .map_err(ClientError::Dispatch)?;
            metrics::inc_messages();
        }
        Ok(())
    }

    async fn release_transport(&mut self) {
        if let Err(error) = self.transport.close().await {
            tracing::warn!(address = %self.info.address(), %error, "failed to close transport");
        }
        if self.gauge_held {
            metrics::dec_connections();
            self.gauge_held = false;
        }
    }

    /// Close the transport. Safe to call repeatedly.
    ///
    /// A faulted client stays [`ConnectionState::Faulted`]; any other state
    /// becomes [`ConnectionState::Disconnected`].
    pub async fn dispose(&mut self) {
        self.release_transport().await;
        if self.state != ConnectionState::Faulted {
            self.state = ConnectionState::Disconnected;
        }
    }
}

impl<D, P, T> Drop for DeviceClient<D, P, T> {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if self.gauge_held {
            metrics::dec_connections();
        }
    }
}
