#![doc(html_root_url = "https://docs.rs/devicewire/latest")]
//! Public API for the `devicewire` library.
//!
//! This crate drives byte-stream devices such as microcontrollers on a
//! serial link. A [`DeviceClient`] opens a [`Transport`], asks a
//! [`MessageDecoder`] for each framed message, hands it to a
//! [`MessageDispatcher`] and reports connects, disconnects and faults through
//! its [`EventBus`](client::EventBus).
//!
//! Transports stage their I/O through pooled [`BufferSegment`]s so steady
//! state reads do not allocate.

pub mod client;
pub mod codec;
pub mod dispatch;
pub mod metrics;
pub mod panic;
pub mod segment;
pub mod test_helpers;
pub mod transport;

pub use client::{
    ClientError,
    ConnectionEvent,
    ConnectionInfo,
    ConnectionState,
    DeviceClient,
    ShutdownHandle,
};
pub use codec::{CodecDecoder, DecodeError, LineDecoder, MessageDecoder};
pub use dispatch::{DispatchError, FnDispatcher, MessageDispatcher, TracingDispatcher};
pub use metrics::{CONNECTIONS_ACTIVE, FAULTS_TOTAL, FaultStage, MESSAGES_DISPATCHED};
pub use segment::{BufferPool, BufferSegment, SegmentError};
pub use transport::{SerialTransport, StreamTransport, Transport, TransportError};
