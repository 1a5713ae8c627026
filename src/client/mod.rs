//! Device client engine.
//!
//! [`DeviceClient`] owns a transport, a decoder and a dispatcher and runs the
//! connect, listen and disconnect lifecycle. Lifecycle notifications and
//! faults are published through the client's [`EventBus`].

mod config;
mod error;
mod events;
mod runtime;
mod state;

pub use config::{
    ConfigError,
    ConnectionInfo,
    DEFAULT_BAUD_RATE,
    DEFAULT_READ_TIMEOUT,
    DEFAULT_WRITE_TIMEOUT,
};
pub use error::ClientError;
pub use events::{
    ConnectionEvent,
    ConnectionHandler,
    EventBus,
    ExceptionHandler,
    SubscriptionId,
};
pub use runtime::{DeviceClient, ShutdownHandle};
pub use state::ConnectionState;
