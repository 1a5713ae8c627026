//! Connection lifecycle states.

use std::fmt;

/// Where a [`DeviceClient`](super::DeviceClient) is in its lifecycle.
///
/// ```text
/// Disconnected --connect--> Connected --listen--> Listening
///      ^                                            |
///      +--------- cancelled / end of stream --------+
///                                                   |
///                  Faulted <-- decode/dispatch error +
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No open transport. Initial state.
    #[default]
    Disconnected,
    /// The transport is open and no listen is running.
    Connected,
    /// A listen cycle is decoding and dispatching messages.
    Listening,
    /// The last listen cycle ended in an error and released the transport.
    Faulted,
}

impl ConnectionState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Listening => "listening",
            Self::Faulted => "faulted",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}
