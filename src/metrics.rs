//! Metric helpers for `devicewire`.
//!
//! This module defines metric names and helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking open device connections.
pub const CONNECTIONS_ACTIVE: &str = "devicewire_connections_active";
/// Name of the counter tracking dispatched messages.
pub const MESSAGES_DISPATCHED: &str = "devicewire_messages_dispatched_total";
/// Name of the counter tracking faulted listen cycles.
pub const FAULTS_TOTAL: &str = "devicewire_faults_total";

/// Stage of the listen loop that faulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultStage {
    /// The decoder failed.
    Decode,
    /// The dispatcher failed.
    Dispatch,
}

impl FaultStage {
    /// Label value recorded with [`FAULTS_TOTAL`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FaultStage::Decode => "decode",
            FaultStage::Dispatch => "dispatch",
        }
    }
}

/// Increment the open connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the open connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a dispatched message.
pub fn inc_messages() {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_DISPATCHED).increment(1);
}

/// Record a faulted listen cycle.
pub fn inc_faults(stage: FaultStage) {
    #[cfg(feature = "metrics")]
    counter!(FAULTS_TOTAL, "stage" => stage.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = stage;
}
