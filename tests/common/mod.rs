//! Shared utilities for integration tests.
//!
//! Builds clients over in-memory duplex pipes and records what their event
//! buses publish.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use devicewire::{
    client::{ConnectionEvent, ConnectionInfo, DeviceClient, EventBus},
    codec::LineDecoder,
    dispatch::{DispatchError, FnDispatcher},
    transport::StreamTransport,
};
use rstest::fixture;
use tokio::io::DuplexStream;

/// Shared log of strings.
pub type Log = Arc<Mutex<Vec<String>>>;

/// The settings used by the end-to-end scenarios.
#[fixture]
pub fn scenario_info() -> ConnectionInfo {
    ConnectionInfo::new("X", 9600)
        .expect("valid settings")
        .with_read_timeout(Duration::from_millis(100))
        .with_write_timeout(Duration::from_millis(100))
}

/// Subscribe to every channel of `bus`, recording `connected`,
/// `disconnected` and `exception: <message>` entries in order.
pub fn record_events(bus: &mut EventBus) -> Log {
    let log: Log = Arc::default();
    for event in [ConnectionEvent::Connected, ConnectionEvent::Disconnected] {
        let log = Arc::clone(&log);
        bus.subscribe(event, move |raised| {
            log.lock().expect("event log").push(raised.to_string());
        });
    }
    let exceptions = Arc::clone(&log);
    bus.subscribe_exceptions(move |error| {
        exceptions
            .lock()
            .expect("event log")
            .push(format!("exception: {error}"));
    });
    log
}

/// Dispatcher that appends each line to `log`, failing on `reject`.
pub fn recording_dispatcher(
    log: Log,
    reject: Option<&'static str>,
) -> FnDispatcher<impl FnMut(String) -> std::future::Ready<Result<(), DispatchError>> + Send> {
    FnDispatcher::new(move |line: String| {
        let outcome = if reject == Some(line.as_str()) {
            Err(DispatchError::new(format!("rejected {line}")))
        } else {
            log.lock().expect("dispatch log").push(line);
            Ok(())
        };
        std::future::ready(outcome)
    })
}

/// A line client over one end of a duplex pipe. Returns the client, the
/// host end of the pipe, the dispatch log and the event log.
pub fn duplex_line_client(
    info: ConnectionInfo,
    reject: Option<&'static str>,
) -> (
    DeviceClient<
        LineDecoder,
        FnDispatcher<impl FnMut(String) -> std::future::Ready<Result<(), DispatchError>> + Send>,
        StreamTransport<DuplexStream>,
    >,
    DuplexStream,
    Log,
    Log,
) {
    let (device, host) = tokio::io::duplex(1024);
    let dispatched: Log = Arc::default();
    let mut client = DeviceClient::new(
        info,
        LineDecoder::lines(),
        recording_dispatcher(Arc::clone(&dispatched), reject),
        StreamTransport::new("duplex", device),
    );
    let events = record_events(client.events_mut());
    (client, host, dispatched, events)
}

/// Snapshot of a log.
pub fn entries(log: &Log) -> Vec<String> { log.lock().expect("log").clone() }
