//! Serial line logger built on `devicewire`.
//!
//! Opens a serial port, logs every newline terminated message it receives
//! and stops on Ctrl-C.

mod cli;

use std::time::Duration;

use clap::Parser;
use devicewire::{
    client::{ClientError, ConnectionInfo, DeviceClient},
    codec::LineDecoder,
    dispatch::TracingDispatcher,
    transport::available_ports,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    if cli.list_ports {
        for port in available_ports()? {
            println!("{port}");
        }
        return Ok(());
    }
    run(cli).await?;
    Ok(())
}

async fn run(cli: cli::Cli) -> Result<(), ClientError> {
    let port = cli.port.unwrap_or_default();
    let info = ConnectionInfo::new(port.clone(), cli.baud)?
        .with_read_timeout(Duration::from_millis(cli.read_timeout_ms))
        .with_write_timeout(Duration::from_millis(cli.write_timeout_ms));
    let mut client = DeviceClient::serial(info, LineDecoder::lines(), TracingDispatcher::new(port));
    client
        .events_mut()
        .subscribe_exceptions(|error| tracing::error!(%error, "device fault"));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "failed to install Ctrl-C handler");
            return;
        }
        tracing::info!("interrupt received, shutting down");
        on_interrupt.cancel();
    });

    if !client.connect(&cancel).await? {
        tracing::warn!(port = %client.connection_info().address(), "port did not open");
        return Ok(());
    }
    client.listen(&cancel).await
}
