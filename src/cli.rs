//! Command line interface for the `devicewire` binary.
//!
//! Shared with the build script, which renders it as a man page.

use clap::Parser;

/// Command line arguments for the `devicewire` binary.
#[derive(Debug, Parser)]
#[command(
    name = "devicewire",
    version,
    about = "Log newline terminated messages from a serial device"
)]
pub struct Cli {
    /// Serial port to open, such as `COM3` or `/dev/ttyUSB0`.
    #[arg(short, long, required_unless_present = "list_ports")]
    pub port: Option<String>,
    /// Line speed in bits per second.
    #[arg(short, long, default_value_t = 9600)]
    pub baud: u32,
    /// Per-read timeout in milliseconds.
    #[arg(long, default_value_t = 500)]
    pub read_timeout_ms: u64,
    /// Per-write timeout in milliseconds.
    #[arg(long, default_value_t = 500)]
    pub write_timeout_ms: u64,
    /// Print the available serial ports and exit.
    #[arg(long)]
    pub list_ports: bool,
}
