//! Transport layer for the SPI bridge.
//!
//! Provides the duplex byte channel the bridge runs on:
//! - [`BridgeStream`], a connected Unix domain socket stream
//! - [`UnixDomainSocket`] for connect (client) and bind/accept (emulator)
//! - [`io::send_exact`] / [`io::receive_exact`] with exact-length semantics
//!
//! This is the lowest layer. The frame builders never touch it; the
//! transceiver in `spibridge-core` is its only consumer.

pub mod error;
pub mod io;
#[cfg(unix)]
pub mod stream;
#[cfg(unix)]
pub mod uds;

/// Well-known endpoint served by the process that owns the SPI bus.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/lora.sock";

pub use error::{Result, TransportError};
pub use io::{receive_exact, send_exact};

#[cfg(unix)]
pub use stream::BridgeStream;
#[cfg(unix)]
pub use uds::UnixDomainSocket;
