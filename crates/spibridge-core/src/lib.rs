//! SPI register access over a byte-stream bridge.
//!
//! Callers read and write registers through [`SpiBridge`] without knowing
//! whether the bus is local or proxied. Underneath:
//! - [`Transceiver`] sends one frame and validates the equal-length reply
//! - [`BurstChunker`] splits bursts into bounded chunks and reassembles reads
//! - [`diag`] reports frame, I/O and validation events to a pluggable sink
//!
//! The [`emulator`] module serves the same protocol from an in-memory
//! register bank.

pub mod bridge;
pub mod burst;
pub mod config;
pub mod diag;
pub mod emulator;
pub mod error;
pub mod transceiver;

#[cfg(test)]
mod testing;

pub use bridge::SpiBridge;
pub use burst::BurstChunker;
pub use config::{BridgeConfig, StatusCheck};
pub use diag::{
    Diagnostic, DiagnosticSink, IoStage, RecordingSink, TracingSink, TransactionState,
};
#[cfg(unix)]
pub use emulator::EmulatorListener;
pub use emulator::{RegisterBank, RegisterEmulator, STATUS_BURST_REJECTED};
pub use error::{BridgeError, ErrorKind, ProtocolError, Result};
pub use transceiver::Transceiver;
