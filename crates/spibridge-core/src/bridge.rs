use std::io::{Read, Write};
use std::sync::Arc;

use spibridge_frame::{build_read, build_write, AddressingMode, RegisterAddress};
#[cfg(unix)]
use spibridge_transport::{BridgeStream, UnixDomainSocket};
use tracing::debug;

use crate::burst::BurstChunker;
use crate::config::BridgeConfig;
use crate::diag::{Diagnostic, DiagnosticSink, TracingSink};
use crate::error::Result;
use crate::transceiver::Transceiver;

/// Register access over one bridge channel.
///
/// `T` is the transport handle: a [`BridgeStream`], or `&mut` one when the
/// caller keeps ownership. Every operation takes `&mut self`, so a bridge
/// never has two transactions in flight. Threads that share one channel
/// must share one bridge behind a lock.
pub struct SpiBridge<T> {
    handle: T,
    chunker: BurstChunker,
    config: BridgeConfig,
    sink: Arc<dyn DiagnosticSink>,
}

impl<T: Read + Write> SpiBridge<T> {
    /// Wrap an open handle.
    pub fn new(handle: T, config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            handle,
            chunker: BurstChunker::from_config(&config),
            config,
            sink: Arc::new(TracingSink),
        })
    }

    /// Replace the diagnostics sink.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Write one register.
    pub fn write(
        &mut self,
        mode: AddressingMode,
        mux_target: u8,
        address: u8,
        data: u8,
    ) -> Result<()> {
        self.note_address(address);
        let frame = build_write(mode, mux_target, address, data);
        self.transceiver().transceive(&frame)?;
        Ok(())
    }

    /// Read one register.
    pub fn read(&mut self, mode: AddressingMode, mux_target: u8, address: u8) -> Result<u8> {
        self.note_address(address);
        let frame = build_read(mode, mux_target, address);
        let reply = self.transceiver().transceive(&frame)?;
        Ok(reply[frame.data_offset()])
    }

    /// Write `payload` as one burst starting at `address`.
    pub fn burst_write(
        &mut self,
        mode: AddressingMode,
        mux_target: u8,
        address: u8,
        payload: &[u8],
    ) -> Result<()> {
        self.note_address(address);
        let chunker = self.chunker;
        chunker.write(&mut self.transceiver(), mode, mux_target, address, payload)
    }

    /// Read `len` bytes as one burst starting at `address`.
    pub fn burst_read(
        &mut self,
        mode: AddressingMode,
        mux_target: u8,
        address: u8,
        len: usize,
    ) -> Result<Vec<u8>> {
        self.note_address(address);
        let chunker = self.chunker;
        chunker.read(&mut self.transceiver(), mode, mux_target, address, len)
    }

    /// Burst read into a caller buffer, left untouched on failure.
    pub fn burst_read_into(
        &mut self,
        mode: AddressingMode,
        mux_target: u8,
        address: u8,
        out: &mut [u8],
    ) -> Result<()> {
        self.note_address(address);
        let chunker = self.chunker;
        chunker.read_into(&mut self.transceiver(), mode, mux_target, address, out)
    }

    fn transceiver(&mut self) -> Transceiver<'_, T> {
        Transceiver::new(&mut self.handle, self.sink.as_ref())
    }

    fn note_address(&self, address: u8) {
        if RegisterAddress::exceeds_range(address) {
            self.sink.emit(&Diagnostic::AddressMasked {
                requested: address,
                used: RegisterAddress::new(address).get(),
            });
        }
    }
}

impl<T> SpiBridge<T> {
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Borrow the underlying handle.
    pub fn get_ref(&self) -> &T {
        &self.handle
    }

    /// Mutably borrow the underlying handle.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.handle
    }

    /// Give the handle back to the caller.
    pub fn into_inner(self) -> T {
        self.handle
    }
}

#[cfg(unix)]
impl SpiBridge<BridgeStream> {
    /// Open a channel to `config.socket_path` and apply its timeouts.
    pub fn connect(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        let stream = UnixDomainSocket::connect(&config.socket_path)?;
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;
        debug!(path = ?config.socket_path, chunk_size = config.chunk_size, "bridge connected");
        Self::new(stream, config)
    }
}
