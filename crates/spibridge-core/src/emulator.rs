//! A register bank that answers bridge frames.
//!
//! Plays the remote side of the bridge: it decodes requests with the same
//! frame layout and chunk plan the client uses and keeps register contents
//! in memory. Tests and the `serve` command run it on a Unix socket.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use spibridge_frame::{
    parse_request_header, AddressingMode, ChunkPlan, Opcode, RegisterAddress, RequestHeader,
    MAX_HEADER_LEN, STATUS_OFFSET, STATUS_OK,
};
use spibridge_transport::{receive_exact, send_exact};
#[cfg(unix)]
use spibridge_transport::{BridgeStream, UnixDomainSocket};
use tracing::{debug, info, warn};

use crate::config::validate_chunk_size;
use crate::error::{BridgeError, ProtocolError, Result};

/// Final-chunk status for a burst write over the configured limit.
pub const STATUS_BURST_REJECTED: u8 = 0x0E;

type RegisterKey = (Option<u8>, u8);

/// In-memory register contents, keyed by mux target and address.
///
/// A single-register write stores one byte; a burst write stores the whole
/// payload at its start address.
#[derive(Debug, Default, Clone)]
pub struct RegisterBank {
    registers: HashMap<RegisterKey, Vec<u8>>,
}

impl RegisterBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_byte(&mut self, target: Option<u8>, address: RegisterAddress, value: u8) {
        self.registers.insert((target, address.get()), vec![value]);
    }

    /// First byte stored at the address, zero if never written.
    pub fn read_byte(&self, target: Option<u8>, address: RegisterAddress) -> u8 {
        self.registers
            .get(&(target, address.get()))
            .and_then(|bytes| bytes.first().copied())
            .unwrap_or(0)
    }

    pub fn write_burst(&mut self, target: Option<u8>, address: RegisterAddress, data: Vec<u8>) {
        self.registers.insert((target, address.get()), data);
    }

    /// `len` bytes from the address, zero-padded past what was written.
    pub fn read_burst(&self, target: Option<u8>, address: RegisterAddress, len: usize) -> Vec<u8> {
        let mut data = self
            .registers
            .get(&(target, address.get()))
            .cloned()
            .unwrap_or_default();
        data.resize(len, 0);
        data
    }

    /// Number of addresses holding data.
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}

/// Serves bridge requests against a shared [`RegisterBank`].
#[derive(Debug, Clone)]
pub struct RegisterEmulator {
    mode: AddressingMode,
    chunk_size: usize,
    status: u8,
    burst_limit: Option<usize>,
    bank: Arc<Mutex<RegisterBank>>,
}

impl RegisterEmulator {
    /// `chunk_size` must match the clients' and hold a whole burst header.
    pub fn new(mode: AddressingMode, chunk_size: usize) -> Result<Self> {
        validate_chunk_size(chunk_size)?;
        Ok(Self {
            mode,
            chunk_size,
            status: STATUS_OK,
            burst_limit: None,
            bank: Arc::new(Mutex::new(RegisterBank::new())),
        })
    }

    /// Answer every command with `status` instead of success.
    ///
    /// Any value other than `0xFF` makes the emulator reject requests
    /// without touching the bank.
    pub fn with_status(mut self, status: u8) -> Self {
        self.status = status;
        self
    }

    /// Refuse burst writes longer than `limit` bytes.
    ///
    /// The whole burst is still received and every chunk but the last is
    /// acknowledged; the final reply carries [`STATUS_BURST_REJECTED`] and
    /// nothing is stored.
    pub fn with_burst_limit(mut self, limit: usize) -> Self {
        self.burst_limit = Some(limit);
        self
    }

    pub fn mode(&self) -> AddressingMode {
        self.mode
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Shared handle to the register contents.
    pub fn bank(&self) -> Arc<Mutex<RegisterBank>> {
        Arc::clone(&self.bank)
    }

    fn lock_bank(&self) -> MutexGuard<'_, RegisterBank> {
        match self.bank.lock() {
            Ok(bank) => bank,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Serve requests until the client closes the channel.
    ///
    /// Returns the number of requests handled.
    pub fn serve<S: Read + Write + ?Sized>(&self, stream: &mut S) -> Result<usize> {
        let mut served = 0usize;
        while let Some(opcode) = self.handle_request(stream)? {
            debug!(opcode = opcode.name(), served, "request handled");
            served += 1;
        }
        Ok(served)
    }

    /// Handle one request. Returns `None` when the client closed cleanly.
    pub fn handle_request<S: Read + Write + ?Sized>(
        &self,
        stream: &mut S,
    ) -> Result<Option<Opcode>> {
        let header_len = self.mode.header_len();
        let mut header_bytes = [0u8; MAX_HEADER_LEN];
        let header_bytes = &mut header_bytes[..header_len];
        match receive_exact(stream, header_bytes)? {
            0 => return Ok(None),
            n if n < header_len => {
                return Err(ProtocolError::TruncatedRequest {
                    expected: header_len,
                    actual: n,
                }
                .into())
            }
            _ => {}
        }

        let header = parse_request_header(self.mode, header_bytes).map_err(BridgeError::Frame)?;
        match header.opcode {
            Opcode::Read | Opcode::Write => self.single(stream, &header, header_bytes)?,
            Opcode::BurstWrite => self.burst_write(stream, &header, header_bytes)?,
            Opcode::BurstRead => self.burst_read(stream, &header, header_bytes)?,
        }
        Ok(Some(header.opcode))
    }

    fn single<S: Read + Write + ?Sized>(
        &self,
        stream: &mut S,
        header: &RequestHeader,
        header_bytes: &[u8],
    ) -> Result<()> {
        let mut data = [0u8; 1];
        read_exact(stream, &mut data)?;

        let mut reply = header_bytes.to_vec();
        reply.push(data[0]);
        reply[STATUS_OFFSET] = self.status;

        if self.status == STATUS_OK {
            let mut bank = self.lock_bank();
            if header.opcode == Opcode::Write {
                bank.write_byte(header.mux_target, header.address, data[0]);
            } else if let Some(last) = reply.last_mut() {
                *last = bank.read_byte(header.mux_target, header.address);
            }
        }

        send_exact(stream, &reply)?;
        Ok(())
    }

    fn burst_write<S: Read + Write + ?Sized>(
        &self,
        stream: &mut S,
        header: &RequestHeader,
        header_bytes: &[u8],
    ) -> Result<()> {
        let plan = ChunkPlan::new(header.total_len, header_bytes.len(), self.chunk_size)?;
        let over_limit = self
            .burst_limit
            .is_some_and(|limit| plan.payload_len() > limit);
        let mut payload = Vec::with_capacity(plan.payload_len());

        for chunk in plan.chunks() {
            let mut buf = vec![0u8; chunk.payload.len()];
            read_exact(stream, &mut buf)?;
            payload.extend_from_slice(&buf);

            let last = chunk.index + 1 == plan.chunk_count();
            let status = if last && over_limit && self.status == STATUS_OK {
                STATUS_BURST_REJECTED
            } else {
                self.status
            };
            let mut reply = vec![0u8; chunk.size];
            reply[STATUS_OFFSET] = status;
            send_exact(stream, &reply)?;

            if status != STATUS_OK {
                warn!(status, len = plan.payload_len(), "burst write rejected");
                return Ok(());
            }
        }

        debug!(address = %header.address, len = payload.len(), "burst stored");
        self.lock_bank()
            .write_burst(header.mux_target, header.address, payload);
        Ok(())
    }

    fn burst_read<S: Read + Write + ?Sized>(
        &self,
        stream: &mut S,
        header: &RequestHeader,
        header_bytes: &[u8],
    ) -> Result<()> {
        let mut reply = header_bytes.to_vec();
        reply[STATUS_OFFSET] = self.status;
        send_exact(stream, &reply)?;
        if self.status != STATUS_OK {
            warn!(status = self.status, "burst read rejected");
            return Ok(());
        }

        let len = header.payload_len(self.mode);
        let data = self
            .lock_bank()
            .read_burst(header.mux_target, header.address, len);
        let plan = ChunkPlan::for_read(len, self.chunk_size)?;

        for chunk in plan.chunks() {
            let mut filler = vec![0u8; chunk.size];
            read_exact(stream, &mut filler)?;
            send_exact(stream, &data[chunk.payload])?;
        }
        Ok(())
    }
}

fn read_exact<S: Read + ?Sized>(stream: &mut S, buf: &mut [u8]) -> Result<()> {
    let actual = receive_exact(stream, buf)?;
    if actual != buf.len() {
        return Err(ProtocolError::TruncatedRequest {
            expected: buf.len(),
            actual,
        }
        .into());
    }
    Ok(())
}

/// Runs a [`RegisterEmulator`] on a Unix socket.
#[cfg(unix)]
pub struct EmulatorListener {
    socket: UnixDomainSocket,
    emulator: RegisterEmulator,
}

#[cfg(unix)]
impl EmulatorListener {
    pub fn bind(path: impl AsRef<Path>, emulator: RegisterEmulator) -> Result<Self> {
        let socket = UnixDomainSocket::bind(path)?;
        info!(
            path = ?socket.path(),
            mode = ?emulator.mode(),
            chunk_size = emulator.chunk_size(),
            "register emulator listening"
        );
        Ok(Self { socket, emulator })
    }

    pub fn emulator(&self) -> &RegisterEmulator {
        &self.emulator
    }

    pub fn path(&self) -> &Path {
        self.socket.path()
    }

    /// Accept the next connection.
    pub fn accept(&self) -> Result<BridgeStream> {
        let stream = self.socket.accept()?;
        if let Some((uid, gid, pid)) = stream.peer_credentials() {
            debug!(uid, gid, pid, "bridge client connected");
        }
        Ok(stream)
    }

    /// Accept one connection and serve it on the calling thread.
    pub fn serve_one(&self) -> Result<usize> {
        let mut stream = self.accept()?;
        self.emulator.serve(&mut stream)
    }

    /// Accept one connection and serve it on a new thread.
    pub fn spawn_one(&self) -> Result<JoinHandle<Result<usize>>> {
        let mut stream = self.accept()?;
        let emulator = self.emulator.clone();
        Ok(std::thread::spawn(move || emulator.serve(&mut stream)))
    }
}
