//! Burst transfers.
//!
//! A burst write streams `[header][payload]` in chunks of at most
//! `chunk_size` bytes, each answered by a reply of the same length. A burst
//! read exchanges its header once, then pulls the payload in zero-filled
//! chunks and reassembles the replies in order.

use std::io::{Read, Write};

use spibridge_frame::{
    build_burst_header, AddressingMode, BurstHeader, Chunk, ChunkPlan, Opcode, MAX_HEADER_LEN,
};

use crate::config::{BridgeConfig, StatusCheck};
use crate::diag::Diagnostic;
use crate::error::{BridgeError, Result};
use crate::transceiver::{Transaction, Transceiver};

/// Splits bursts into chunks and drives the transceiver for each one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstChunker {
    chunk_size: usize,
    status_check: StatusCheck,
}

impl BurstChunker {
    pub fn new(chunk_size: usize, status_check: StatusCheck) -> Self {
        Self {
            chunk_size,
            status_check,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.chunk_size, config.status_check)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Write `payload` to consecutive bytes starting at `address`.
    ///
    /// Stops at the first failing chunk; chunks already sent are not undone.
    /// The status of the final chunk's reply is always checked.
    pub fn write<T: Read + Write + ?Sized>(
        &self,
        xcvr: &mut Transceiver<'_, T>,
        mode: AddressingMode,
        mux_target: u8,
        address: u8,
        payload: &[u8],
    ) -> Result<()> {
        if payload.is_empty() {
            return Err(empty_burst());
        }
        let header = build_burst_header(mode, mux_target, address, true, payload.len())?;
        let plan = ChunkPlan::for_write(&header, self.chunk_size)?;

        let mut tx = Transaction::begin(Opcode::BurstWrite, xcvr.sink());
        tx.frame_built(header.total_len());
        let result = self.write_chunks(xcvr, &mut tx, &header, &plan, payload);
        tx.finish(&result);
        result
    }

    fn write_chunks<T: Read + Write + ?Sized>(
        &self,
        xcvr: &mut Transceiver<'_, T>,
        tx: &mut Transaction<'_>,
        header: &BurstHeader,
        plan: &ChunkPlan,
        payload: &[u8],
    ) -> Result<()> {
        let buf_len = plan.chunk_size().min(plan.total());
        let mut out = alloc_buffer(buf_len)?;
        let mut reply = alloc_buffer(buf_len)?;

        for chunk in plan.chunks() {
            out.clear();
            if chunk.header_len > 0 {
                out.extend_from_slice(header.as_bytes());
            }
            out.extend_from_slice(&payload[chunk.payload.clone()]);
            reply.resize(chunk.size, 0);

            xcvr.exchange(tx, &out, &mut reply)?;
            if self.checks_status(&chunk, plan) {
                xcvr.check_status(tx.opcode(), &reply)?;
            }
            xcvr.sink().emit(&Diagnostic::ChunkExchanged {
                opcode: tx.opcode(),
                index: chunk.index,
                size: chunk.size,
            });
        }
        Ok(())
    }

    fn checks_status(&self, chunk: &Chunk, plan: &ChunkPlan) -> bool {
        match self.status_check {
            StatusCheck::FirstAndLast => {
                chunk.index == 0 || chunk.index + 1 == plan.chunk_count()
            }
            StatusCheck::EveryChunk => true,
        }
    }

    /// Read `len` consecutive bytes starting at `address`.
    pub fn read<T: Read + Write + ?Sized>(
        &self,
        xcvr: &mut Transceiver<'_, T>,
        mode: AddressingMode,
        mux_target: u8,
        address: u8,
        len: usize,
    ) -> Result<Vec<u8>> {
        if len == 0 {
            return Err(empty_burst());
        }
        let header = build_burst_header(mode, mux_target, address, false, len)?;
        let plan = ChunkPlan::for_read(len, self.chunk_size)?;

        let mut tx = Transaction::begin(Opcode::BurstRead, xcvr.sink());
        tx.frame_built(header.total_len());
        let result = self.read_chunks(xcvr, &mut tx, &header, &plan);
        tx.finish(&result);
        result
    }

    /// Read `out.len()` bytes into `out`.
    ///
    /// `out` is only written once every chunk has been validated.
    pub fn read_into<T: Read + Write + ?Sized>(
        &self,
        xcvr: &mut Transceiver<'_, T>,
        mode: AddressingMode,
        mux_target: u8,
        address: u8,
        out: &mut [u8],
    ) -> Result<()> {
        let data = self.read(xcvr, mode, mux_target, address, out.len())?;
        out.copy_from_slice(&data);
        Ok(())
    }

    fn read_chunks<T: Read + Write + ?Sized>(
        &self,
        xcvr: &mut Transceiver<'_, T>,
        tx: &mut Transaction<'_>,
        header: &BurstHeader,
        plan: &ChunkPlan,
    ) -> Result<Vec<u8>> {
        let mut header_reply = [0u8; MAX_HEADER_LEN];
        xcvr.exchange(tx, header.as_bytes(), &mut header_reply)?;
        xcvr.check_status(tx.opcode(), &header_reply[..header.len()])?;

        let buf_len = plan.chunk_size().min(plan.total());
        let mut data = alloc_buffer(plan.total())?;
        let mut zeros = alloc_buffer(buf_len)?;
        let mut reply = alloc_buffer(buf_len)?;

        for chunk in plan.chunks() {
            zeros.resize(chunk.size, 0);
            reply.resize(chunk.size, 0);
            xcvr.exchange(tx, &zeros, &mut reply)?;
            data.extend_from_slice(&reply);
            xcvr.sink().emit(&Diagnostic::ChunkExchanged {
                opcode: tx.opcode(),
                index: chunk.index,
                size: chunk.size,
            });
        }
        Ok(data)
    }
}

impl Default for BurstChunker {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

fn empty_burst() -> BridgeError {
    BridgeError::InvalidArgument("burst of zero length".to_string())
}

fn alloc_buffer(capacity: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(capacity)
        .map_err(|_| BridgeError::Resource {
            requested: capacity,
        })?;
    Ok(buf)
}
