//! Command frames for the SPI bridge.
//!
//! Every register transaction is one frame:
//! - 1-byte opcode
//! - 2-byte big-endian length of the whole transfer
//! - mux-target byte (multiplexed addressing only)
//! - address byte, bit 7 carrying the access flag
//! - data byte(s)
//!
//! Builders here are pure. Bursts longer than the chunk limit are split by
//! [`ChunkPlan`]; both the client and the serving side use the same plan.

pub mod chunk;
pub mod codec;
pub mod error;

pub use chunk::{Chunk, ChunkPlan, Chunks, DEFAULT_CHUNK_SIZE};
pub use codec::{
    build_burst_header, build_read, build_write, parse_request_header, AddressingMode,
    BurstHeader, CommandFrame, Opcode, RegisterAddress, RequestHeader, ADDRESS_MASK,
    MAX_FRAME_LEN, MAX_HEADER_LEN, READ_ACCESS, STATUS_OFFSET, STATUS_OK, WRITE_ACCESS,
};
pub use error::{FrameError, Result};
