use crate::codec::Opcode;

/// Errors that can occur while building, planning or parsing frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// A burst must carry at least one payload byte.
    #[error("burst of zero length")]
    EmptyBurst,

    /// The transfer does not fit in the 16-bit length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The first byte of a request is not a known opcode.
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),

    /// The address byte's access flag contradicts the opcode.
    #[error("access flag does not match {opcode} opcode")]
    AccessFlagMismatch { opcode: Opcode },

    /// The declared length is impossible for the opcode.
    #[error("declared length {declared} invalid for {opcode} (expected {expected})")]
    LengthMismatch {
        opcode: Opcode,
        declared: usize,
        expected: usize,
    },

    /// Not enough bytes to decode a header.
    #[error("truncated header ({actual} bytes, need {expected})")]
    Truncated { expected: usize, actual: usize },

    /// The chunk limit cannot carry the header plus at least one byte.
    #[error("chunk size {chunk_size} too small (min {min})")]
    InvalidChunkSize { chunk_size: usize, min: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
