use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Access flag for reads, OR'd into the address byte.
pub const READ_ACCESS: u8 = 0x00;

/// Access flag for writes, OR'd into the address byte.
pub const WRITE_ACCESS: u8 = 0x80;

/// Register addresses are 7 bits wide.
pub const ADDRESS_MASK: u8 = 0x7F;

/// Status byte the remote returns for a successful command.
pub const STATUS_OK: u8 = 0xFF;

/// Position of the status byte in a reply.
pub const STATUS_OFFSET: usize = 0;

/// Largest transfer the 16-bit length field can describe.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Longest header of any addressing mode.
pub const MAX_HEADER_LEN: usize = 5;

const LEN_FIELD_OFFSET: usize = 1;

/// Command opcodes, first byte of every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Read = 0x01,
    Write = 0x02,
    BurstWrite = 0x03,
    BurstRead = 0x04,
}

impl Opcode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether the opcode moves data towards the remote.
    pub fn is_write(self) -> bool {
        matches!(self, Opcode::Write | Opcode::BurstWrite)
    }

    pub fn is_burst(self) -> bool {
        matches!(self, Opcode::BurstWrite | Opcode::BurstRead)
    }

    /// The access flag that belongs in this opcode's address byte.
    pub fn access_flag(self) -> u8 {
        if self.is_write() {
            WRITE_ACCESS
        } else {
            READ_ACCESS
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::Read => "READ",
            Opcode::Write => "WRITE",
            Opcode::BurstWrite => "BURST_WRITE",
            Opcode::BurstRead => "BURST_READ",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Opcode::Read),
            0x02 => Ok(Opcode::Write),
            0x03 => Ok(Opcode::BurstWrite),
            0x04 => Ok(Opcode::BurstRead),
            other => Err(FrameError::UnknownOpcode(other)),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the target chip is selected on the remote bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    /// One chip on the bus; no mux-target byte.
    #[default]
    Direct,
    /// Several chips behind a mux; a target-select byte precedes the address.
    Multiplexed,
}

impl AddressingMode {
    /// Header length: opcode, length field, optional mux byte, address byte.
    pub const fn header_len(self) -> usize {
        match self {
            AddressingMode::Direct => 4,
            AddressingMode::Multiplexed => 5,
        }
    }

    /// Length of a single-register read or write frame.
    pub const fn single_frame_len(self) -> usize {
        self.header_len() + 1
    }
}

/// A 7-bit register address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegisterAddress(u8);

impl RegisterAddress {
    /// Mask `raw` down to 7 bits.
    pub const fn new(raw: u8) -> Self {
        Self(raw & ADDRESS_MASK)
    }

    /// True when `raw` has bits outside the address range.
    pub const fn exceeds_range(raw: u8) -> bool {
        raw & !ADDRESS_MASK != 0
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// The address byte as it appears on the wire.
    pub const fn with_access(self, access: u8) -> u8 {
        access | self.0
    }
}

impl From<u8> for RegisterAddress {
    fn from(raw: u8) -> Self {
        Self::new(raw)
    }
}

impl fmt::Display for RegisterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

/// A complete single-register command frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    opcode: Opcode,
    bytes: Bytes,
}

impl CommandFrame {
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offset of the data byte, in the request and in the reply.
    pub fn data_offset(&self) -> usize {
        self.bytes.len() - 1
    }
}

/// Header of a burst transfer, sent once at the start of the burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstHeader {
    opcode: Opcode,
    bytes: [u8; MAX_HEADER_LEN],
    len: usize,
    payload_len: usize,
}

impl BurstHeader {
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Header plus payload; the value carried in the length field.
    pub fn total_len(&self) -> usize {
        self.len + self.payload_len
    }
}

fn put_header(
    dst: &mut impl BufMut,
    opcode: Opcode,
    total_len: usize,
    mode: AddressingMode,
    mux_target: u8,
    address: u8,
) {
    dst.put_u8(opcode.as_u8());
    dst.put_u16(total_len as u16);
    if mode == AddressingMode::Multiplexed {
        dst.put_u8(mux_target);
    }
    dst.put_u8(RegisterAddress::new(address).with_access(opcode.access_flag()));
}

fn build_single(
    opcode: Opcode,
    mode: AddressingMode,
    mux_target: u8,
    address: u8,
    data: u8,
) -> CommandFrame {
    let len = mode.single_frame_len();
    let mut dst = BytesMut::with_capacity(len);
    put_header(&mut dst, opcode, len, mode, mux_target, address);
    dst.put_u8(data);
    debug_assert_eq!(dst.len(), len);

    CommandFrame {
        opcode,
        bytes: dst.freeze(),
    }
}

/// Build a single-register write frame.
///
/// `address` is masked to 7 bits; `mux_target` is ignored in direct mode.
pub fn build_write(mode: AddressingMode, mux_target: u8, address: u8, data: u8) -> CommandFrame {
    build_single(Opcode::Write, mode, mux_target, address, data)
}

/// Build a single-register read frame. The data byte is zero-filled.
pub fn build_read(mode: AddressingMode, mux_target: u8, address: u8) -> CommandFrame {
    build_single(Opcode::Read, mode, mux_target, address, 0x00)
}

/// Build the header that opens a burst of `payload_len` bytes.
pub fn build_burst_header(
    mode: AddressingMode,
    mux_target: u8,
    address: u8,
    is_write: bool,
    payload_len: usize,
) -> Result<BurstHeader> {
    if payload_len == 0 {
        return Err(FrameError::EmptyBurst);
    }
    let header_len = mode.header_len();
    let max = MAX_FRAME_LEN - header_len;
    if payload_len > max {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max,
        });
    }

    let opcode = if is_write {
        Opcode::BurstWrite
    } else {
        Opcode::BurstRead
    };
    let mut bytes = [0u8; MAX_HEADER_LEN];
    let mut dst = &mut bytes[..];
    put_header(
        &mut dst,
        opcode,
        header_len + payload_len,
        mode,
        mux_target,
        address,
    );

    Ok(BurstHeader {
        opcode,
        bytes,
        len: header_len,
        payload_len,
    })
}

/// A request header as decoded by the serving side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub opcode: Opcode,
    /// Value of the length field: the whole transfer including the header.
    pub total_len: usize,
    /// Mux target, present only in multiplexed mode.
    pub mux_target: Option<u8>,
    pub address: RegisterAddress,
}

impl RequestHeader {
    /// Number of data bytes that follow the header.
    pub fn payload_len(&self, mode: AddressingMode) -> usize {
        self.total_len - mode.header_len()
    }
}

/// Decode the first `mode.header_len()` bytes of a request.
pub fn parse_request_header(mode: AddressingMode, src: &[u8]) -> Result<RequestHeader> {
    let header_len = mode.header_len();
    if src.len() < header_len {
        return Err(FrameError::Truncated {
            expected: header_len,
            actual: src.len(),
        });
    }

    let opcode = Opcode::try_from(src[0])?;
    let total_len =
        u16::from_be_bytes([src[LEN_FIELD_OFFSET], src[LEN_FIELD_OFFSET + 1]]) as usize;
    let (mux_target, address_byte) = match mode {
        AddressingMode::Direct => (None, src[3]),
        AddressingMode::Multiplexed => (Some(src[3]), src[4]),
    };

    if address_byte & !ADDRESS_MASK != opcode.access_flag() {
        return Err(FrameError::AccessFlagMismatch { opcode });
    }

    if opcode.is_burst() {
        if total_len <= header_len {
            return Err(FrameError::EmptyBurst);
        }
    } else if total_len != mode.single_frame_len() {
        return Err(FrameError::LengthMismatch {
            opcode,
            declared: total_len,
            expected: mode.single_frame_len(),
        });
    }

    Ok(RequestHeader {
        opcode,
        total_len,
        mux_target,
        address: RegisterAddress::new(address_byte),
    })
}
