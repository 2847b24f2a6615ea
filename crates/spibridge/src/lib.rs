//! SPI register access over a byte-stream bridge.
//!
//! A process that owns the SPI bus listens on a Unix socket; clients send it
//! command frames and get equal-length replies back. This crate gathers the
//! layers:
//!
//! - [`transport`]: Unix socket endpoint and exact-length I/O
//! - [`frame`]: command frame encoding and burst chunk planning
//! - [`bridge`]: the register API, diagnostics, and a register emulator
//!
//! ```no_run
//! use spibridge::{AddressingMode, BridgeConfig, SpiBridge};
//!
//! let mut bridge = SpiBridge::connect(BridgeConfig::default())?;
//! bridge.write(AddressingMode::Direct, 0, 0x05, 0x42)?;
//! assert_eq!(bridge.read(AddressingMode::Direct, 0, 0x05)?, 0x42);
//! # Ok::<(), spibridge::BridgeError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use spibridge_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use spibridge_frame::*;
}

/// Re-export the register API.
pub mod bridge {
    pub use spibridge_core::*;
}

pub use spibridge_core::{BridgeConfig, BridgeError, SpiBridge, StatusCheck};
pub use spibridge_frame::{AddressingMode, DEFAULT_CHUNK_SIZE};
