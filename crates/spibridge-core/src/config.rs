use std::path::PathBuf;
use std::time::Duration;

use spibridge_frame::{DEFAULT_CHUNK_SIZE, MAX_FRAME_LEN, MAX_HEADER_LEN};
use spibridge_transport::DEFAULT_SOCKET_PATH;

use crate::error::{BridgeError, Result};

/// Which burst replies must carry the success status byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusCheck {
    /// The exchange that carries the burst header and the final chunk of a
    /// burst write. The final reply is the remote's verdict on the burst.
    #[default]
    FirstAndLast,
    /// Every chunk of a burst write (burst read data chunks carry no status).
    EveryChunk,
}

/// Configuration for a bridge connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Endpoint of the process that owns the SPI bus.
    pub socket_path: PathBuf,
    /// Maximum bytes per burst chunk. Client and remote must agree on it.
    pub chunk_size: usize,
    /// Read timeout applied to the stream on connect.
    pub read_timeout: Option<Duration>,
    /// Write timeout applied to the stream on connect.
    pub write_timeout: Option<Duration>,
    /// Status byte policy for burst replies.
    pub status_check: StatusCheck,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            chunk_size: DEFAULT_CHUNK_SIZE,
            read_timeout: None,
            write_timeout: None,
            status_check: StatusCheck::default(),
        }
    }
}

impl BridgeConfig {
    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Apply the same timeout to reads and writes.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self.write_timeout = timeout;
        self
    }

    pub fn with_status_check(mut self, status_check: StatusCheck) -> Self {
        self.status_check = status_check;
        self
    }

    /// Reject settings the protocol cannot run with.
    pub fn validate(&self) -> Result<()> {
        validate_chunk_size(self.chunk_size)?;
        if self.read_timeout == Some(Duration::ZERO) || self.write_timeout == Some(Duration::ZERO)
        {
            return Err(BridgeError::InvalidArgument(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// A chunk must hold a whole burst header plus at least one payload byte
/// and fit the 16-bit length field.
pub(crate) fn validate_chunk_size(chunk_size: usize) -> Result<()> {
    if chunk_size <= MAX_HEADER_LEN || chunk_size > MAX_FRAME_LEN {
        return Err(BridgeError::InvalidArgument(format!(
            "chunk size {} outside {}..={}",
            chunk_size,
            MAX_HEADER_LEN + 1,
            MAX_FRAME_LEN
        )));
    }
    Ok(())
}
