use spibridge_frame::FrameError;
use spibridge_transport::TransportError;

/// The reply did not match the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The reply was shorter than the frame it answers.
    #[error("short response ({actual} bytes, expected {expected})")]
    ShortResponse { expected: usize, actual: usize },

    /// The remote answered with a status other than success.
    #[error("remote rejected command with status 0x{code:02x}")]
    RemoteNack { code: u8 },

    /// A request ended before all of its declared bytes arrived.
    #[error("truncated request ({actual} bytes, expected {expected})")]
    TruncatedRequest { expected: usize, actual: usize },
}

/// Errors returned by register operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A caller-supplied argument cannot be used (empty burst, oversized payload,
    /// unusable configuration).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The channel failed to open, send or receive.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The reply violated the protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A burst buffer could not be allocated.
    #[error("failed to allocate {requested} byte burst buffer")]
    Resource { requested: usize },

    /// A request could not be decoded (serving side).
    #[error("frame error: {0}")]
    Frame(FrameError),
}

impl From<FrameError> for BridgeError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::EmptyBurst
            | FrameError::PayloadTooLarge { .. }
            | FrameError::InvalidChunkSize { .. } => BridgeError::InvalidArgument(err.to_string()),
            other => BridgeError::Frame(other),
        }
    }
}

/// Coarse classification of a [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Transport,
    Protocol,
    Resource,
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            BridgeError::Transport(_) => ErrorKind::Transport,
            BridgeError::Protocol(_) | BridgeError::Frame(_) => ErrorKind::Protocol,
            BridgeError::Resource { .. } => ErrorKind::Resource,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
