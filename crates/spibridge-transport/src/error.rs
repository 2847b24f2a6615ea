use std::path::PathBuf;

/// Failures opening or using the bridge channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The emulator could not claim the bridge socket path.
    #[error("cannot listen on bridge socket {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No process answered on the bridge socket. No handle was produced.
    #[error("cannot reach bridge at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot accept bridge client: {0}")]
    Accept(std::io::Error),

    /// Send or receive failed mid-transaction, timeouts included.
    #[error("bridge channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `sun_path` cannot hold the requested socket path.
    #[error("bridge socket path is {len} bytes, limit is {max}: {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The channel stopped accepting bytes before the whole frame was sent.
    #[error("short write ({written} of {expected} bytes)")]
    ShortWrite { expected: usize, written: usize },
}

pub type Result<T> = std::result::Result<T, TransportError>;
