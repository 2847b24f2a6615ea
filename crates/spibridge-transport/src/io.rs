//! Exact-length send and receive over any byte stream.
//!
//! The bridge protocol has no notion of resuming a frame: either the whole
//! frame crosses the channel or the exchange is dead.

use std::io::{ErrorKind, Read, Write};

use crate::error::{Result, TransportError};

/// Send all of `bytes`, returning the number of bytes written.
///
/// A stream that stops accepting bytes (`Ok(0)`) fails with
/// [`TransportError::ShortWrite`].
pub fn send_exact<W: Write + ?Sized>(stream: &mut W, bytes: &[u8]) -> Result<usize> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match stream.write(&bytes[offset..]) {
            Ok(0) => {
                return Err(TransportError::ShortWrite {
                    expected: bytes.len(),
                    written: offset,
                })
            }
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }

    loop {
        match stream.flush() {
            Ok(()) => return Ok(offset),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
}

/// Fill `buf` from the stream, returning how many bytes arrived.
///
/// Stops early only at end of stream, so a return value smaller than
/// `buf.len()` means the peer closed mid-frame. The caller decides whether
/// that is fatal.
pub fn receive_exact<R: Read + ?Sized>(stream: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
    Ok(filled)
}
