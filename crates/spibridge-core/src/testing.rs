use std::io::{Cursor, ErrorKind, Read, Write};

/// In-memory handle that replays canned reply bytes and records writes.
pub(crate) struct ScriptedChannel {
    replies: Cursor<Vec<u8>>,
    written: Vec<u8>,
    refuse_writes: bool,
    io_calls: usize,
}

impl ScriptedChannel {
    pub(crate) fn new(replies: Vec<u8>) -> Self {
        Self {
            replies: Cursor::new(replies),
            written: Vec::new(),
            refuse_writes: false,
            io_calls: 0,
        }
    }

    pub(crate) fn refuse_writes(mut self) -> Self {
        self.refuse_writes = true;
        self
    }

    pub(crate) fn written(&self) -> &[u8] {
        &self.written
    }

    /// Number of read or write calls made on the channel.
    pub(crate) fn io_calls(&self) -> usize {
        self.io_calls
    }
}

impl Read for ScriptedChannel {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.io_calls += 1;
        self.replies.read(buf)
    }
}

impl Write for ScriptedChannel {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.io_calls += 1;
        if self.refuse_writes {
            return Err(std::io::Error::from(ErrorKind::BrokenPipe));
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
