use std::io::{self, Read, Write};

/// Starting capacity for a fresh connection buffer.
pub const BUFFER_SIZE: usize = 1024;
/// Hard ceiling a buffer is never allowed to grow past.
pub const MAX_BUFFER: usize = 1024 * 1024;

const DELIM: &[u8; 4] = b"\r\n\r\n";

#[derive(Debug)]
pub struct Overflow;

/// The dynamically-sized byte buffer backing one connection's receive and
/// send paths. `cursor <= length <= capacity <= MAX_BUFFER` is maintained by
/// construction: every mutator either respects it or returns `Err(Overflow)`.
pub struct ConnBuffer {
    data: Vec<u8>,
    cursor: usize,
    length: usize,
}

impl ConnBuffer {
    pub fn new() -> Self {
        Self { data: vec![0; BUFFER_SIZE], cursor: 0, length: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// True once every received byte has been consumed by the parser and
    /// there's no room left for another read: the receive path must grow
    /// (or, at `MAX_BUFFER`, give up) before it can read again.
    pub fn is_full(&self) -> bool {
        self.length == self.capacity()
    }

    /// Doubles capacity, zeroing the new half. Errs once already at
    /// `MAX_BUFFER` — the caller must close the connection in that case.
    pub fn grow(&mut self) -> Result<(), Overflow> {
        if self.capacity() >= MAX_BUFFER {
            return Err(Overflow);
        }
        let new_cap = (self.capacity() * 2).min(MAX_BUFFER);
        self.data.resize(new_cap, 0);
        Ok(())
    }

    /// Reads as many bytes as fit in the unused tail of the buffer. Returns
    /// `Ok(0)` on a clean peer close, same as the underlying `Read`.
    pub fn read_from<R: Read>(&mut self, r: &mut R) -> io::Result<usize> {
        let room = self.capacity() - self.length;
        let n = r.read(&mut self.data[self.length..self.length + room])?;
        self.length += n;
        Ok(n)
    }

    /// The bytes received so far.
    pub fn received(&self) -> &[u8] {
        &self.data[..self.length]
    }

    /// Byte offset of the `\r\n\r\n` header terminator, if the full header
    /// block has arrived yet.
    pub fn find_header_end(&self) -> Option<usize> {
        self.received().windows(DELIM.len()).position(|w| w == DELIM)
    }

    /// Loads `bytes` at offset 0 as a fresh outbound message: `cursor = 0`,
    /// `length = bytes.len()`. Errs if `bytes` would not fit in the current
    /// capacity (never expected to happen for the two fixed response
    /// headers this server ever builds).
    pub fn reset_for_send(&mut self, bytes: &[u8]) -> Result<(), Overflow> {
        if bytes.len() > self.capacity() {
            return Err(Overflow);
        }
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.length = bytes.len();
        self.cursor = 0;
        Ok(())
    }

    /// Writes the unsent tail to `w`. `Ok(0)` signals the peer went away.
    pub fn write_to<W: Write>(&mut self, w: &mut W) -> io::Result<usize> {
        let n = w.write(&self.data[self.cursor..self.length])?;
        self.cursor += n;
        Ok(n)
    }

    /// True once every byte loaded by `reset_for_send`/`refill_from_file`
    /// has been written out.
    pub fn send_complete(&self) -> bool {
        self.cursor == self.length
    }

    /// Pumps the next chunk of a file being streamed as a response body into
    /// the buffer at offset 0. `Ok(0)` means EOF — caller closes.
    pub fn refill_from_file<R: Read>(&mut self, file: &mut R) -> io::Result<usize> {
        let room = self.capacity() - 1;
        let n = file.read(&mut self.data[..room])?;
        self.length = n;
        self.cursor = 0;
        Ok(n)
    }
}

impl Default for ConnBuffer {
    fn default() -> Self {
        Self::new()
    }
}
