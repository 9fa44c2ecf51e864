//! Incremental byte-to-line decoder
//!
//! Socket reads end at arbitrary byte boundaries: in the middle of a line,
//! between `\r` and `\n`, or inside a multi-byte UTF-8 sequence. The buffer
//! keeps raw bytes and only decodes a line once its terminator has arrived.

/// Accumulates raw bytes and hands out complete `\n`-terminated lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    /// Bytes at the front of `pending` already handed out as lines
    consumed: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and iterate over every line completed so far.
    ///
    /// The iterator is lazy. Lines it does not yield before being dropped
    /// stay buffered and come out of the next `feed` call; no line is
    /// yielded twice.
    pub fn feed(&mut self, bytes: &[u8]) -> CompleteLines<'_> {
        self.compact();
        self.pending.extend_from_slice(bytes);
        CompleteLines { buffer: self }
    }

    /// Drain the trailing partial line at end of stream.
    pub fn flush(&mut self) -> Option<String> {
        self.compact();
        if self.pending.is_empty() {
            return None;
        }
        let bytes = std::mem::take(&mut self.pending);
        let line = decode(&bytes);
        if line.is_empty() {
            None
        } else {
            Some(line)
        }
    }

    /// Drop everything buffered, including unterminated bytes.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.consumed = 0;
    }

    /// Number of buffered bytes not yet returned as a line.
    pub fn pending_len(&self) -> usize {
        self.pending.len() - self.consumed
    }

    fn next_line(&mut self) -> Option<String> {
        let rest = &self.pending[self.consumed..];
        let end = rest.iter().position(|&b| b == b'\n')?;
        let line = decode(&rest[..end]);
        self.consumed += end + 1;
        Some(line)
    }

    fn compact(&mut self) {
        if self.consumed > 0 {
            self.pending.drain(..self.consumed);
            self.consumed = 0;
        }
    }
}

/// Lines completed by one [`LineBuffer::feed`] call.
pub struct CompleteLines<'a> {
    buffer: &'a mut LineBuffer,
}

impl Iterator for CompleteLines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.buffer.next_line()
    }
}

impl Drop for CompleteLines<'_> {
    fn drop(&mut self) {
        self.buffer.compact();
    }
}

fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
