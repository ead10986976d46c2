//! Newline framing for NDJSON streams.

/// Accumulates raw bytes and splits them into lines.
///
/// `\r` is dropped, `\n` terminates a line. Empty lines are emitted too;
/// the stream protocol uses them as keep-alives. A line longer than
/// `max_len` bytes is discarded up to its terminator instead of growing
/// the buffer without bound.
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    max_len: usize,
    discarding: bool,
    overflows: u64,
}

impl LineBuffer {
    /// Default cap on a single line, in bytes.
    pub const DEFAULT_MAX_LEN: usize = 4096;

    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_len: max_len.max(1),
            discarding: false,
            overflows: 0,
        }
    }

    /// Feeds a chunk and returns every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            match byte {
                b'\r' => {}
                b'\n' => {
                    if self.discarding {
                        self.discarding = false;
                    } else {
                        lines.push(String::from_utf8_lossy(&self.buf).into_owned());
                    }
                    self.buf.clear();
                }
                _ if self.discarding => {}
                _ => {
                    if self.buf.len() >= self.max_len {
                        self.overflows += 1;
                        tracing::warn!(
                            max_len = self.max_len,
                            "stream line exceeds buffer, discarding"
                        );
                        self.buf.clear();
                        self.discarding = true;
                    } else {
                        self.buf.push(byte);
                    }
                }
            }
        }
        lines
    }

    /// Bytes buffered toward an incomplete line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// How many oversized lines have been dropped.
    pub fn overflows(&self) -> u64 {
        self.overflows
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_LEN)
    }
}
