//! Line framing over a streaming byte buffer.
//!
//! Bytes arrive in whatever chunks the socket hands us. The framer stitches
//! them back into `\n`-terminated lines without knowing what the lines mean.

use bytes::{Buf, BytesMut};

/// Initial capacity of the reassembly buffer.
const INITIAL_CAPACITY: usize = 4096;

/// Longest partial line tolerated before the peer is considered broken.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Reassembles newline-terminated lines across arbitrary read boundaries.
///
/// After every call to [`LineFramer::next_line`] that returns `None`, the
/// buffer holds at most one partial trailing fragment.
#[derive(Debug)]
pub struct LineFramer {
    buffer: BytesMut,
    /// Prefix of `buffer` already known to hold no newline.
    scanned: usize,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    /// Create an empty framer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
            scanned: 0,
        }
    }

    /// Append freshly read bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Remove and return the earliest complete line, newline stripped.
    ///
    /// Returns `None` without blocking when no newline is buffered. Callers
    /// should drain until `None` before reading again, since one chunk may
    /// carry many lines.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = match self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            Some(offset) => self.scanned + offset,
            None => {
                self.scanned = self.buffer.len();
                return None;
            }
        };
        let line = self.buffer.split_to(pos);
        self.buffer.advance(1);
        self.scanned = 0;
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Bytes of the partial fragment still waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the unterminated fragment has outgrown [`MAX_LINE_LEN`].
    pub fn is_oversized(&self) -> bool {
        self.scanned > MAX_LINE_LEN
    }
}
