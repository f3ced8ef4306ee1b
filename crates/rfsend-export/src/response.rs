//! Bounded capture of HTTP response bodies.

use std::borrow::Cow;

/// Fixed-capacity sink for a response body.
///
/// Keeps the first `capacity` bytes the server sends and discards the
/// rest. Remaining capacity saturates at zero: a chunk longer than the
/// free space is copied only up to the boundary, and an exactly-full sink
/// is indistinguishable from an overflowed one. The sink is reused across
/// publishes via `reset`.
#[derive(Debug)]
pub struct ResponseSink {
    data: Box<[u8]>,
    len: usize,
    truncated: bool,
}

impl ResponseSink {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
            truncated: false,
        }
    }

    /// Copy in as much of `chunk` as fits, discarding the rest.
    /// Returns the number of bytes kept.
    pub fn write(&mut self, chunk: &[u8]) -> usize {
        let n = chunk.len().min(self.remaining());
        if n < chunk.len() {
            self.truncated = true;
        }
        self.data[self.len..self.len + n].copy_from_slice(&chunk[..n]);
        self.len += n;
        n
    }

    /// Free space left, never negative.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.len)
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether any bytes were discarded since the last reset.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// The captured bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Captured body as text for diagnostics, lossy where the server sent
    /// bytes that are not UTF-8.
    pub fn as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.bytes())
    }

    /// Forget the captured body. Capacity is unchanged; previously
    /// captured bytes are no longer observable.
    pub fn reset(&mut self) {
        self.len = 0;
        self.truncated = false;
    }
}
