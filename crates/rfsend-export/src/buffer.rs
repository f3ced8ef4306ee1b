//! Fixed-capacity staging buffer for outgoing payloads.

use std::io;

/// Byte buffer whose capacity is fixed at construction.
///
/// Writes are all or nothing: a chunk that does not fit fails with
/// `WriteZero` and the buffer keeps its previous contents, so a payload
/// that overflows can be discarded wholesale with `reset` and nothing
/// partial ever reaches the transport. The buffer is allocated once and
/// reused across publishes.
#[derive(Debug)]
pub struct PayloadBuf {
    data: Box<[u8]>,
    len: usize,
}

impl PayloadBuf {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
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

    /// The bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Forget the current contents. Capacity is unchanged.
    pub fn reset(&mut self) {
        self.len = 0;
    }
}

impl io::Write for PayloadBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let remaining = self.data.len() - self.len;
        if buf.len() > remaining {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "payload buffer capacity exceeded",
            ));
        }
        self.data[self.len..self.len + buf.len()].copy_from_slice(buf);
        self.len += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
