#![forbid(unsafe_code)]

use crate::error::{DecompressError, Result};

////////////////////////////////////////////////////////////////////////////////

/// Upper bound of the DEFLATE expansion ratio (258-byte matches at ~2 bits each).
pub const MAX_EXPANSION_RATIO: usize = 1032;

/// Append-only output buffer that can replay its own history.
pub struct TrackingWriter {
    inner: Vec<u8>,
}

impl TrackingWriter {
    /// Pre-sizes the buffer from an untrusted hint, capped at what `input_len`
    /// compressed bytes could possibly expand to.
    pub fn with_size_hint(size_hint: usize, input_len: usize) -> Self {
        let capacity = size_hint.min(input_len.saturating_mul(MAX_EXPANSION_RATIO));
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, byte: u8) {
        self.inner.push(byte);
    }

    pub fn write_slice(&mut self, buf: &[u8]) {
        self.inner.extend_from_slice(buf);
    }

    /// Write a sequence of `len` bytes written `dist` bytes ago. The source and
    /// destination may overlap when `len > dist`, repeating the pattern.
    pub fn write_previous(&mut self, dist: usize, len: usize) -> Result<()> {
        let available = self.inner.len();
        if dist == 0 || dist > available {
            return Err(DecompressError::InvalidBackReference {
                distance: dist,
                available,
            });
        }

        self.inner.reserve(len);
        let start = available - dist;
        for i in start..start + len {
            let byte = self.inner[i];
            self.inner.push(byte);
        }
        Ok(())
    }

    pub fn byte_count(&self) -> usize {
        self.inner.len()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.inner
    }
}

////////////////////////////////////////////////////////////////////////////////
