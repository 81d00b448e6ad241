//! Owned, fixed-length byte storage.
//!
//! [`ByteBuffer`] is the backing store for every memory block and data
//! window in the crate: a single contiguous allocation whose length is
//! fixed at construction. Lengths up to 2^32 are supported so a block can
//! span the whole address space. Bulk copies are bounds-checked, safe for
//! overlapping in-place moves, and performed in bounded chunks so one call
//! never turns into a single multi-gigabyte `memcpy`.

use crate::error::HexError;

/// Largest number of bytes moved per copy step.
///
/// Keeps the per-call work of a bulk move bounded when shuffling
/// multi-hundred-MiB images.
const COPY_CHUNK: usize = 16 * 1024 * 1024;

/// Maximum supported buffer length: one byte per 32-bit address.
const MAX_LEN: u64 = 1 << 32;

/// Heap-allocated contiguous byte region with a length fixed at creation.
///
/// Cloning performs a deep copy.
#[derive(Clone, PartialEq, Eq)]
pub struct ByteBuffer {
    bytes: Vec<u8>,
}

impl ByteBuffer {
    /// Allocate a zero-filled buffer of `len` bytes.
    ///
    /// Fails with [`HexError::OutOfRange`] when `len` exceeds 2^32.
    pub fn new(len: u64) -> Result<Self, HexError> {
        if len > MAX_LEN {
            return Err(HexError::range(format!(
                "buffer length {len} exceeds 2^32"
            )));
        }
        Ok(ByteBuffer {
            bytes: vec![0u8; len as usize],
        })
    }

    /// Allocate a buffer holding a copy of `data`.
    pub fn from_bytes(data: &[u8]) -> Self {
        ByteBuffer {
            bytes: data.to_vec(),
        }
    }

    /// Number of bytes in the buffer. Immutable after construction.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Set every byte to `value`.
    pub fn fill(&mut self, value: u8) {
        self.bytes.fill(value);
    }

    /// Bounds-checked read.
    pub fn get(&self, index: usize) -> Result<u8, HexError> {
        self.bytes
            .get(index)
            .copied()
            .ok_or_else(|| HexError::range(format!("index {index} >= length {}", self.len())))
    }

    /// Bounds-checked write.
    pub fn set(&mut self, index: usize, value: u8) -> Result<(), HexError> {
        let len = self.len();
        match self.bytes.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(HexError::range(format!("index {index} >= length {len}"))),
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Copy `n` bytes from `src` (starting at `src_off`) into `dst`
    /// (starting at `dst_off`). Fails with [`HexError::OutOfRange`] when
    /// either side would overrun.
    pub fn copy(
        src: &ByteBuffer,
        src_off: usize,
        dst: &mut ByteBuffer,
        dst_off: usize,
        n: usize,
    ) -> Result<(), HexError> {
        check_span(src.len(), src_off, n, "source")?;
        check_span(dst.len(), dst_off, n, "destination")?;
        let mut done = 0;
        while done < n {
            let step = (n - done).min(COPY_CHUNK);
            dst.bytes[dst_off + done..dst_off + done + step]
                .copy_from_slice(&src.bytes[src_off + done..src_off + done + step]);
            done += step;
        }
        Ok(())
    }

    /// Copy a raw slice into the buffer at `dst_off`.
    pub fn copy_from_slice_at(&mut self, dst_off: usize, src: &[u8]) -> Result<(), HexError> {
        check_span(self.len(), dst_off, src.len(), "destination")?;
        let mut done = 0;
        while done < src.len() {
            let step = (src.len() - done).min(COPY_CHUNK);
            self.bytes[dst_off + done..dst_off + done + step]
                .copy_from_slice(&src[done..done + step]);
            done += step;
        }
        Ok(())
    }

    /// Move `n` bytes within the buffer from `src_off` to `dst_off`.
    /// The ranges may overlap.
    pub fn copy_within(
        &mut self,
        src_off: usize,
        dst_off: usize,
        n: usize,
    ) -> Result<(), HexError> {
        check_span(self.len(), src_off, n, "source")?;
        check_span(self.len(), dst_off, n, "destination")?;
        if n == 0 || src_off == dst_off {
            return Ok(());
        }
        // Chunk order depends on the move direction so an overlapping move
        // never reads a byte it has already overwritten.
        if dst_off < src_off {
            let mut done = 0;
            while done < n {
                let step = (n - done).min(COPY_CHUNK);
                self.bytes
                    .copy_within(src_off + done..src_off + done + step, dst_off + done);
                done += step;
            }
        } else {
            let mut remaining = n;
            while remaining > 0 {
                let step = remaining.min(COPY_CHUNK);
                remaining -= step;
                self.bytes.copy_within(
                    src_off + remaining..src_off + remaining + step,
                    dst_off + remaining,
                );
            }
        }
        Ok(())
    }
}

impl std::ops::Index<usize> for ByteBuffer {
    type Output = u8;
    #[inline]
    fn index(&self, index: usize) -> &u8 {
        &self.bytes[index]
    }
}

impl std::ops::IndexMut<usize> for ByteBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut u8 {
        &mut self.bytes[index]
    }
}

impl std::fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ByteBuffer({} bytes)", self.len())
    }
}

fn check_span(len: usize, off: usize, n: usize, side: &str) -> Result<(), HexError> {
    match off.checked_add(n) {
        Some(end) if end <= len => Ok(()),
        _ => Err(HexError::range(format!(
            "{side} span {off}+{n} overruns length {len}"
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_zero_filled() {
        let buf = ByteBuffer::new(16).unwrap();
        assert_eq!(buf.len(), 16);
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn new_rejects_oversize() {
        assert!(ByteBuffer::new((1u64 << 32) + 1).is_err());
    }

    #[test]
    fn fill_and_index() {
        let mut buf = ByteBuffer::new(4).unwrap();
        buf.fill(0xAB);
        assert_eq!(buf.get(3).unwrap(), 0xAB);
        buf.set(2, 0x01).unwrap();
        assert_eq!(buf[2], 0x01);
        assert!(buf.get(4).is_err());
        assert!(buf.set(4, 0).is_err());
    }

    #[test]
    fn copy_between_buffers() {
        let src = ByteBuffer::from_bytes(&[1, 2, 3, 4, 5]);
        let mut dst = ByteBuffer::new(5).unwrap();
        ByteBuffer::copy(&src, 1, &mut dst, 0, 3).unwrap();
        assert_eq!(&dst.as_slice()[..3], &[2, 3, 4]);
        // Overruns on either side fail.
        assert!(ByteBuffer::copy(&src, 3, &mut dst, 0, 3).is_err());
        assert!(ByteBuffer::copy(&src, 0, &mut dst, 3, 3).is_err());
    }

    /// Forward and backward overlapping moves both behave like memmove.
    #[test]
    fn copy_within_overlapping() {
        let mut buf = ByteBuffer::from_bytes(&[1, 2, 3, 4, 5, 6]);
        buf.copy_within(0, 2, 4).unwrap();
        assert_eq!(buf.as_slice(), &[1, 2, 1, 2, 3, 4]);

        let mut buf = ByteBuffer::from_bytes(&[1, 2, 3, 4, 5, 6]);
        buf.copy_within(2, 0, 4).unwrap();
        assert_eq!(buf.as_slice(), &[3, 4, 5, 6, 5, 6]);
    }

    #[test]
    fn clone_is_deep() {
        let mut a = ByteBuffer::from_bytes(&[9, 9]);
        let b = a.clone();
        a.set(0, 1).unwrap();
        assert_eq!(b[0], 9);
    }
}
