//! A contiguous run of implemented bytes.

use crate::buffer::ByteBuffer;
use crate::error::HexError;

use super::region::MemoryRegion;

/// A non-empty region plus its byte data; `data[i]` is the byte at address
/// `region.start() + i`. The pairing is consistent by construction and
/// stays so: the region is immutable and the data length never changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryBlock {
    region: MemoryRegion,
    data: ByteBuffer,
}

impl MemoryBlock {
    /// Pair `region` with `data`. The lengths must agree exactly.
    pub fn new(region: MemoryRegion, data: ByteBuffer) -> Result<Self, HexError> {
        if region.is_empty() || region.size() != data.len() as u64 {
            return Err(HexError::range(format!(
                "block data length {} does not match region {region}",
                data.len()
            )));
        }
        Ok(MemoryBlock { region, data })
    }

    /// Block starting at `start` holding a copy of `bytes`.
    pub fn from_bytes(start: u32, bytes: &[u8]) -> Result<Self, HexError> {
        let region = MemoryRegion::with_size(start, bytes.len() as u64)?;
        MemoryBlock::new(region, ByteBuffer::from_bytes(bytes))
    }

    #[inline]
    pub fn region(&self) -> MemoryRegion {
        self.region
    }

    #[inline]
    pub fn data(&self) -> &ByteBuffer {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut ByteBuffer {
        &mut self.data
    }

    /// Byte at `addr`, or `None` when the address is outside the block.
    pub fn get(&self, addr: u32) -> Option<u8> {
        if !self.region.contains(addr) {
            return None;
        }
        Some(self.data[(addr - self.region.start()) as usize])
    }

    /// Overwrite the bytes at `addr..addr + src.len()`. The span must lie
    /// entirely inside the block.
    pub fn write_at(&mut self, addr: u32, src: &[u8]) -> Result<(), HexError> {
        let span = MemoryRegion::with_size(addr, src.len() as u64)?;
        if !self.region.contains_region(&span) {
            return Err(HexError::range(format!(
                "write span {span} outside block {}",
                self.region
            )));
        }
        self.data
            .copy_from_slice_at((addr - self.region.start()) as usize, src)
    }

    /// The bytes covering `region`, which must lie entirely inside the
    /// block.
    pub fn slice(&self, region: MemoryRegion) -> Result<&[u8], HexError> {
        if !self.region.contains_region(&region) {
            return Err(HexError::range(format!(
                "slice {region} outside block {}",
                self.region
            )));
        }
        if region.is_empty() {
            return Ok(&[]);
        }
        let lo = (region.start() - self.region.start()) as usize;
        Ok(&self.data.as_slice()[lo..lo + region.size() as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_requires_matching_lengths() {
        let region = MemoryRegion::new(0x100, 0x103);
        assert!(MemoryBlock::new(region, ByteBuffer::new(4).unwrap()).is_ok());
        assert!(MemoryBlock::new(region, ByteBuffer::new(3).unwrap()).is_err());
        assert!(MemoryBlock::new(MemoryRegion::EMPTY, ByteBuffer::new(0).unwrap()).is_err());
    }

    #[test]
    fn addressed_access() {
        let b = MemoryBlock::from_bytes(0x200, &[1, 2, 3]).unwrap();
        assert_eq!(b.get(0x200), Some(1));
        assert_eq!(b.get(0x202), Some(3));
        assert_eq!(b.get(0x203), None);
        assert_eq!(b.get(0x1FF), None);
    }

    #[test]
    fn write_at_sub_range() {
        let mut b = MemoryBlock::from_bytes(10, &[0; 6]).unwrap();
        b.write_at(12, &[7, 8]).unwrap();
        assert_eq!(b.data().as_slice(), &[0, 0, 7, 8, 0, 0]);
        assert!(b.write_at(14, &[1, 2, 3]).is_err());
        assert!(b.write_at(9, &[1]).is_err());
    }

    #[test]
    fn slice_by_region() {
        let b = MemoryBlock::from_bytes(10, &[1, 2, 3, 4]).unwrap();
        assert_eq!(b.slice(MemoryRegion::new(11, 12)).unwrap(), &[2, 3]);
        assert!(b.slice(MemoryRegion::new(13, 14)).is_err());
    }
}
