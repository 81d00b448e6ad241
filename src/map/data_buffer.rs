//! Windows over a memory-map region.

use crate::buffer::ByteBuffer;
use crate::error::HexError;
use crate::mask::Mask;

use super::region::MemoryRegion;
use super::MemoryMap;

/// A materialized view of one region of a memory map.
///
/// Every byte of the window is present; the paired implemented-bit mask
/// records which positions came from real data and which are blank fill.
/// Bit `i` of the mask corresponds to `data[i]`, i.e. to address
/// `start + i`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataBuffer {
    start: u32,
    data: ByteBuffer,
    implemented: Mask,
    blank_data: u8,
}

impl DataBuffer {
    /// Snapshot `region` of `map`.
    pub fn new(region: MemoryRegion, map: &MemoryMap) -> Result<Self, HexError> {
        let block = map.fetch(region)?;
        let mut implemented = Mask::new(false);
        for covered in map.intersect_regions(region).iter() {
            let lo = (covered.start() - region.start()) as i64;
            let hi = lo + covered.size() as i64 - 1;
            implemented.set_range(lo, hi, true)?;
        }
        Ok(DataBuffer {
            start: region.start(),
            data: block.data().clone(),
            implemented,
            blank_data: map.blank_data(),
        })
    }

    /// Window of unimplemented blanks, detached from any map.
    pub fn blank(region: MemoryRegion, blank_data: u8) -> Result<Self, HexError> {
        if region.is_empty() {
            return Err(HexError::range("window over the empty region".to_string()));
        }
        let mut data = ByteBuffer::new(region.size())?;
        data.fill(blank_data);
        Ok(DataBuffer {
            start: region.start(),
            data,
            implemented: Mask::new(false),
            blank_data,
        })
    }

    /// Address of the first byte of the window.
    #[inline]
    pub fn start(&self) -> u32 {
        self.start
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn blank_data(&self) -> u8 {
        self.blank_data
    }

    pub fn data(&self) -> &ByteBuffer {
        &self.data
    }

    pub fn implemented(&self) -> &Mask {
        &self.implemented
    }

    pub fn get(&self, index: usize) -> Result<u8, HexError> {
        self.data.get(index)
    }

    /// True when position `index` carries real data rather than blank fill.
    pub fn is_implemented(&self, index: usize) -> bool {
        index < self.len() && self.implemented.get(index as i64).unwrap_or(false)
    }

    /// Number of positions carrying real data.
    pub fn implemented_count(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        self.implemented
            .count_bits(0, self.len() as i64 - 1, true)
            .unwrap_or(0)
    }

    /// Store a byte and mark its position implemented.
    pub fn set(&mut self, index: usize, value: u8) -> Result<(), HexError> {
        self.data.set(index, value)?;
        self.implemented.set(index as i64, true)
    }

    /// Clear a position back to blank fill.
    pub fn clear(&mut self, index: usize) -> Result<(), HexError> {
        self.data.set(index, self.blank_data)?;
        self.implemented.set(index as i64, false)
    }

    /// Write the implemented runs of the window back into `map`.
    pub fn write_back(&self, map: &mut MemoryMap) -> Result<(), HexError> {
        map.insert_masked(self.start, self.data.as_slice(), &self.implemented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_round_trips_through_write_back() {
        let mut map = MemoryMap::new();
        map.insert(100, &[1, 2, 3]).unwrap();
        let mut win = map.window(MemoryRegion::new(98, 104)).unwrap();
        assert_eq!(win.start(), 98);
        assert_eq!(win.implemented_count(), 3);

        win.set(0, 0xAA).unwrap();
        win.clear(3).unwrap();
        let mut out = MemoryMap::new();
        win.write_back(&mut out).unwrap();
        assert!(out.contains(98));
        assert_eq!(out.get(98), 0xAA);
        assert!(out.contains(100) && out.contains(102));
        assert!(!out.contains(101)); // cleared position stays a gap
        assert!(!out.contains(99) && !out.contains(103) && !out.contains(104));
    }

    #[test]
    fn blank_window() {
        let win = DataBuffer::blank(MemoryRegion::new(0, 7), 0xEE).unwrap();
        assert_eq!(win.len(), 8);
        assert_eq!(win.get(5).unwrap(), 0xEE);
        assert_eq!(win.implemented_count(), 0);
        assert!(!win.is_implemented(5));
    }
}
