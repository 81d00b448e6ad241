//! Sparse byte-addressable memory over the 32-bit address space.
//!
//! [`MemoryMap`] stores disjoint [`MemoryBlock`]s in a radix trie keyed by
//! start address. Inserts overlay bytes over whatever is present, splitting
//! and absorbing existing blocks as needed; reads of unimplemented
//! addresses yield the map's blank byte (`0xFF` by default). After
//! [`MemoryMap::organize`] no two stored blocks touch, so the block list is
//! the canonical region decomposition of the image.

mod block;
mod collection;
mod data_buffer;
mod region;
mod trie;

pub use block::MemoryBlock;
pub use collection::RegionCollection;
pub use data_buffer::DataBuffer;
pub use region::MemoryRegion;

use tracing::debug;

use crate::buffer::ByteBuffer;
use crate::error::HexError;
use crate::mask::Mask;

use trie::Trie;

/// Byte value substituted for unimplemented addresses.
pub const DEFAULT_BLANK_DATA: u8 = 0xFF;

/// Sparse mapping from 32-bit addresses to bytes.
///
/// Mutations re-canonicalize the block segmentation on completion unless
/// `suppress_organize` is set (bulk loaders set it, then organize once at
/// the end). Organization never changes the map's semantic content, only
/// how the bytes are cut into blocks.
pub struct MemoryMap {
    blocks: Trie<MemoryBlock>,
    blank_data: u8,
    suppress_organize: bool,
    organized: bool,
}

impl Default for MemoryMap {
    fn default() -> Self {
        MemoryMap {
            blocks: Trie::new(),
            blank_data: DEFAULT_BLANK_DATA,
            suppress_organize: false,
            organized: true,
        }
    }
}

impl MemoryMap {
    pub fn new() -> Self {
        MemoryMap::default()
    }

    // ── Configuration ────────────────────────────────────────────────────────

    #[inline]
    pub fn blank_data(&self) -> u8 {
        self.blank_data
    }

    pub fn set_blank_data(&mut self, blank: u8) {
        self.blank_data = blank;
    }

    /// Defer organization during bulk loads. Turning suppression back off
    /// organizes immediately.
    pub fn set_suppress_organize(&mut self, suppress: bool) {
        self.suppress_organize = suppress;
        if !suppress {
            self.organize();
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// True when some insert placed a byte at `addr` and no later delete
    /// removed it. Never errors.
    pub fn contains(&self, addr: u32) -> bool {
        self.blocks
            .floor(addr)
            .is_some_and(|(_, b)| b.region().contains(addr))
    }

    /// Number of stored blocks under the current segmentation.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Lowest implemented address.
    pub fn start_address(&self) -> Option<u32> {
        self.blocks.first().map(|(k, _)| k)
    }

    /// Highest implemented address.
    pub fn end_address(&self) -> Option<u32> {
        self.blocks.last().map(|(_, b)| b.region().end())
    }

    /// Total number of implemented bytes.
    pub fn size(&self) -> u64 {
        self.blocks.iter().map(|(_, b)| b.region().size()).sum()
    }

    /// The block regions in ascending address order.
    pub fn regions(&self) -> Vec<MemoryRegion> {
        self.blocks.iter().map(|(_, b)| b.region()).collect()
    }

    /// Ascending iteration over the stored blocks.
    pub fn iter_blocks(&self) -> impl Iterator<Item = &MemoryBlock> + '_ {
        self.blocks.iter().map(|(_, b)| b)
    }

    /// Parts of `region` that are implemented.
    pub fn intersect_regions(&self, region: MemoryRegion) -> RegionCollection {
        let mut out = RegionCollection::new();
        for key in self.intersecting_keys(region) {
            let block = self.blocks.get(key).expect("key from walk");
            out.insert(block.region().intersection(&region));
        }
        out
    }

    /// Parts of `region` that are not implemented.
    pub fn non_intersect_regions(&self, region: MemoryRegion) -> RegionCollection {
        self.intersect_regions(region).invert().intersect(region)
    }

    /// True when any implemented byte falls inside `region`.
    pub fn overlaps(&self, region: MemoryRegion) -> bool {
        !self.intersect_regions(region).is_empty()
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    /// Byte at `addr`: the stored value when implemented, the blank byte
    /// otherwise.
    pub fn get(&self, addr: u32) -> u8 {
        self.blocks
            .floor(addr)
            .and_then(|(_, b)| b.get(addr))
            .unwrap_or(self.blank_data)
    }

    /// A block of exactly `region.size()` bytes with unimplemented
    /// positions filled by the blank byte. A region with no implemented
    /// bytes yields an all-blank block, never an error.
    pub fn fetch(&self, region: MemoryRegion) -> Result<MemoryBlock, HexError> {
        if region.is_empty() {
            return Err(HexError::range("fetch of the empty region".to_string()));
        }
        let mut data = ByteBuffer::new(region.size())?;
        data.fill(self.blank_data);
        for key in self.intersecting_keys(region) {
            let block = self.blocks.get(key).expect("key from walk");
            let inter = block.region().intersection(&region);
            let offset = (inter.start() - region.start()) as usize;
            data.copy_from_slice_at(offset, block.slice(inter)?)?;
        }
        MemoryBlock::new(region, data)
    }

    /// A [`DataBuffer`] window over `region`: every byte present, with an
    /// implemented-bit mask telling blank fill and real data apart.
    pub fn window(&self, region: MemoryRegion) -> Result<DataBuffer, HexError> {
        DataBuffer::new(region, self)
    }

    /// A new map holding only the parts of this one inside `region`.
    pub fn filter(&self, region: MemoryRegion) -> Result<MemoryMap, HexError> {
        let mut out = MemoryMap::new();
        out.blank_data = self.blank_data;
        out.organized = self.organized;
        for key in self.intersecting_keys(region) {
            let block = self.blocks.get(key).expect("key from walk");
            let inter = block.region().intersection(&region);
            out.blocks
                .insert(inter.start(), MemoryBlock::new(inter, ByteBuffer::from_bytes(block.slice(inter)?))?)?;
        }
        Ok(out)
    }

    // ── Writes ───────────────────────────────────────────────────────────────

    /// Overlay `data` at `addr..addr + data.len()`, overwriting anything
    /// already implemented there.
    pub fn insert(&mut self, addr: u32, data: &[u8]) -> Result<(), HexError> {
        let region = MemoryRegion::with_size(addr, data.len() as u64)?;
        if region.is_empty() {
            return Ok(());
        }
        self.insert_region(region, data)?;
        self.finish_mutation();
        Ok(())
    }

    /// Overlay only the runs of `data` whose implemented bit is set; the
    /// unimplemented positions become (or stay) gaps.
    pub fn insert_masked(&mut self, addr: u32, data: &[u8], implemented: &Mask) -> Result<(), HexError> {
        MemoryRegion::with_size(addr, data.len() as u64)?;
        let mut i = 0usize;
        while i < data.len() {
            if !implemented.get(i as i64)? {
                i += 1;
                continue;
            }
            let mut j = i + 1;
            while j < data.len() && implemented.get(j as i64)? {
                j += 1;
            }
            self.insert_region(
                MemoryRegion::new(addr + i as u32, addr + (j - 1) as u32),
                &data[i..j],
            )?;
            i = j;
        }
        self.finish_mutation();
        Ok(())
    }

    /// Range-restricted variant: overlay `size` bytes of `buf` starting at
    /// its `offset`.
    pub fn insert_buffer(
        &mut self,
        addr: u32,
        buf: &ByteBuffer,
        offset: usize,
        size: usize,
    ) -> Result<(), HexError> {
        let end = offset
            .checked_add(size)
            .filter(|&end| end <= buf.len())
            .ok_or_else(|| {
                HexError::range(format!(
                    "span {offset}+{size} overruns buffer length {}",
                    buf.len()
                ))
            })?;
        self.insert(addr, &buf.as_slice()[offset..end])
    }

    /// Splice in another map's data intersected with `region`.
    pub fn insert_map(&mut self, other: &MemoryMap, region: MemoryRegion) -> Result<(), HexError> {
        for key in other.intersecting_keys(region) {
            let block = other.blocks.get(key).expect("key from walk");
            let inter = block.region().intersection(&region);
            self.insert_region(inter, block.slice(inter)?)?;
        }
        self.finish_mutation();
        Ok(())
    }

    // ── Mutations ────────────────────────────────────────────────────────────

    /// Remove every implemented byte inside `region`.
    pub fn delete(&mut self, region: MemoryRegion) -> Result<(), HexError> {
        self.delete_inner(region)?;
        self.finish_mutation();
        Ok(())
    }

    /// Remove every implemented byte inside any region of `regions`.
    pub fn delete_regions(&mut self, regions: &RegionCollection) -> Result<(), HexError> {
        for &region in regions.iter() {
            self.delete_inner(region)?;
        }
        self.finish_mutation();
        Ok(())
    }

    /// Keep only the bytes inside `region`; everything else is removed.
    pub fn crop(&mut self, region: MemoryRegion) -> Result<(), HexError> {
        let mut keep = RegionCollection::new();
        keep.insert(region);
        self.delete_regions(&keep.invert())
    }

    /// Shift every block by `delta` addresses, up or down. Bytes pushed
    /// past either end of the address space are dropped, not wrapped.
    pub fn offset_all_data(&mut self, delta: u32, move_up: bool) -> Result<(), HexError> {
        if delta == 0 || self.blocks.is_empty() {
            return Ok(());
        }
        let keys = self.blocks.keys();
        let mut moved: Vec<(u32, MemoryBlock)> = Vec::with_capacity(keys.len());
        for key in keys {
            let block = self.blocks.remove(key).expect("key from walk");
            let region = block.region();
            if move_up {
                let new_start = region.start() as u64 + delta as u64;
                if new_start > u32::MAX as u64 {
                    continue; // entire block pushed out the top
                }
                let keep = (u32::MAX as u64 - new_start + 1).min(region.size()) as usize;
                let piece = MemoryBlock::from_bytes(
                    new_start as u32,
                    &block.data().as_slice()[..keep],
                )?;
                moved.push((new_start as u32, piece));
            } else {
                if (region.end() as u64) < delta as u64 {
                    continue; // entire block pushed out the bottom
                }
                let first_kept = region.start().max(delta);
                let skip = (first_kept - region.start()) as usize;
                let piece = MemoryBlock::from_bytes(
                    first_kept - delta,
                    &block.data().as_slice()[skip..],
                )?;
                moved.push((first_kept - delta, piece));
            }
        }
        for (start, block) in moved {
            self.blocks.insert(start, block)?;
        }
        self.finish_mutation();
        Ok(())
    }

    /// Drop every block.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.organized = true;
    }

    /// Canonicalize the segmentation: greedily merge every maximal run of
    /// address-adjacent blocks into one. Idempotent; a no-op when the map
    /// is already organized.
    pub fn organize(&mut self) {
        if self.organized {
            return;
        }
        let keys = self.blocks.keys();
        let before = keys.len();
        let mut i = 0;
        while i < keys.len() {
            let mut j = i;
            loop {
                let end = self
                    .blocks
                    .get(keys[j])
                    .expect("key from walk")
                    .region()
                    .end();
                if j + 1 < keys.len() && end != u32::MAX && end + 1 == keys[j + 1] {
                    j += 1;
                } else {
                    break;
                }
            }
            if j > i {
                let start = keys[i];
                let end = self
                    .blocks
                    .get(keys[j])
                    .expect("key from walk")
                    .region()
                    .end();
                let mut data = Vec::with_capacity((end as u64 - start as u64 + 1) as usize);
                for &k in &keys[i..=j] {
                    let block = self.blocks.remove(k).expect("key from walk");
                    data.extend_from_slice(block.data().as_slice());
                }
                let merged = MemoryBlock::from_bytes(start, &data)
                    .expect("merged run stays within the address space");
                self.blocks
                    .insert(start, merged)
                    .expect("merged run replaces removed blocks");
            }
            i = j + 1;
        }
        if before != self.blocks.len() {
            debug!(before, after = self.blocks.len(), "organized memory map");
        }
        self.organized = true;
    }

    // ── Internals ────────────────────────────────────────────────────────────

    /// Keys of every stored block intersecting `region`, ascending.
    fn intersecting_keys(&self, region: MemoryRegion) -> Vec<u32> {
        let mut keys = Vec::new();
        if region.is_empty() {
            return keys;
        }
        let mut cursor = match self.blocks.floor(region.start()) {
            Some((k, _)) => Some(k),
            None => self.blocks.ceiling(region.start()).map(|(k, _)| k),
        };
        while let Some(key) = cursor {
            let block = self.blocks.get(key).expect("cursor from lookup");
            if block.region().start() > region.end() {
                break;
            }
            if block.region().intersects(&region) {
                keys.push(key);
            }
            cursor = self.next_key(key);
        }
        keys
    }

    fn next_key(&self, key: u32) -> Option<u32> {
        if key == u32::MAX {
            return None;
        }
        self.blocks.ceiling(key + 1).map(|(k, _)| k)
    }

    /// The overlap walk behind every insert. Existing blocks that the
    /// incoming span partially covers are overwritten in place and the
    /// incoming span shrinks to the uncovered remainder; blocks it fully
    /// covers are removed; whatever is left becomes a new block.
    fn insert_region(&mut self, region: MemoryRegion, data: &[u8]) -> Result<(), HexError> {
        debug_assert_eq!(region.size(), data.len() as u64);
        let mut rest = region;
        let mut offset = 0usize; // index into `data` of rest.start()
        let mut doomed: Vec<u32> = Vec::new();

        let mut cursor = match self.blocks.floor(region.start()) {
            Some((k, _)) => Some(k),
            None => self.blocks.ceiling(region.start()).map(|(k, _)| k),
        };
        while let Some(key) = cursor {
            let (bs, be) = {
                let block = self.blocks.get(key).expect("cursor from lookup");
                (block.region().start(), block.region().end())
            };
            if be < rest.start() {
                // Predecessor that ends before the incoming span.
            } else if bs > rest.end() {
                break;
            } else if bs <= rest.start() && be >= rest.end() {
                // Existing block contains the span: overwrite its middle,
                // the span is fully absorbed.
                let n = rest.size() as usize;
                self.blocks
                    .get_mut(key)
                    .expect("cursor from lookup")
                    .write_at(rest.start(), &data[offset..offset + n])?;
                rest = MemoryRegion::EMPTY;
                break;
            } else if bs >= rest.start() && be <= rest.end() {
                // Span contains the block: it will be removed wholesale.
                doomed.push(key);
            } else if bs < rest.start() {
                // Block hangs off the front: overwrite its tail, advance
                // the span past it.
                let n = (be - rest.start() + 1) as usize;
                self.blocks
                    .get_mut(key)
                    .expect("cursor from lookup")
                    .write_at(rest.start(), &data[offset..offset + n])?;
                offset += n;
                rest = MemoryRegion::new(be + 1, rest.end());
            } else {
                // Block hangs off the back: overwrite its head, trim the
                // span to the gap before it. Nothing further can overlap.
                let n = (rest.end() - bs + 1) as usize;
                let skip = offset + (bs - rest.start()) as usize;
                self.blocks
                    .get_mut(key)
                    .expect("cursor from lookup")
                    .write_at(bs, &data[skip..skip + n])?;
                rest = MemoryRegion::new(rest.start(), bs - 1);
                break;
            }
            cursor = self.next_key(key);
        }

        for key in doomed {
            self.blocks.remove(key);
        }
        if !rest.is_empty() {
            let bytes = &data[offset..offset + rest.size() as usize];
            self.blocks
                .insert(rest.start(), MemoryBlock::new(rest, ByteBuffer::from_bytes(bytes))?)?;
        }
        self.organized = false;
        Ok(())
    }

    fn delete_inner(&mut self, region: MemoryRegion) -> Result<(), HexError> {
        for key in self.intersecting_keys(region) {
            let block = self.blocks.remove(key).expect("key from walk");
            let r = block.region();
            if r.start() < region.start() {
                let left = MemoryRegion::new(r.start(), region.start() - 1);
                self.blocks
                    .insert(left.start(), MemoryBlock::new(left, ByteBuffer::from_bytes(block.slice(left)?))?)?;
            }
            if r.end() > region.end() {
                let right = MemoryRegion::new(region.end() + 1, r.end());
                self.blocks
                    .insert(right.start(), MemoryBlock::new(right, ByteBuffer::from_bytes(block.slice(right)?))?)?;
            }
        }
        self.organized = false;
        Ok(())
    }

    fn finish_mutation(&mut self) {
        if !self.suppress_organize {
            self.organize();
        }
    }
}

/// Compares the stored segmentation. Two maps with identical content but
/// different segmentation compare unequal until both are organized.
impl PartialEq for MemoryMap {
    fn eq(&self, other: &Self) -> bool {
        if self.blocks.len() != other.blocks.len() {
            return false;
        }
        self.blocks
            .iter()
            .zip(other.blocks.iter())
            .all(|((ka, a), (kb, b))| ka == kb && a == b)
    }
}

impl Eq for MemoryMap {}

impl std::fmt::Debug for MemoryMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMap")
            .field("blocks", &self.block_count())
            .field("size", &self.size())
            .field("blank_data", &self.blank_data)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
