//! Closed address intervals over the 32-bit space.

use std::cmp::Ordering;

use crate::error::HexError;

/// A closed interval `[start, end]` of 32-bit addresses, or the
/// distinguished empty region.
///
/// The empty region is the unique value with `start > end`; both public
/// constructors normalize their inputs, so every non-empty region satisfies
/// `start <= end`. Ordering places the empty region before all others, then
/// compares by `start`, then by `end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemoryRegion {
    start: u32,
    end: u32,
}

impl MemoryRegion {
    /// The distinguished empty region.
    pub const EMPTY: MemoryRegion = MemoryRegion { start: 1, end: 0 };

    /// Region covering `[start, end]`; a reversed pair is swapped.
    pub fn new(start: u32, end: u32) -> Self {
        if start <= end {
            MemoryRegion { start, end }
        } else {
            MemoryRegion { start: end, end: start }
        }
    }

    /// Region covering `size` bytes from `start`. Rejects spans that would
    /// wrap past the 32-bit boundary; a zero size yields the empty region.
    pub fn with_size(start: u32, size: u64) -> Result<Self, HexError> {
        if size == 0 {
            return Ok(MemoryRegion::EMPTY);
        }
        let last = (start as u64)
            .checked_add(size - 1)
            .filter(|&last| last <= u32::MAX as u64)
            .ok_or_else(|| {
                HexError::range(format!("region {start:#010X}+{size} wraps past 2^32"))
            })?;
        Ok(MemoryRegion {
            start,
            end: last as u32,
        })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// First address. Meaningful only for non-empty regions.
    #[inline]
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Last address. Meaningful only for non-empty regions.
    #[inline]
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of addresses covered; up to 2^32, hence `u64`.
    #[inline]
    pub fn size(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.end as u64 - self.start as u64 + 1
        }
    }

    #[inline]
    pub fn contains(&self, addr: u32) -> bool {
        !self.is_empty() && self.start <= addr && addr <= self.end
    }

    pub fn contains_region(&self, other: &MemoryRegion) -> bool {
        if other.is_empty() {
            return true;
        }
        !self.is_empty() && self.start <= other.start && other.end <= self.end
    }

    pub fn intersects(&self, other: &MemoryRegion) -> bool {
        !self.intersection(other).is_empty()
    }

    /// Overlap of two regions, possibly empty.
    pub fn intersection(&self, other: &MemoryRegion) -> MemoryRegion {
        if self.is_empty() || other.is_empty() {
            return MemoryRegion::EMPTY;
        }
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start <= end {
            MemoryRegion { start, end }
        } else {
            MemoryRegion::EMPTY
        }
    }

    /// Smallest region covering both operands (the hull, not the set union).
    pub fn union(&self, other: &MemoryRegion) -> MemoryRegion {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        MemoryRegion {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// True when the two regions touch without a gap (`[0,3]` and `[4,9]`).
    pub fn adjacent_to(&self, other: &MemoryRegion) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        (self.end != u32::MAX && self.end + 1 == other.start)
            || (other.end != u32::MAX && other.end + 1 == self.start)
    }
}

impl Ord for MemoryRegion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self
                .start
                .cmp(&other.start)
                .then(self.end.cmp(&other.end)),
        }
    }
}

impl PartialOrd for MemoryRegion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "[empty]")
        } else {
            write!(f, "[{:#010X}..{:#010X}]", self.start, self.end)
        }
    }
}
