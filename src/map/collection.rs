//! Ordered sets of non-overlapping memory regions.

use std::collections::BTreeMap;

use super::region::MemoryRegion;

/// An ordered set of disjoint, non-adjacent regions indexed by start
/// address.
///
/// `insert` merges any regions that overlap or touch the incoming one, so
/// the set is canonical at all times: iteration yields disjoint regions in
/// ascending order with at least a one-byte gap between neighbors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionCollection {
    regions: BTreeMap<u32, MemoryRegion>,
}

impl RegionCollection {
    pub fn new() -> Self {
        RegionCollection::default()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Total number of addresses covered.
    pub fn total_size(&self) -> u64 {
        self.regions.values().map(MemoryRegion::size).sum()
    }

    pub fn contains(&self, addr: u32) -> bool {
        self.regions
            .range(..=addr)
            .next_back()
            .is_some_and(|(_, r)| r.contains(addr))
    }

    /// Ascending iteration over the stored regions.
    pub fn iter(&self) -> impl Iterator<Item = &MemoryRegion> {
        self.regions.values()
    }

    /// Add `region`, merging it with every stored region it overlaps or
    /// touches.
    pub fn insert(&mut self, region: MemoryRegion) {
        if region.is_empty() {
            return;
        }
        let mut merged = region;
        // Candidates start at or before region.end + 1; among them, any
        // whose end + 1 reaches region.start participates in the merge.
        let upper = merged.end().saturating_add(1);
        let doomed: Vec<u32> = self
            .regions
            .range(..=upper)
            .filter(|(_, r)| r.end() as u64 + 1 >= merged.start() as u64)
            .map(|(&k, _)| k)
            .collect();
        for k in doomed {
            let r = self.regions.remove(&k).unwrap();
            merged = merged.union(&r);
        }
        self.regions.insert(merged.start(), merged);
    }

    /// Remove every address in `region` from the set, splitting stored
    /// regions where necessary.
    pub fn delete(&mut self, region: MemoryRegion) {
        if region.is_empty() {
            return;
        }
        let doomed: Vec<u32> = self
            .regions
            .range(..=region.end())
            .filter(|(_, r)| r.end() >= region.start())
            .map(|(&k, _)| k)
            .collect();
        for k in doomed {
            let r = self.regions.remove(&k).unwrap();
            if r.start() < region.start() {
                let left = MemoryRegion::new(r.start(), region.start() - 1);
                self.regions.insert(left.start(), left);
            }
            if r.end() > region.end() {
                let right = MemoryRegion::new(region.end() + 1, r.end());
                self.regions.insert(right.start(), right);
            }
        }
    }

    /// Keep only the parts of the set inside `region`.
    pub fn crop(&mut self, region: MemoryRegion) {
        *self = self.intersect(region);
    }

    /// The parts of the set inside `region`, as a new collection.
    pub fn intersect(&self, region: MemoryRegion) -> RegionCollection {
        let mut out = RegionCollection::new();
        for r in self.regions.values() {
            let cut = r.intersection(&region);
            if !cut.is_empty() {
                out.regions.insert(cut.start(), cut);
            }
        }
        out
    }

    /// Complement within the full 32-bit address space.
    pub fn invert(&self) -> RegionCollection {
        let mut out = RegionCollection::new();
        let mut next: u64 = 0;
        for r in self.regions.values() {
            if (r.start() as u64) > next {
                out.insert(MemoryRegion::new(next as u32, r.start() - 1));
            }
            next = r.end() as u64 + 1;
        }
        if next <= u32::MAX as u64 {
            out.insert(MemoryRegion::new(next as u32, u32::MAX));
        }
        out
    }
}

impl FromIterator<MemoryRegion> for RegionCollection {
    fn from_iter<T: IntoIterator<Item = MemoryRegion>>(iter: T) -> Self {
        let mut out = RegionCollection::new();
        for r in iter {
            out.insert(r);
        }
        out
    }
}
