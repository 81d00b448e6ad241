// Semantic laws of the sparse memory map, exercised through the public
// API only.

use hexmap::{MemoryMap, MemoryRegion};

#[test]
fn organize_is_idempotent() {
    let mut map = MemoryMap::new();
    map.set_suppress_organize(true);
    for i in 0u32..64 {
        map.insert(i * 3, &[i as u8]).unwrap();
    }
    map.insert(1, &[0xEE]).unwrap();
    map.organize();
    let first = map.regions();
    map.organize();
    assert_eq!(map.regions(), first);
}

#[test]
fn insert_fetch_round_trip() {
    let bytes: Vec<u8> = (0u8..100).collect();
    let mut map = MemoryMap::new();
    map.insert(0x4000, &bytes).unwrap();
    let region = MemoryRegion::new(0x4000, 0x4063);
    assert_eq!(map.fetch(region).unwrap().data().as_slice(), &bytes[..]);
    let window = map.window(region).unwrap();
    assert_eq!(window.implemented_count(), 100);
}

#[test]
fn overlapping_insert_wins() {
    let mut map = MemoryMap::new();
    map.insert(0x10, &[1; 8]).unwrap();
    map.insert(0x10, &[2; 8]).unwrap();
    assert_eq!(
        map.fetch(MemoryRegion::new(0x10, 0x17)).unwrap().data().as_slice(),
        &[2; 8]
    );
}

#[test]
fn delete_then_contains_is_false() {
    let mut map = MemoryMap::new();
    map.insert(0x100, &[7; 32]).unwrap();
    map.delete(MemoryRegion::new(0x100, 0x11F)).unwrap();
    assert!((0x100..0x120).all(|a| !map.contains(a)));
    assert_eq!(map.block_count(), 0);
}

#[test]
fn adjacent_runs_become_one_block() {
    let mut map = MemoryMap::new();
    map.insert(0x1000, &[1; 40]).unwrap();
    map.insert(0x1028, &[2; 24]).unwrap();
    assert_eq!(map.block_count(), 1);
    assert_eq!(map.size(), 64);
}

#[test]
fn size_is_sum_of_region_sizes() {
    let mut map = MemoryMap::new();
    map.insert(0, &[1; 10]).unwrap();
    map.insert(0x100, &[1; 20]).unwrap();
    map.insert(0x5, &[1; 10]).unwrap(); // overlaps the first run
    let total: u64 = map.regions().iter().map(|r| r.size()).sum();
    assert_eq!(map.size(), total);
    assert_eq!(total, 35);
}

#[test]
fn overlaps_agrees_with_intersections() {
    let mut map = MemoryMap::new();
    map.insert(50, &[1; 10]).unwrap();
    for probe in [
        MemoryRegion::new(0, 49),
        MemoryRegion::new(0, 50),
        MemoryRegion::new(55, 200),
        MemoryRegion::new(60, 200),
    ] {
        assert_eq!(
            map.overlaps(probe),
            map.intersect_regions(probe).len() > 0,
            "{probe}"
        );
    }
}

/// The bulk-load scenario: ten thousand isolated single-byte blocks, then
/// the gaps filled in, collapsing everything into one block.
#[test]
fn interleaved_stress() {
    let mut map = MemoryMap::new();
    map.set_suppress_organize(true);

    for addr in (0u32..20_000).step_by(2) {
        map.insert(addr, &[(addr & 0xFF) as u8]).unwrap();
    }
    assert_eq!(map.block_count(), 10_000);
    assert_eq!(map.size(), 10_000);

    for addr in (1u32..19_998).step_by(2) {
        map.insert(addr, &[(addr & 0xFF) as u8]).unwrap();
    }
    map.organize();
    assert_eq!(map.block_count(), 1);
    assert_eq!(map.size(), 19_999);
    assert_eq!(map.start_address(), Some(0));
    assert_eq!(map.end_address(), Some(19_998));

    // Spot-check content survived the merge.
    assert_eq!(map.get(11_111), (11_111 & 0xFF) as u8);
    assert_eq!(map.get(0), 0);
}
