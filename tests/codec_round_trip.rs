// Emit/parse round-trips for every text format: parse(emit(M)) == M.

use hexmap::format::{load_bytes, save, FormatKind};
use hexmap::{MemoryMap, MemoryRegion};

fn sample_maps() -> Vec<MemoryMap> {
    let mut single = MemoryMap::new();
    single.insert(0x0100, &(0u8..16).collect::<Vec<_>>()).unwrap();

    let mut gappy = MemoryMap::new();
    gappy.insert(0x0000, &[0xDE, 0xAD]).unwrap();
    gappy.insert(0x0800, &(0u8..37).collect::<Vec<_>>()).unwrap();
    gappy.insert(0x1000, &[0x42]).unwrap();

    let mut wide = MemoryMap::new();
    wide.insert(0x0001_FFF0, &(0u8..64).collect::<Vec<_>>()).unwrap();
    wide.insert(0x0100_0000, &[1, 2, 3]).unwrap();

    vec![single, gappy, wide]
}

fn round_trip(kind: FormatKind, map: &mut MemoryMap) -> MemoryMap {
    let mut emitted = Vec::new();
    save(kind, map, &mut emitted).unwrap();
    let mut back = MemoryMap::new();
    let report = load_bytes(kind, &emitted, &mut back, false).unwrap();
    assert!(
        report.errors.is_empty(),
        "{kind}: {:?}\n{}",
        report.errors,
        String::from_utf8_lossy(&emitted)
    );
    back
}

#[test]
fn every_text_format_round_trips() {
    for kind in [
        FormatKind::IntelHex,
        FormatKind::MotorolaSrec,
        FormatKind::TektronixHex,
        FormatKind::TiText,
        FormatKind::ActelHex,
        FormatKind::ChecksumMem,
    ] {
        for (i, mut map) in sample_maps().into_iter().enumerate() {
            let back = round_trip(kind, &mut map);
            assert_eq!(back, map, "{kind}, sample {i}");
        }
    }
}

#[test]
fn emitted_text_has_no_byte_order_mark() {
    let mut map = MemoryMap::new();
    map.insert(0, &[1, 2, 3]).unwrap();
    for kind in [FormatKind::IntelHex, FormatKind::MotorolaSrec, FormatKind::TiText] {
        let mut emitted = Vec::new();
        save(kind, &mut map, &mut emitted).unwrap();
        assert!(!emitted.starts_with(&[0xEF, 0xBB, 0xBF]), "{kind}");
        assert!(emitted.is_ascii(), "{kind}");
    }
}

#[test]
fn utf16_input_is_accepted() {
    // The same Intel image, encoded as UTF-16 LE with a BOM.
    let text = ":02000000BEEF51\n:00000001FF\n";
    let mut encoded: Vec<u8> = vec![0xFF, 0xFE];
    encoded.extend(text.encode_utf16().flat_map(|u| u.to_le_bytes()));

    let mut map = MemoryMap::new();
    let report = load_bytes(FormatKind::IntelHex, &encoded, &mut map, false).unwrap();
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(map.get(0), 0xBE);
    assert_eq!(map.get(1), 0xEF);
}

#[test]
fn fetch_blank_fill_matches_configured_blank() {
    let mut map = MemoryMap::new();
    map.set_blank_data(0xAA);
    map.insert(10, &[1]).unwrap();
    let block = map.fetch(MemoryRegion::new(8, 12)).unwrap();
    assert_eq!(block.data().as_slice(), &[0xAA, 0xAA, 1, 0xAA, 0xAA]);
}
