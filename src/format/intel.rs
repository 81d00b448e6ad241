//! Intel Hex records (`:LLAAAATT…CC`).
//!
//! Record types: 00 data, 01 end-of-file, 02 extended segment address
//! (base = field << 4), 03 start segment address, 04 extended linear
//! address (base = field << 16), 05 start linear address. The checksum
//! byte is the two's complement of the sum of every preceding byte on the
//! line.

use std::io::Write;

use crate::error::HexError;
use crate::map::MemoryMap;

use super::{
    decode_hex_pairs, decode_hex_string, hex_val, CodecState, DataRecord, HexCodec, LineStatus,
};

const DEFAULT_BYTES_PER_LINE: usize = 16;

pub struct IntelHexCodec {
    bytes_per_line: usize,
    /// Base contributed by the latest type-02/04 record.
    upper_base: u32,
    /// Entry point from a type-03/05 record, kept as metadata.
    start_address: Option<u32>,
}

impl IntelHexCodec {
    pub fn new() -> Self {
        IntelHexCodec {
            bytes_per_line: DEFAULT_BYTES_PER_LINE,
            upper_base: 0,
            start_address: None,
        }
    }

    pub fn start_address(&self) -> Option<u32> {
        self.start_address
    }

    /// Validate a non-data record's checksum right away; data records defer
    /// their data bytes to the drain.
    fn check_inline(state: &mut CodecState, line_number: usize, sum: u32, declared: u32) {
        if sum.wrapping_add(declared) & 0xFF != 0 {
            state.push_checksum_issue(checksum_message(line_number, sum, declared));
        }
    }

    fn write_record(
        out: &mut dyn Write,
        addr16: u16,
        record_type: u8,
        data: &[u8],
    ) -> Result<(), HexError> {
        let mut sum = data.len() as u32 + (addr16 >> 8) as u32 + (addr16 & 0xFF) as u32
            + record_type as u32;
        write!(out, ":{:02X}{:04X}{:02X}", data.len(), addr16, record_type)?;
        for &byte in data {
            sum += byte as u32;
            write!(out, "{byte:02X}")?;
        }
        writeln!(out, "{:02X}", (0x100 - (sum & 0xFF)) & 0xFF)?;
        Ok(())
    }
}

impl Default for IntelHexCodec {
    fn default() -> Self {
        IntelHexCodec::new()
    }
}

fn checksum_message(line_number: usize, sum: u32, declared: u32) -> String {
    let expected = (0x100 - (sum & 0xFF)) & 0xFF;
    format!("Line {line_number}: invalid checksum (expected {expected:02X}, found {declared:02X})")
}

impl HexCodec for IntelHexCodec {
    fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }

    fn set_bytes_per_line(&mut self, n: usize) {
        self.bytes_per_line = n.clamp(1, 255);
    }

    fn reset_state(&mut self) {
        self.upper_base = 0;
        self.start_address = None;
    }

    fn process_line(
        &mut self,
        state: &mut CodecState,
        line_number: usize,
        line: &str,
    ) -> LineStatus {
        let line = line.trim();
        if line.is_empty() {
            return LineStatus::Continue;
        }
        let Some(body) = line.strip_prefix(':') else {
            state.push_error(line_number, "record does not start with ':'");
            return LineStatus::Continue;
        };
        if body.len() < 10 || body.len() % 2 != 0 || !body.bytes().all(|b| hex_val(b).is_some()) {
            state.push_error(line_number, "malformed record framing");
            return LineStatus::Continue;
        }
        // Framing is all-hex from here on; the field parses cannot fail.
        let count = u32::from_str_radix(&body[0..2], 16).unwrap_or(0);
        if body.len() != 10 + 2 * count as usize {
            state.push_error(
                line_number,
                format!("length field {count} does not match record size"),
            );
            return LineStatus::Continue;
        }
        let addr16 = u32::from_str_radix(&body[2..6], 16).unwrap_or(0);
        let record_type = u32::from_str_radix(&body[6..8], 16).unwrap_or(0);
        let declared = u32::from_str_radix(&body[body.len() - 2..], 16).unwrap_or(0);
        let data_text = &body[8..body.len() - 2];
        let header_sum = count + (addr16 >> 8) + (addr16 & 0xFF) + record_type;

        match record_type {
            0x00 => {
                let address = self.upper_base as u64 + addr16 as u64;
                if address + count as u64 - 1 > u32::MAX as u64 {
                    state.push_error(line_number, "data record reaches past the 32-bit space");
                    return LineStatus::Continue;
                }
                state.records.push(DataRecord {
                    line_number,
                    address: address as u32,
                    size: count,
                    text: data_text.to_string(),
                    computed_checksum: header_sum,
                    declared_checksum: Some(declared),
                });
            }
            0x01 => {
                Self::check_inline(state, line_number, header_sum, declared);
                return LineStatus::Terminate;
            }
            0x02 | 0x04 => {
                let Some(field) = parse_u16_field(data_text) else {
                    state.push_error(line_number, "base address record needs a 16-bit field");
                    return LineStatus::Continue;
                };
                self.upper_base = if record_type == 0x02 {
                    (field as u32) << 4
                } else {
                    (field as u32) << 16
                };
                let sum = header_sum + (field >> 8) as u32 + (field & 0xFF) as u32;
                Self::check_inline(state, line_number, sum, declared);
            }
            0x03 | 0x05 => {
                let Some(bytes) = decode_hex_string(data_text).filter(|b| b.len() == 4) else {
                    state.push_error(line_number, "start address record needs a 32-bit field");
                    return LineStatus::Continue;
                };
                self.start_address = Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]));
                let sum = header_sum + bytes.iter().map(|&b| b as u32).sum::<u32>();
                Self::check_inline(state, line_number, sum, declared);
            }
            other => {
                state.push_error(line_number, format!("unknown record type {other:02X}"));
            }
        }
        LineStatus::Continue
    }

    fn read_record_data(
        &self,
        record: &DataRecord,
        dst: &mut [u8],
        offset: &mut usize,
    ) -> Result<u32, String> {
        let data_sum = decode_hex_pairs(&record.text, dst, offset)?;
        Ok(record.computed_checksum.wrapping_add(data_sum))
    }

    fn verify_checksum(&self, record: &DataRecord, computed: u32) -> Option<String> {
        let declared = record.declared_checksum?;
        if computed.wrapping_add(declared) & 0xFF == 0 {
            None
        } else {
            Some(checksum_message(record.line_number, computed, declared))
        }
    }

    fn save(&self, map: &MemoryMap, out: &mut dyn Write) -> Result<(), HexError> {
        let mut base: Option<u32> = None; // upper 16 bits already announced
        for block in map.iter_blocks() {
            let region = block.region();
            let mut addr = region.start();
            loop {
                let page = addr >> 16;
                if base != Some(page) {
                    // Suppress the initial 0000 base record; parsers assume it.
                    if page != 0 || base.is_some() {
                        Self::write_record(out, 0, 0x04, &(page as u16).to_be_bytes())?;
                    }
                    base = Some(page);
                }
                // A record never crosses a 64 KiB page, so its 16-bit
                // address field stays consistent with the announced base.
                let page_left = 0x1_0000 - (addr & 0xFFFF) as u64;
                let region_left = region.end() as u64 - addr as u64 + 1;
                let n = (self.bytes_per_line as u64).min(page_left).min(region_left) as usize;
                let lo = (addr - region.start()) as usize;
                Self::write_record(
                    out,
                    (addr & 0xFFFF) as u16,
                    0x00,
                    &block.data().as_slice()[lo..lo + n],
                )?;
                match (addr as u64 + n as u64 - 1).cmp(&(region.end() as u64)) {
                    std::cmp::Ordering::Less => addr += n as u32,
                    _ => break,
                }
            }
        }
        writeln!(out, ":00000001FF")?;
        Ok(())
    }
}

fn parse_u16_field(text: &str) -> Option<u16> {
    let bytes = decode_hex_string(text).filter(|b| b.len() == 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{load_bytes, save, FormatKind};

    fn load_str(input: &str, warn: bool) -> (MemoryMap, Vec<String>, Vec<String>) {
        let mut map = MemoryMap::new();
        let report = load_bytes(FormatKind::IntelHex, input.as_bytes(), &mut map, warn).unwrap();
        (map, report.errors, report.warnings)
    }

    #[test]
    fn small_image() {
        let input = ":10010000214601360121470136007EFE09D2190140\n:00000001FF";
        let (map, errors, warnings) = load_str(input, false);
        assert!(errors.is_empty(), "{errors:?}");
        assert!(warnings.is_empty());
        assert_eq!(map.block_count(), 1);
        assert_eq!(map.start_address(), Some(0x0100));
        assert_eq!(map.size(), 16);
        let block = map.fetch(crate::map::MemoryRegion::new(0x0100, 0x010F)).unwrap();
        assert_eq!(
            block.data().as_slice(),
            &[
                0x21, 0x46, 0x01, 0x36, 0x01, 0x21, 0x47, 0x01, 0x36, 0x00, 0x7E, 0xFE, 0x09,
                0xD2, 0x19, 0x01
            ]
        );
    }

    #[test]
    fn bad_checksum_is_error_but_data_loads() {
        let input = ":10010000214601360121470136007EFE09D2190141\n:00000001FF";
        let (map, errors, warnings) = load_str(input, false);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Line 1:"), "{}", errors[0]);
        assert!(warnings.is_empty());
        assert_eq!(map.size(), 16); // block still present
    }

    #[test]
    fn bad_checksum_demoted_to_warning() {
        let input = ":10010000214601360121470136007EFE09D2190141\n:00000001FF";
        let (map, errors, warnings) = load_str(input, true);
        assert!(errors.is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(map.size(), 16);
    }

    #[test]
    fn extended_linear_addressing() {
        let input = ":020000040800F2\n:04000000AABBCCDDEE\n:00000001FF";
        let (map, errors, _) = load_str(input, false);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(map.start_address(), Some(0x0800_0000));
        assert_eq!(map.get(0x0800_0003), 0xDD);
    }

    #[test]
    fn extended_segment_addressing() {
        // Base 0x1000 << 4 = 0x10000.
        let input = ":020000021000EC\n:0100000042BD\n:00000001FF";
        let (map, errors, _) = load_str(input, false);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(map.start_address(), Some(0x0001_0000));
        assert_eq!(map.get(0x0001_0000), 0x42);
    }

    #[test]
    fn malformed_lines_collect_errors() {
        let input = "junk\n:0102\n:10010000214601360121470136007EFE09D2190140\n:00000001FF";
        let (map, errors, _) = load_str(input, false);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("Line 1:"));
        assert!(errors[1].starts_with("Line 2:"));
        // The good line still loaded.
        assert_eq!(map.size(), 16);
    }

    #[test]
    fn contiguous_records_coalesce() {
        let input = ":0400000001020304F2\n:0400040005060708DE\n:00000001FF";
        let (map, errors, _) = load_str(input, false);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(map.block_count(), 1);
        assert_eq!(map.size(), 8);
        assert_eq!(map.get(7), 8);
    }

    #[test]
    fn save_emits_base_records_across_pages() {
        let mut map = MemoryMap::new();
        map.insert(0xFFFE, &[1, 2, 3, 4]).unwrap();
        let mut out = Vec::new();
        save(FormatKind::IntelHex, &mut map, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        // The run is split at the page boundary with a type-04 record between.
        assert!(text.contains(":02FFFE000102FE\n"), "{text}");
        assert!(text.contains(":020000040001F9\n"), "{text}");
        assert!(text.contains(":020000000304F7\n"), "{text}");
        assert!(text.ends_with(":00000001FF\n"));

        // And it loads back to the same map.
        let mut back = MemoryMap::new();
        let report =
            load_bytes(FormatKind::IntelHex, text.as_bytes(), &mut back, false).unwrap();
        assert!(report.errors.is_empty());
        assert_eq!(back, map);
    }
}
