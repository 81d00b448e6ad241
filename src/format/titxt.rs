//! TI-Text (MSP430 `@ADDR` / data / `q`).
//!
//! `@AAAA` lines set the current address, data lines carry up to sixteen
//! space-separated byte pairs, and a lone `q` terminates the file. The
//! format has no checksums.

use std::io::Write;

use crate::error::HexError;
use crate::map::MemoryMap;

use super::{parse_hex_byte, parse_hex_u32, CodecState, DataRecord, HexCodec, LineStatus};

const DEFAULT_BYTES_PER_LINE: usize = 16;

/// Format rule: a data line never carries more than sixteen bytes.
const MAX_BYTES_PER_LINE: usize = 16;

pub struct TiTextCodec {
    bytes_per_line: usize,
    /// Address of the next data byte; `None` until the first `@` record.
    current_address: Option<u32>,
}

impl TiTextCodec {
    pub fn new() -> Self {
        TiTextCodec {
            bytes_per_line: DEFAULT_BYTES_PER_LINE,
            current_address: None,
        }
    }
}

impl Default for TiTextCodec {
    fn default() -> Self {
        TiTextCodec::new()
    }
}

impl HexCodec for TiTextCodec {
    fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }

    fn set_bytes_per_line(&mut self, n: usize) {
        self.bytes_per_line = n.clamp(1, MAX_BYTES_PER_LINE);
    }

    fn reset_state(&mut self) {
        self.current_address = None;
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
        if line.eq_ignore_ascii_case("q") {
            return LineStatus::Terminate;
        }
        if let Some(addr_text) = line.strip_prefix('@') {
            match parse_hex_u32(addr_text.trim()) {
                Some(addr) => self.current_address = Some(addr),
                None => state.push_error(line_number, "invalid address record"),
            }
            return LineStatus::Continue;
        }

        let Some(address) = self.current_address else {
            state.push_error(line_number, "data before any '@' address record");
            return LineStatus::Continue;
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() > MAX_BYTES_PER_LINE {
            state.push_error(
                line_number,
                format!("{} bytes on one line (at most {MAX_BYTES_PER_LINE})", tokens.len()),
            );
            return LineStatus::Continue;
        }
        if tokens.iter().any(|t| parse_hex_byte(t).is_none()) {
            state.push_error(line_number, "data line must be two-digit hex bytes");
            return LineStatus::Continue;
        }
        let size = tokens.len() as u32;
        if address as u64 + size as u64 - 1 > u32::MAX as u64 {
            state.push_error(line_number, "data line reaches past the 32-bit space");
            return LineStatus::Continue;
        }
        state.records.push(DataRecord {
            line_number,
            address,
            size,
            text: line.to_string(),
            computed_checksum: 0,
            declared_checksum: None,
        });
        self.current_address = Some(address.wrapping_add(size));
        LineStatus::Continue
    }

    fn read_record_data(
        &self,
        record: &DataRecord,
        dst: &mut [u8],
        offset: &mut usize,
    ) -> Result<u32, String> {
        let count = record.size as usize;
        if *offset + count > dst.len() {
            return Err("record data overruns its group buffer".to_string());
        }
        for (k, token) in record.text.split_whitespace().enumerate() {
            dst[*offset + k] = parse_hex_byte(token).ok_or("invalid hex byte")?;
        }
        *offset += count;
        Ok(0)
    }

    fn save(&self, map: &MemoryMap, out: &mut dyn Write) -> Result<(), HexError> {
        for block in map.iter_blocks() {
            writeln!(out, "@{:04X}", block.region().start())?;
            for chunk in block.data().as_slice().chunks(self.bytes_per_line) {
                let row: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
                writeln!(out, "{}", row.join(" "))?;
            }
        }
        writeln!(out, "q")?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{load_bytes, save, FormatKind};

    fn load_str(input: &str) -> (MemoryMap, Vec<String>) {
        let mut map = MemoryMap::new();
        let report = load_bytes(FormatKind::TiText, input.as_bytes(), &mut map, false).unwrap();
        (map, report.errors)
    }

    #[test]
    fn golden_emit() {
        let mut map = MemoryMap::new();
        map.insert(0x8000, &(0u8..=0x0F).collect::<Vec<_>>()).unwrap();
        let mut out = Vec::new();
        save(FormatKind::TiText, &mut map, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "@8000\n00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F\nq\n"
        );
    }

    #[test]
    fn load_tracks_running_address() {
        let input = "@8000\n00 01 02\n03 04\n@9000\nAA\nq\n";
        let (map, errors) = load_str(input);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(map.block_count(), 2);
        assert_eq!(map.get(0x8004), 0x04);
        assert_eq!(map.get(0x9000), 0xAA);
    }

    #[test]
    fn data_without_address_is_error() {
        let (map, errors) = load_str("00 01\nq\n");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Line 1:"), "{}", errors[0]);
        assert_eq!(map.size(), 0);
    }

    #[test]
    fn wide_line_is_error() {
        let row: Vec<String> = (0..17).map(|i| format!("{i:02X}")).collect();
        let input = format!("@0000\n{}\nq\n", row.join(" "));
        let (_, errors) = load_str(&input);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("at most 16"), "{}", errors[0]);
    }

    #[test]
    fn round_trip() {
        let mut map = MemoryMap::new();
        map.insert(0x8000, &(0u8..50).collect::<Vec<_>>()).unwrap();
        map.insert(0xFFE0, &[1, 2]).unwrap();
        let mut out = Vec::new();
        save(FormatKind::TiText, &mut map, &mut out).unwrap();
        let (back, errors) = load_str(std::str::from_utf8(&out).unwrap());
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(back, map);
    }
}
