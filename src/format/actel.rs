//! Actel hex (`AAAAAA:DD…`).
//!
//! Each line pairs an address with a run of data bytes, separated by a
//! colon. The first data line fixes the data width for the file; later
//! lines may be shorter (the final partial word) but never wider. The
//! format has no checksums.

use std::io::Write;

use crate::error::HexError;
use crate::map::MemoryMap;

use super::{
    decode_hex_pairs, is_hex_str, parse_hex_u32, CodecState, DataRecord, HexCodec, LineStatus,
};

const DEFAULT_BYTES_PER_LINE: usize = 4;

pub struct ActelHexCodec {
    bytes_per_line: usize,
    /// Data width in bytes, fixed by the first data line of a load.
    data_width: Option<usize>,
}

impl ActelHexCodec {
    pub fn new() -> Self {
        ActelHexCodec {
            bytes_per_line: DEFAULT_BYTES_PER_LINE,
            data_width: None,
        }
    }
}

impl Default for ActelHexCodec {
    fn default() -> Self {
        ActelHexCodec::new()
    }
}

impl HexCodec for ActelHexCodec {
    fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }

    fn set_bytes_per_line(&mut self, n: usize) {
        self.bytes_per_line = n.clamp(1, 255);
    }

    fn reset_state(&mut self) {
        self.data_width = None;
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
        let Some((addr_text, data_text)) = line.split_once(':') else {
            state.push_error(line_number, "record has no ':' separator");
            return LineStatus::Continue;
        };
        let Some(address) = parse_hex_u32(addr_text.trim()) else {
            state.push_error(line_number, "invalid address field");
            return LineStatus::Continue;
        };
        let data_text = data_text.trim();
        if !is_hex_str(data_text) || data_text.len() % 2 != 0 {
            state.push_error(line_number, "data field must be whole hex byte pairs");
            return LineStatus::Continue;
        }
        let size = data_text.len() / 2;
        match self.data_width {
            None => self.data_width = Some(size),
            Some(width) if size > width => {
                state.push_error(
                    line_number,
                    format!("data wider than the first record ({size} > {width} bytes)"),
                );
                return LineStatus::Continue;
            }
            Some(_) => {}
        }
        if address as u64 + size as u64 - 1 > u32::MAX as u64 {
            state.push_error(line_number, "data record reaches past the 32-bit space");
            return LineStatus::Continue;
        }
        state.records.push(DataRecord {
            line_number,
            address,
            size: size as u32,
            text: data_text.to_string(),
            computed_checksum: 0,
            declared_checksum: None,
        });
        LineStatus::Continue
    }

    fn read_record_data(
        &self,
        record: &DataRecord,
        dst: &mut [u8],
        offset: &mut usize,
    ) -> Result<u32, String> {
        decode_hex_pairs(&record.text, dst, offset)?;
        Ok(0)
    }

    fn save(&self, map: &MemoryMap, out: &mut dyn Write) -> Result<(), HexError> {
        for block in map.iter_blocks() {
            let data = block.data().as_slice();
            let start = block.region().start();
            for (i, chunk) in data.chunks(self.bytes_per_line).enumerate() {
                let addr = start + (i * self.bytes_per_line) as u32;
                write!(out, "{addr:06X}:")?;
                for byte in chunk {
                    write!(out, "{byte:02X}")?;
                }
                writeln!(out)?;
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
