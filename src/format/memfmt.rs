//! CheckSum MEM listings.
//!
//! A `Memory Type : …` header line followed by rows of
//! `0xAAAAAAAA    0xDDDD` pairs. The word width is fixed by the first data
//! row. The format has no checksums.

use std::io::Write;

use crate::error::HexError;
use crate::map::MemoryMap;

use super::{
    decode_hex_pairs, is_hex_str, parse_hex_u32, CodecState, DataRecord, HexCodec, LineStatus,
};

const DEFAULT_BYTES_PER_LINE: usize = 2;

const HEADER_PREFIX: &str = "memory type";

pub struct ChecksumMemCodec {
    bytes_per_line: usize,
    memory_type: String,
    data_width: Option<usize>,
}

impl ChecksumMemCodec {
    pub fn new() -> Self {
        ChecksumMemCodec {
            bytes_per_line: DEFAULT_BYTES_PER_LINE,
            memory_type: String::new(),
            data_width: None,
        }
    }

    pub fn memory_type(&self) -> &str {
        &self.memory_type
    }

    pub fn set_memory_type(&mut self, value: impl Into<String>) {
        self.memory_type = value.into();
    }
}

impl Default for ChecksumMemCodec {
    fn default() -> Self {
        ChecksumMemCodec::new()
    }
}

fn strip_0x(token: &str) -> Option<&str> {
    token.strip_prefix("0x").or_else(|| token.strip_prefix("0X"))
}

impl HexCodec for ChecksumMemCodec {
    fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }

    fn set_bytes_per_line(&mut self, n: usize) {
        self.bytes_per_line = n.clamp(1, 255);
    }

    fn reset_state(&mut self) {
        self.memory_type.clear();
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
        if line.len() >= HEADER_PREFIX.len()
            && line[..HEADER_PREFIX.len()].eq_ignore_ascii_case(HEADER_PREFIX)
        {
            self.memory_type = line[HEADER_PREFIX.len()..]
                .trim_start_matches([' ', '\t', ':'])
                .to_string();
            return LineStatus::Continue;
        }

        let mut tokens = line.split_whitespace();
        let (Some(addr_token), Some(data_token), None) =
            (tokens.next(), tokens.next(), tokens.next())
        else {
            state.push_error(line_number, "row must be an address and a data word");
            return LineStatus::Continue;
        };
        let Some(address) = strip_0x(addr_token).and_then(parse_hex_u32) else {
            state.push_error(line_number, "invalid address field");
            return LineStatus::Continue;
        };
        let Some(data_text) = strip_0x(data_token).filter(|t| is_hex_str(t) && t.len() % 2 == 0)
        else {
            state.push_error(line_number, "data field must be whole hex byte pairs");
            return LineStatus::Continue;
        };
        let size = data_text.len() / 2;
        match self.data_width {
            None => self.data_width = Some(size),
            Some(width) if size > width => {
                state.push_error(
                    line_number,
                    format!("data wider than the first row ({size} > {width} bytes)"),
                );
                return LineStatus::Continue;
            }
            Some(_) => {}
        }
        if address as u64 + size as u64 - 1 > u32::MAX as u64 {
            state.push_error(line_number, "row reaches past the 32-bit space");
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
        let memory_type = if self.memory_type.is_empty() {
            "Unspecified"
        } else {
            &self.memory_type
        };
        writeln!(out, "Memory Type : {memory_type}")?;
        writeln!(out)?;
        for block in map.iter_blocks() {
            let data = block.data().as_slice();
            let start = block.region().start();
            for (i, chunk) in data.chunks(self.bytes_per_line).enumerate() {
                let addr = start + (i * self.bytes_per_line) as u32;
                write!(out, "0x{addr:08X}    0x")?;
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
