//! Extended Tektronix hex (`%LLTCC…`).
//!
//! Each record is `%`, a two-digit character count, a one-digit block type
//! (6 data, 8 termination), a two-digit checksum, and a variable-length
//! address field whose first digit gives the number of address nibbles
//! (up to 8), followed by the data pairs. The character count covers every
//! character after the `%`; the checksum is the sum of the hex values of
//! every digit except the `%` and the checksum digits themselves.

use std::io::Write;

use crate::error::HexError;
use crate::map::MemoryMap;

use super::{hex_val, CodecState, DataRecord, HexCodec, LineStatus};

const DEFAULT_BYTES_PER_LINE: usize = 16;

const TYPE_DATA: u32 = 6;
const TYPE_TERMINATION: u32 = 8;

pub struct TektronixCodec {
    bytes_per_line: usize,
    start_address: Option<u32>,
}

impl TektronixCodec {
    pub fn new() -> Self {
        TektronixCodec {
            bytes_per_line: DEFAULT_BYTES_PER_LINE,
            start_address: None,
        }
    }

    pub fn start_address(&self) -> Option<u32> {
        self.start_address
    }

    /// Sum of the hex values of every digit in `digits`.
    fn nibble_sum(digits: &str) -> u32 {
        digits.bytes().filter_map(hex_val).sum()
    }

    fn write_record(
        out: &mut dyn Write,
        block_type: u32,
        addr_digits: &str,
        data: &[u8],
    ) -> Result<(), HexError> {
        let mut tail = format!("{:01X}{addr_digits}", addr_digits.len());
        for &byte in data {
            tail.push_str(&format!("{byte:02X}"));
        }
        // Character count covers everything after '%': the count digits,
        // type digit, checksum digits, and the tail.
        let length = 2 + 1 + 2 + tail.len();
        let head = format!("{length:02X}{block_type:01X}");
        let checksum = (Self::nibble_sum(&head) + Self::nibble_sum(&tail)) & 0xFF;
        writeln!(out, "%{head}{checksum:02X}{tail}")?;
        Ok(())
    }
}

impl Default for TektronixCodec {
    fn default() -> Self {
        TektronixCodec::new()
    }
}

fn checksum_message(line_number: usize, sum: u32, declared: u32) -> String {
    format!(
        "Line {line_number}: invalid checksum (expected {:02X}, found {declared:02X})",
        sum & 0xFF
    )
}

impl HexCodec for TektronixCodec {
    fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }

    fn set_bytes_per_line(&mut self, n: usize) {
        self.bytes_per_line = n.clamp(1, 120);
    }

    fn reset_state(&mut self) {
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
        let Some(body) = line.strip_prefix('%') else {
            state.push_error(line_number, "record does not start with '%'");
            return LineStatus::Continue;
        };
        if body.len() < 7 || !body.bytes().all(|b| hex_val(b).is_some()) {
            state.push_error(line_number, "malformed record framing");
            return LineStatus::Continue;
        }
        let length = u32::from_str_radix(&body[0..2], 16).unwrap_or(0) as usize;
        if length != body.len() {
            state.push_error(
                line_number,
                format!("character count {length} does not match record size {}", body.len()),
            );
            return LineStatus::Continue;
        }
        let block_type = hex_val(body.as_bytes()[2]).unwrap_or(0);
        let declared = u32::from_str_radix(&body[3..5], 16).unwrap_or(0);
        let addr_nibbles = hex_val(body.as_bytes()[5]).unwrap_or(0) as usize;
        if addr_nibbles == 0 || addr_nibbles > 8 || body.len() < 6 + addr_nibbles {
            state.push_error(line_number, "invalid address nibble count");
            return LineStatus::Continue;
        }
        let addr_text = &body[6..6 + addr_nibbles];
        let address = u32::from_str_radix(addr_text, 16).unwrap_or(0);
        let data_text = &body[6 + addr_nibbles..];
        // Everything except '%' and the checksum digits contributes.
        let header_sum =
            Self::nibble_sum(&body[0..3]) + Self::nibble_sum(&body[5..6 + addr_nibbles]);

        match block_type {
            TYPE_DATA => {
                if data_text.is_empty() || data_text.len() % 2 != 0 {
                    state.push_error(line_number, "data field must be whole byte pairs");
                    return LineStatus::Continue;
                }
                let size = (data_text.len() / 2) as u32;
                if address as u64 + size as u64 - 1 > u32::MAX as u64 {
                    state.push_error(line_number, "data record reaches past the 32-bit space");
                    return LineStatus::Continue;
                }
                state.records.push(DataRecord {
                    line_number,
                    address,
                    size,
                    text: data_text.to_string(),
                    computed_checksum: header_sum,
                    declared_checksum: Some(declared),
                });
            }
            TYPE_TERMINATION => {
                if header_sum & 0xFF != declared {
                    state.push_checksum_issue(checksum_message(line_number, header_sum, declared));
                }
                self.start_address = Some(address);
                return LineStatus::Terminate;
            }
            other => {
                state.push_error(line_number, format!("unknown block type {other:X}"));
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
        let count = record.size as usize;
        if *offset + count > dst.len() {
            return Err("record data overruns its group buffer".to_string());
        }
        let digits = record.text.as_bytes();
        let mut sum = record.computed_checksum;
        for k in 0..count {
            let hi = hex_val(digits[2 * k]).ok_or("invalid hex digit")?;
            let lo = hex_val(digits[2 * k + 1]).ok_or("invalid hex digit")?;
            dst[*offset + k] = (hi * 16 + lo) as u8;
            // The running checksum is nibble-based, not byte-based.
            sum += hi + lo;
        }
        *offset += count;
        Ok(sum)
    }

    fn verify_checksum(&self, record: &DataRecord, computed: u32) -> Option<String> {
        let declared = record.declared_checksum?;
        if computed & 0xFF == declared {
            None
        } else {
            Some(checksum_message(record.line_number, computed, declared))
        }
    }

    fn save(&self, map: &MemoryMap, out: &mut dyn Write) -> Result<(), HexError> {
        for block in map.iter_blocks() {
            let data = block.data().as_slice();
            let start = block.region().start();
            for (i, chunk) in data.chunks(self.bytes_per_line).enumerate() {
                let addr = start + (i * self.bytes_per_line) as u32;
                Self::write_record(out, TYPE_DATA, &format!("{addr:08X}"), chunk)?;
            }
        }
        Self::write_record(out, TYPE_TERMINATION, "00000000", &[])?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
