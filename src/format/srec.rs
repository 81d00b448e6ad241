//! Motorola S-records.
//!
//! S0 carries the module name, S1/S2/S3 carry data behind 16/24/32-bit
//! addresses, S5/S6 cross-check the data-record count, and S7/S8/S9
//! terminate the file with the start address. The checksum byte is the
//! one's complement of the sum of the count, address, and data bytes.

use std::io::Write;

use crate::error::HexError;
use crate::map::MemoryMap;

use super::{
    decode_hex_pairs, decode_hex_string, hex_val, CodecState, DataRecord, HexCodec, LineStatus,
};

const DEFAULT_BYTES_PER_LINE: usize = 16;

/// Address width of the emitted data records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SrecVariant {
    /// S1/S9, 16-bit addresses.
    S19,
    /// S2/S8, 24-bit addresses.
    S28,
    /// S3/S7, 32-bit addresses.
    S37,
}

impl SrecVariant {
    fn address_bytes(self) -> usize {
        match self {
            SrecVariant::S19 => 2,
            SrecVariant::S28 => 3,
            SrecVariant::S37 => 4,
        }
    }

    /// Narrowest variant whose address field reaches `end`.
    fn for_end_address(end: u32) -> SrecVariant {
        if end <= 0xFFFF {
            SrecVariant::S19
        } else if end <= 0xFF_FFFF {
            SrecVariant::S28
        } else {
            SrecVariant::S37
        }
    }
}

pub struct SrecCodec {
    bytes_per_line: usize,
    /// Save-side variant override; auto-selected from the map when unset.
    variant: Option<SrecVariant>,
    /// Vendor string from / for the S0 header record.
    module_name: String,
    /// S1/S2/S3 records seen so far, cross-checked by S5/S6.
    data_record_count: u64,
    start_address: Option<u32>,
}

impl SrecCodec {
    pub fn new() -> Self {
        SrecCodec {
            bytes_per_line: DEFAULT_BYTES_PER_LINE,
            variant: None,
            module_name: String::new(),
            data_record_count: 0,
            start_address: None,
        }
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn set_module_name(&mut self, name: impl Into<String>) {
        self.module_name = name.into();
    }

    pub fn set_variant(&mut self, variant: SrecVariant) {
        self.variant = Some(variant);
    }

    pub fn start_address(&self) -> Option<u32> {
        self.start_address
    }

    fn check_inline(state: &mut CodecState, line_number: usize, sum: u32, declared: u32) {
        if sum.wrapping_add(declared) & 0xFF != 0xFF {
            state.push_checksum_issue(checksum_message(line_number, sum, declared));
        }
    }

    fn write_record(
        out: &mut dyn Write,
        type_digit: char,
        addr: u32,
        addr_bytes: usize,
        data: &[u8],
    ) -> Result<(), HexError> {
        let count = addr_bytes + data.len() + 1;
        let mut sum = count as u32;
        write!(out, "S{type_digit}{count:02X}")?;
        for i in (0..addr_bytes).rev() {
            let byte = (addr >> (8 * i)) & 0xFF;
            sum += byte;
            write!(out, "{byte:02X}")?;
        }
        for &byte in data {
            sum += byte as u32;
            write!(out, "{byte:02X}")?;
        }
        writeln!(out, "{:02X}", 0xFF - (sum & 0xFF))?;
        Ok(())
    }
}

impl Default for SrecCodec {
    fn default() -> Self {
        SrecCodec::new()
    }
}

fn checksum_message(line_number: usize, sum: u32, declared: u32) -> String {
    let expected = 0xFF - (sum & 0xFF);
    format!("Line {line_number}: invalid checksum (expected {expected:02X}, found {declared:02X})")
}

impl HexCodec for SrecCodec {
    fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }

    fn set_bytes_per_line(&mut self, n: usize) {
        self.bytes_per_line = n.clamp(1, 250);
    }

    fn reset_state(&mut self) {
        self.module_name.clear();
        self.data_record_count = 0;
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
        let Some(body) = line.strip_prefix('S').or_else(|| line.strip_prefix('s')) else {
            state.push_error(line_number, "record does not start with 'S'");
            return LineStatus::Continue;
        };
        let Some(type_digit) = body.chars().next().and_then(|c| c.to_digit(10)) else {
            state.push_error(line_number, "missing record type digit");
            return LineStatus::Continue;
        };
        let body = &body[1..];
        if body.len() < 6 || body.len() % 2 != 0 || !body.bytes().all(|b| hex_val(b).is_some()) {
            state.push_error(line_number, "malformed record framing");
            return LineStatus::Continue;
        }
        let count = u32::from_str_radix(&body[0..2], 16).unwrap_or(0) as usize;
        if body.len() != 2 + 2 * count {
            state.push_error(
                line_number,
                format!("length field {count} does not match record size"),
            );
            return LineStatus::Continue;
        }
        let declared = u32::from_str_radix(&body[body.len() - 2..], 16).unwrap_or(0);

        let addr_bytes = match type_digit {
            0 | 1 | 5 | 9 => 2,
            2 | 6 | 8 => 3,
            3 | 7 => 4,
            other => {
                state.push_error(line_number, format!("unknown record type S{other}"));
                return LineStatus::Continue;
            }
        };
        if count < addr_bytes + 1 {
            state.push_error(line_number, "record shorter than its address field");
            return LineStatus::Continue;
        }
        let addr_text = &body[2..2 + 2 * addr_bytes];
        let address = u32::from_str_radix(addr_text, 16).unwrap_or(0);
        let data_text = &body[2 + 2 * addr_bytes..body.len() - 2];
        let addr_sum: u32 = decode_hex_string(addr_text)
            .map(|b| b.iter().map(|&x| x as u32).sum())
            .unwrap_or(0);
        let header_sum = count as u32 + addr_sum;

        match type_digit {
            0 => {
                let Some(bytes) = decode_hex_string(data_text) else {
                    state.push_error(line_number, "invalid header data");
                    return LineStatus::Continue;
                };
                let sum = header_sum + bytes.iter().map(|&b| b as u32).sum::<u32>();
                Self::check_inline(state, line_number, sum, declared);
                self.module_name = String::from_utf8_lossy(&bytes).into_owned();
            }
            1 | 2 | 3 => {
                self.data_record_count += 1;
                let size = (count - addr_bytes - 1) as u32;
                if size == 0 {
                    Self::check_inline(state, line_number, header_sum, declared);
                    return LineStatus::Continue;
                }
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
            5 | 6 => {
                Self::check_inline(state, line_number, header_sum, declared);
                if address as u64 != self.data_record_count {
                    state.push_error(
                        line_number,
                        format!(
                            "record count mismatch (counted {}, declared {address})",
                            self.data_record_count
                        ),
                    );
                }
            }
            7 | 8 | 9 => {
                Self::check_inline(state, line_number, header_sum, declared);
                self.start_address = Some(address);
                return LineStatus::Terminate;
            }
            _ => unreachable!("filtered above"),
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
        if computed.wrapping_add(declared) & 0xFF == 0xFF {
            None
        } else {
            Some(checksum_message(record.line_number, computed, declared))
        }
    }

    fn save(&self, map: &MemoryMap, out: &mut dyn Write) -> Result<(), HexError> {
        let variant = self.variant.unwrap_or_else(|| {
            SrecVariant::for_end_address(map.end_address().unwrap_or(0))
        });
        let addr_bytes = variant.address_bytes();
        let (data_digit, term_digit) = match variant {
            SrecVariant::S19 => ('1', '9'),
            SrecVariant::S28 => ('2', '8'),
            SrecVariant::S37 => ('3', '7'),
        };

        let name = if self.module_name.is_empty() {
            "hexmap"
        } else {
            &self.module_name
        };
        Self::write_record(out, '0', 0, 2, name.as_bytes())?;

        let mut record_count = 0u64;
        for block in map.iter_blocks() {
            let data = block.data().as_slice();
            let start = block.region().start();
            for (i, chunk) in data.chunks(self.bytes_per_line).enumerate() {
                let addr = start + (i * self.bytes_per_line) as u32;
                Self::write_record(out, data_digit, addr, addr_bytes, chunk)?;
                record_count += 1;
            }
        }

        if record_count <= 0xFFFF {
            Self::write_record(out, '5', record_count as u32, 2, &[])?;
        } else if record_count <= 0xFF_FFFF {
            Self::write_record(out, '6', record_count as u32, 3, &[])?;
        }
        Self::write_record(out, term_digit, self.start_address.unwrap_or(0), addr_bytes, &[])?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
