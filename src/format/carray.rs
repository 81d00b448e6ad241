//! C source emitter.
//!
//! Writes each block as a `const uintN_t` array plus a table of the block
//! regions, ready to compile into a flashing tool. Element width and
//! endianness are configurable; a trailing partial element is padded with
//! the map's blank byte. Loading C source back is not supported.

use std::io::Write;

use crate::error::HexError;
use crate::map::MemoryMap;

use super::{CodecState, DataRecord, HexCodec, LineStatus};

const DEFAULT_BYTES_PER_LINE: usize = 16;

/// Width of one emitted array element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementWidth {
    U8,
    U16,
    U32,
    U64,
}

impl ElementWidth {
    fn bytes(self) -> usize {
        match self {
            ElementWidth::U8 => 1,
            ElementWidth::U16 => 2,
            ElementWidth::U32 => 4,
            ElementWidth::U64 => 8,
        }
    }

    fn type_name(self) -> &'static str {
        match self {
            ElementWidth::U8 => "uint8_t",
            ElementWidth::U16 => "uint16_t",
            ElementWidth::U32 => "uint32_t",
            ElementWidth::U64 => "uint64_t",
        }
    }
}

pub struct CArrayCodec {
    bytes_per_line: usize,
    element_width: ElementWidth,
    little_endian: bool,
    /// Identifier prefix for the emitted arrays.
    symbol_name: String,
}

impl CArrayCodec {
    pub fn new() -> Self {
        CArrayCodec {
            bytes_per_line: DEFAULT_BYTES_PER_LINE,
            element_width: ElementWidth::U8,
            little_endian: true,
            symbol_name: "image".to_string(),
        }
    }

    pub fn set_element_width(&mut self, width: ElementWidth) {
        self.element_width = width;
    }

    pub fn set_little_endian(&mut self, little_endian: bool) {
        self.little_endian = little_endian;
    }

    pub fn set_symbol_name(&mut self, name: impl Into<String>) {
        self.symbol_name = name.into();
    }

    /// Combine up to `width` bytes into one element value, padding a short
    /// final chunk with `blank`.
    fn element_value(&self, chunk: &[u8], blank: u8) -> u64 {
        let width = self.element_width.bytes();
        let mut value = 0u64;
        for i in 0..width {
            let byte = chunk.get(i).copied().unwrap_or(blank);
            let shift = if self.little_endian { i } else { width - 1 - i };
            value |= (byte as u64) << (8 * shift);
        }
        value
    }
}

impl Default for CArrayCodec {
    fn default() -> Self {
        CArrayCodec::new()
    }
}

impl HexCodec for CArrayCodec {
    fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }

    fn set_bytes_per_line(&mut self, n: usize) {
        self.bytes_per_line = n.max(1);
    }

    fn reset_state(&mut self) {}

    fn process_line(
        &mut self,
        state: &mut CodecState,
        line_number: usize,
        _line: &str,
    ) -> LineStatus {
        state.push_error(line_number, "loading C array source is not implemented");
        LineStatus::Terminate
    }

    fn read_record_data(
        &self,
        _record: &DataRecord,
        _dst: &mut [u8],
        _offset: &mut usize,
    ) -> Result<u32, String> {
        Err("loading C array source is not implemented".to_string())
    }

    fn save(&self, map: &MemoryMap, out: &mut dyn Write) -> Result<(), HexError> {
        let width = self.element_width.bytes();
        let per_line = (self.bytes_per_line / width).max(1);
        let name = &self.symbol_name;

        writeln!(out, "#include <stdint.h>")?;
        for block in map.iter_blocks() {
            let region = block.region();
            let data = block.data().as_slice();
            let elements = data.len().div_ceil(width);
            writeln!(out)?;
            writeln!(
                out,
                "const {} {name}_{:08x}[{elements}] = {{",
                self.element_width.type_name(),
                region.start()
            )?;
            for chunks in data.chunks(width * per_line) {
                write!(out, "   ")?;
                for chunk in chunks.chunks(width) {
                    write!(
                        out,
                        " 0x{:0digits$X},",
                        self.element_value(chunk, map.blank_data()),
                        digits = 2 * width
                    )?;
                }
                writeln!(out)?;
            }
            writeln!(out, "}};")?;
        }

        writeln!(out)?;
        writeln!(out, "const struct {{")?;
        writeln!(out, "    uint32_t start;")?;
        writeln!(out, "    uint32_t size;")?;
        writeln!(out, "}} {name}_regions[{}] = {{", map.block_count())?;
        for block in map.iter_blocks() {
            let region = block.region();
            writeln!(
                out,
                "    {{ 0x{:08X}UL, {}UL }},",
                region.start(),
                region.size()
            )?;
        }
        writeln!(out, "}};")?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
