//! Hex-file codec framework.
//!
//! Each text format is a [`HexCodec`] plug-in driven by the same loop:
//! [`load`] feeds the input to `process_line` one line at a time, the
//! plug-in enqueues a [`DataRecord`] per data line, and the drain step
//! coalesces address-contiguous records into single memory-map inserts,
//! decoding the deferred data characters and finishing each record's
//! checksum on the way. [`save`] organizes the map and hands the block list
//! to the plug-in's emitter.
//!
//! Per-line problems never abort a load: they are collected as `Line N: …`
//! strings in the [`CodecState`] so one pass reports every bad line.

pub mod actel;
pub mod carray;
pub mod detect;
pub mod elf;
pub mod intel;
pub mod memfmt;
pub mod raw;
pub mod srec;
pub mod tektronix;
pub mod titxt;

use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::error::HexError;
use crate::map::MemoryMap;

/// Queue length at which a load drains records into the map mid-stream.
const DRAIN_THRESHOLD: usize = 16 * 1024 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Format inventory
// ─────────────────────────────────────────────────────────────────────────────

/// The supported file formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatKind {
    IntelHex,
    MotorolaSrec,
    TektronixHex,
    TiText,
    ActelHex,
    ChecksumMem,
    CArray,
    Elf,
    Binary,
}

impl FormatKind {
    /// True for the line-oriented text formats.
    pub fn is_text(self) -> bool {
        !matches!(self, FormatKind::Elf | FormatKind::Binary)
    }

    /// Fresh codec instance for a text format.
    pub fn codec(self) -> Option<Box<dyn HexCodec>> {
        match self {
            FormatKind::IntelHex => Some(Box::new(intel::IntelHexCodec::new())),
            FormatKind::MotorolaSrec => Some(Box::new(srec::SrecCodec::new())),
            FormatKind::TektronixHex => Some(Box::new(tektronix::TektronixCodec::new())),
            FormatKind::TiText => Some(Box::new(titxt::TiTextCodec::new())),
            FormatKind::ActelHex => Some(Box::new(actel::ActelHexCodec::new())),
            FormatKind::ChecksumMem => Some(Box::new(memfmt::ChecksumMemCodec::new())),
            FormatKind::CArray => Some(Box::new(carray::CArrayCodec::new())),
            FormatKind::Elf | FormatKind::Binary => None,
        }
    }

    /// Format implied by a file extension; anything unrecognized is raw
    /// binary.
    pub fn from_extension(path: &Path) -> FormatKind {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "ahex" | "ahx" => FormatKind::ActelHex,
            "c" | "cpp" | "h" => FormatKind::CArray,
            "elf" => FormatKind::Elf,
            "hex" | "ihex" => FormatKind::IntelHex,
            "mem" => FormatKind::ChecksumMem,
            "mhex" | "mot" | "s19" | "s28" | "s37" | "srec" => FormatKind::MotorolaSrec,
            "tek" => FormatKind::TektronixHex,
            "txt" => FormatKind::TiText,
            _ => FormatKind::Binary,
        }
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FormatKind::IntelHex => "intel",
            FormatKind::MotorolaSrec => "srec",
            FormatKind::TektronixHex => "tek",
            FormatKind::TiText => "titxt",
            FormatKind::ActelHex => "actel",
            FormatKind::ChecksumMem => "mem",
            FormatKind::CArray => "carray",
            FormatKind::Elf => "elf",
            FormatKind::Binary => "bin",
        };
        f.write_str(name)
    }
}

impl FromStr for FormatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "intel" | "ihex" | "hex" => Ok(FormatKind::IntelHex),
            "srec" | "motorola" | "s19" | "s28" | "s37" => Ok(FormatKind::MotorolaSrec),
            "tek" | "tektronix" => Ok(FormatKind::TektronixHex),
            "titxt" | "ti" => Ok(FormatKind::TiText),
            "actel" => Ok(FormatKind::ActelHex),
            "mem" => Ok(FormatKind::ChecksumMem),
            "carray" | "c" => Ok(FormatKind::CArray),
            "elf" => Ok(FormatKind::Elf),
            "bin" | "raw" => Ok(FormatKind::Binary),
            other => Err(format!("unknown format '{other}'")),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Records and codec state
// ─────────────────────────────────────────────────────────────────────────────

/// One parsed data line, queued between `process_line` and the drain.
///
/// The data field keeps the raw hex characters: decoding them and folding
/// them into the checksum happens once, during the drain, directly into the
/// coalesced group buffer.
#[derive(Clone, Debug)]
pub struct DataRecord {
    pub line_number: usize,
    pub address: u32,
    pub size: u32,
    pub text: String,
    pub computed_checksum: u32,
    pub declared_checksum: Option<u32>,
}

/// What `process_line` tells the driver to do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineStatus {
    Continue,
    Terminate,
}

/// Shared per-load state: the record queue and the problem lists.
#[derive(Debug, Default)]
pub struct CodecState {
    pub records: Vec<DataRecord>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// When set, checksum mismatches are demoted from errors to warnings.
    pub invalid_checksum_warning: bool,
}

impl CodecState {
    pub fn new(invalid_checksum_warning: bool) -> Self {
        CodecState {
            invalid_checksum_warning,
            ..CodecState::default()
        }
    }

    pub fn push_error(&mut self, line_number: usize, msg: impl std::fmt::Display) {
        self.errors.push(
            HexError::MalformedRecord {
                line: line_number,
                msg: msg.to_string(),
            }
            .to_string(),
        );
    }

    /// Route a checksum complaint to errors or warnings per configuration.
    pub fn push_checksum_issue(&mut self, msg: String) {
        if self.invalid_checksum_warning {
            self.warnings.push(msg);
        } else {
            self.errors.push(msg);
        }
    }
}

/// Problems accumulated by one load or save.
#[derive(Debug, Default)]
pub struct CodecReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// The plug-in trait
// ─────────────────────────────────────────────────────────────────────────────

/// Capability set implemented by every text format.
pub trait HexCodec {
    /// Data bytes emitted per record line.
    fn bytes_per_line(&self) -> usize;

    fn set_bytes_per_line(&mut self, n: usize);

    /// Reset all per-file parser state.
    fn reset_state(&mut self);

    /// Parse one line: validate framing, checksum the header fields, and
    /// enqueue a [`DataRecord`] for data lines. Problems go into `state`
    /// and parsing continues.
    fn process_line(
        &mut self,
        state: &mut CodecState,
        line_number: usize,
        line: &str,
    ) -> LineStatus;

    /// Decode a record's deferred data characters into `dst` at `*offset`,
    /// advancing the offset. Returns the finalized computed checksum.
    fn read_record_data(
        &self,
        record: &DataRecord,
        dst: &mut [u8],
        offset: &mut usize,
    ) -> Result<u32, String>;

    /// Compare the finalized checksum against the declared one; `Some` is
    /// the complaint to report. Formats without checksums keep the default.
    fn verify_checksum(&self, _record: &DataRecord, _computed: u32) -> Option<String> {
        None
    }

    /// Emit the whole map in this format.
    fn save(&self, map: &MemoryMap, out: &mut dyn Write) -> Result<(), HexError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Drivers
// ─────────────────────────────────────────────────────────────────────────────

/// Load `reader` into `map` as format `kind`.
///
/// Per-line problems are reported through the returned [`CodecReport`];
/// structural failures (unreadable stream, truncated binary) abort with an
/// error. A non-empty error list still leaves the map holding everything
/// that did parse.
pub fn load(
    kind: FormatKind,
    reader: &mut dyn Read,
    map: &mut MemoryMap,
    invalid_checksum_warning: bool,
) -> Result<CodecReport, HexError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    load_bytes(kind, &bytes, map, invalid_checksum_warning)
}

/// [`load`] over an in-memory input.
pub fn load_bytes(
    kind: FormatKind,
    bytes: &[u8],
    map: &mut MemoryMap,
    invalid_checksum_warning: bool,
) -> Result<CodecReport, HexError> {
    match kind {
        FormatKind::Elf => {
            elf::load(bytes, map)?;
            Ok(CodecReport::default())
        }
        FormatKind::Binary => {
            raw::load(bytes, map)?;
            Ok(CodecReport::default())
        }
        _ => {
            let mut codec = kind.codec().expect("text formats have codecs");
            load_text(codec.as_mut(), bytes, map, invalid_checksum_warning)
        }
    }
}

fn load_text(
    codec: &mut dyn HexCodec,
    bytes: &[u8],
    map: &mut MemoryMap,
    invalid_checksum_warning: bool,
) -> Result<CodecReport, HexError> {
    let text = decode_text(bytes);
    codec.reset_state();
    let mut state = CodecState::new(invalid_checksum_warning);

    map.set_suppress_organize(true);
    let result = (|| {
        for (index, line) in text.lines().enumerate() {
            if codec.process_line(&mut state, index + 1, line) == LineStatus::Terminate {
                break;
            }
            if state.records.len() >= DRAIN_THRESHOLD {
                drain_records(codec, &mut state, map)?;
            }
        }
        drain_records(codec, &mut state, map)
    })();
    map.set_suppress_organize(false);
    result?;

    debug!(
        blocks = map.block_count(),
        errors = state.errors.len(),
        warnings = state.warnings.len(),
        "loaded text image"
    );
    Ok(CodecReport {
        errors: state.errors,
        warnings: state.warnings,
    })
}

/// The coalescer: groups address-contiguous records, decodes each group
/// into one buffer, verifies record checksums, and performs one map insert
/// per group.
fn drain_records(
    codec: &dyn HexCodec,
    state: &mut CodecState,
    map: &mut MemoryMap,
) -> Result<(), HexError> {
    let records = std::mem::take(&mut state.records);
    let mut i = 0;
    while i < records.len() {
        let mut j = i + 1;
        let mut total = records[i].size as u64;
        while j < records.len()
            && records[j].address as u64
                == records[j - 1].address as u64 + records[j - 1].size as u64
        {
            total += records[j].size as u64;
            j += 1;
        }
        let mut buf = vec![0u8; total as usize];
        let mut offset = 0usize;
        for record in &records[i..j] {
            match codec.read_record_data(record, &mut buf, &mut offset) {
                Ok(computed) => {
                    if let Some(msg) = codec.verify_checksum(record, computed) {
                        state.push_checksum_issue(msg);
                    }
                }
                Err(msg) => state.push_error(record.line_number, msg),
            }
        }
        map.insert(records[i].address, &buf)?;
        i = j;
    }
    Ok(())
}

/// Save `map` to `writer` as format `kind`.
///
/// Text output is buffered UTF-8 with no byte-order mark.
pub fn save(
    kind: FormatKind,
    map: &mut MemoryMap,
    writer: &mut dyn Write,
) -> Result<(), HexError> {
    map.organize();
    let mut out = BufWriter::new(writer);
    match kind {
        FormatKind::Elf => return Err(HexError::Unimplemented("ELF save")),
        FormatKind::Binary => raw::save(map, &mut out)?,
        _ => {
            let codec = kind.codec().expect("text formats have codecs");
            codec.save(map, &mut out)?;
        }
    }
    out.flush()?;
    debug!(blocks = map.block_count(), format = %kind, "saved image");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared text helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Decode an input buffer to text, honoring a UTF-8 or UTF-16 byte-order
/// mark; without one the bytes are taken as UTF-8.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(bytes).into_owned()
}

/// Value of one hex digit.
#[inline]
pub(crate) fn hex_val(c: u8) -> Option<u32> {
    match c {
        b'0'..=b'9' => Some((c - b'0') as u32),
        b'a'..=b'f' => Some((c - b'a' + 10) as u32),
        b'A'..=b'F' => Some((c - b'A' + 10) as u32),
        _ => None,
    }
}

pub(crate) fn is_hex_str(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| hex_val(b).is_some())
}

/// Parse an up-to-8-digit hex field.
pub(crate) fn parse_hex_u32(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > 8 || !is_hex_str(s) {
        return None;
    }
    u32::from_str_radix(s, 16).ok()
}

/// Parse a single hex byte pair.
pub(crate) fn parse_hex_byte(s: &str) -> Option<u8> {
    if s.len() != 2 {
        return None;
    }
    Some((hex_val(s.as_bytes()[0])? * 16 + hex_val(s.as_bytes()[1])?) as u8)
}

/// Decode an even-length run of hex pairs into `dst` at `*offset`,
/// advancing the offset. Returns the byte-value sum for checksum
/// finalization.
pub(crate) fn decode_hex_pairs(
    text: &str,
    dst: &mut [u8],
    offset: &mut usize,
) -> Result<u32, String> {
    let digits = text.as_bytes();
    if digits.len() % 2 != 0 {
        return Err("odd number of hex digits".to_string());
    }
    let count = digits.len() / 2;
    if *offset + count > dst.len() {
        return Err("record data overruns its group buffer".to_string());
    }
    let mut sum = 0u32;
    for k in 0..count {
        let hi = hex_val(digits[2 * k]).ok_or("invalid hex digit")?;
        let lo = hex_val(digits[2 * k + 1]).ok_or("invalid hex digit")?;
        let byte = (hi * 16 + lo) as u8;
        dst[*offset + k] = byte;
        sum = sum.wrapping_add(byte as u32);
    }
    *offset += count;
    Ok(sum)
}

/// Decode a standalone even-length hex string.
pub(crate) fn decode_hex_string(text: &str) -> Option<Vec<u8>> {
    let digits = text.as_bytes();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks_exact(2)
        .map(|pair| Some((hex_val(pair[0])? * 16 + hex_val(pair[1])?) as u8))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn extension_table() {
        let cases = [
            ("image.ahex", FormatKind::ActelHex),
            ("image.ahx", FormatKind::ActelHex),
            ("image.bin", FormatKind::Binary),
            ("image.dat", FormatKind::Binary),
            ("image.elf", FormatKind::Elf),
            ("image.c", FormatKind::CArray),
            ("image.cpp", FormatKind::CArray),
            ("image.h", FormatKind::CArray),
            ("image.hex", FormatKind::IntelHex),
            ("image.ihex", FormatKind::IntelHex),
            ("image.mem", FormatKind::ChecksumMem),
            ("image.mhex", FormatKind::MotorolaSrec),
            ("image.mot", FormatKind::MotorolaSrec),
            ("image.s19", FormatKind::MotorolaSrec),
            ("image.s28", FormatKind::MotorolaSrec),
            ("image.s37", FormatKind::MotorolaSrec),
            ("image.srec", FormatKind::MotorolaSrec),
            ("image.tek", FormatKind::TektronixHex),
            ("image.txt", FormatKind::TiText),
            ("image.xyz", FormatKind::Binary),
            ("image", FormatKind::Binary),
            ("IMAGE.HEX", FormatKind::IntelHex),
        ];
        for (name, expected) in cases {
            assert_eq!(FormatKind::from_extension(Path::new(name)), expected, "{name}");
        }
    }

    #[test]
    fn format_names_round_trip() {
        for kind in [
            FormatKind::IntelHex,
            FormatKind::MotorolaSrec,
            FormatKind::TektronixHex,
            FormatKind::TiText,
            FormatKind::ActelHex,
            FormatKind::ChecksumMem,
            FormatKind::CArray,
            FormatKind::Elf,
            FormatKind::Binary,
        ] {
            assert_eq!(kind.to_string().parse::<FormatKind>(), Ok(kind));
        }
        assert!("floppy".parse::<FormatKind>().is_err());
    }

    #[test]
    fn bom_decoding() {
        assert_eq!(decode_text(b"\xEF\xBB\xBF:00"), ":00");
        let utf16le: Vec<u8> = [0xFF, 0xFE]
            .into_iter()
            .chain(":0\n".encode_utf16().flat_map(|u| u.to_le_bytes()))
            .collect();
        assert_eq!(decode_text(&utf16le), ":0\n");
        let utf16be: Vec<u8> = [0xFE, 0xFF]
            .into_iter()
            .chain(":0".encode_utf16().flat_map(|u| u.to_be_bytes()))
            .collect();
        assert_eq!(decode_text(&utf16be), ":0");
        assert_eq!(decode_text(b"plain"), "plain");
    }

    #[test]
    fn hex_helpers() {
        assert_eq!(parse_hex_byte("FF"), Some(0xFF));
        assert_eq!(parse_hex_byte("f"), None);
        assert_eq!(parse_hex_u32("DEADBEEF"), Some(0xDEAD_BEEF));
        assert_eq!(parse_hex_u32("123456789"), None);
        assert_eq!(decode_hex_string("0aFF"), Some(vec![0x0A, 0xFF]));
        assert_eq!(decode_hex_string("0aF"), None);

        let mut buf = [0u8; 4];
        let mut off = 1usize;
        let sum = decode_hex_pairs("01FF", &mut buf, &mut off).unwrap();
        assert_eq!(sum, 0x100);
        assert_eq!(off, 3);
        assert_eq!(buf, [0, 0x01, 0xFF, 0]);
        assert!(decode_hex_pairs("0102", &mut buf, &mut off).is_err());
    }
}
