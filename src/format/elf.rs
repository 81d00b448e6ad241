//! 32-bit ELF loading.
//!
//! Reads the 52-byte header, then streams allocatable `SHT_PROGBITS`
//! sections into the map keyed by `sh_addr`, followed by `PT_LOAD` program
//! headers keyed by `p_paddr`. Both little- and big-endian images are
//! accepted; the 64-bit class is not implemented. Saving as ELF is not
//! supported.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use tracing::debug;

use crate::error::HexError;
use crate::map::MemoryMap;

const EHDR_SIZE: usize = 52;
const SHENT_SIZE: usize = 40;
const PHENT_SIZE: usize = 32;

const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ELFDATA2MSB: u8 = 2;

const SHT_PROGBITS: u32 = 1;
const SHF_ALLOC: u32 = 0x2;
const PT_LOAD: u32 = 1;

/// True when the buffer starts with the ELF magic.
pub fn probe(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes[..4] == ELF_MAGIC
}

#[derive(Clone, Copy)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn u16(self, bytes: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(bytes),
            Endian::Big => BigEndian::read_u16(bytes),
        }
    }

    fn u32(self, bytes: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(bytes),
            Endian::Big => BigEndian::read_u32(bytes),
        }
    }
}

fn field<'a>(bytes: &'a [u8], offset: usize, len: usize, what: &str) -> Result<&'a [u8], HexError> {
    bytes
        .get(offset..offset + len)
        .ok_or_else(|| HexError::UnexpectedEof(format!("truncated {what}")))
}

/// Load a 32-bit ELF image into `map`.
pub fn load(bytes: &[u8], map: &mut MemoryMap) -> Result<(), HexError> {
    if bytes.len() < 4 || bytes[..4] != ELF_MAGIC {
        return Err(HexError::UnexpectedEof("ELF magic missing".to_string()));
    }
    if bytes.len() < EHDR_SIZE {
        return Err(HexError::UnexpectedEof("truncated ELF header".to_string()));
    }
    match bytes[4] {
        ELFCLASS32 => {}
        ELFCLASS64 => return Err(HexError::Unimplemented("64-bit ELF")),
        other => {
            return Err(HexError::UnexpectedEof(format!(
                "unknown ELF class {other}"
            )))
        }
    }
    let endian = match bytes[5] {
        ELFDATA2LSB => Endian::Little,
        ELFDATA2MSB => Endian::Big,
        other => {
            return Err(HexError::UnexpectedEof(format!(
                "unknown ELF data encoding {other}"
            )))
        }
    };

    let e_phoff = endian.u32(&bytes[28..32]) as usize;
    let e_shoff = endian.u32(&bytes[32..36]) as usize;
    let e_phentsize = endian.u16(&bytes[42..44]) as usize;
    let e_phnum = endian.u16(&bytes[44..46]) as usize;
    let e_shentsize = endian.u16(&bytes[46..48]) as usize;
    let e_shnum = endian.u16(&bytes[48..50]) as usize;

    if e_shnum > 0 && e_shentsize != SHENT_SIZE {
        return Err(HexError::UnexpectedEof(format!(
            "section header entry size {e_shentsize} (expected {SHENT_SIZE})"
        )));
    }
    if e_phnum > 0 && e_phentsize != PHENT_SIZE {
        return Err(HexError::UnexpectedEof(format!(
            "program header entry size {e_phentsize} (expected {PHENT_SIZE})"
        )));
    }

    map.set_suppress_organize(true);
    let result = (|| {
        let mut sections = 0usize;
        for i in 0..e_shnum {
            let sh = field(bytes, e_shoff + i * SHENT_SIZE, SHENT_SIZE, "section header")?;
            let sh_type = endian.u32(&sh[4..8]);
            let sh_flags = endian.u32(&sh[8..12]);
            let sh_addr = endian.u32(&sh[12..16]);
            let sh_offset = endian.u32(&sh[16..20]) as usize;
            let sh_size = endian.u32(&sh[20..24]) as usize;
            if sh_type != SHT_PROGBITS || sh_flags & SHF_ALLOC == 0 || sh_size == 0 {
                continue;
            }
            let data = field(bytes, sh_offset, sh_size, "section data")?;
            map.insert(sh_addr, data)?;
            sections += 1;
        }

        let mut segments = 0usize;
        for i in 0..e_phnum {
            let ph = field(bytes, e_phoff + i * PHENT_SIZE, PHENT_SIZE, "program header")?;
            let p_type = endian.u32(&ph[0..4]);
            let p_offset = endian.u32(&ph[4..8]) as usize;
            let p_paddr = endian.u32(&ph[12..16]);
            let p_filesz = endian.u32(&ph[16..20]) as usize;
            if p_type != PT_LOAD || p_filesz == 0 {
                continue;
            }
            let data = field(bytes, p_offset, p_filesz, "segment data")?;
            map.insert(p_paddr, data)?;
            segments += 1;
        }

        debug!(sections, segments, "loaded ELF image");
        Ok(())
    })();
    map.set_suppress_organize(false);
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
