//! File-level façade over the memory map and the codec framework.
//!
//! [`DataFile`] bundles a memory map with the format it was read from and
//! the problem lists of the last load or save. When no format is given,
//! `load` detects it from the file contents and `save` from the target
//! extension.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use tracing::debug;

use crate::error::HexError;
use crate::format::{self, detect, FormatKind};
use crate::map::MemoryMap;

/// A memory image together with its on-disk representation.
#[derive(Debug)]
pub struct DataFile {
    pub memory_map: MemoryMap,
    /// Format of the last successful load or save.
    pub format: Option<FormatKind>,
    /// `Line N: …` problems from the last load. A non-empty list means the
    /// map may be partial but is still usable.
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Demote checksum mismatches from errors to warnings.
    pub invalid_checksum_warning: bool,
}

impl Default for DataFile {
    fn default() -> Self {
        DataFile {
            memory_map: MemoryMap::new(),
            format: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            invalid_checksum_warning: false,
        }
    }
}

impl DataFile {
    pub fn new() -> Self {
        DataFile::default()
    }

    /// Load `path`, replacing the current map. Without an explicit format
    /// the contents decide.
    pub fn load_path(
        &mut self,
        path: impl AsRef<Path>,
        format: Option<FormatKind>,
    ) -> Result<(), HexError> {
        let path = path.as_ref();
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;
        let kind = format.unwrap_or_else(|| detect::from_contents(&bytes));
        debug!(path = %path.display(), format = %kind, "loading data file");
        self.load_from(kind, &bytes)
    }

    /// Load from an open reader as an explicit format.
    pub fn load_reader(
        &mut self,
        reader: &mut dyn Read,
        format: FormatKind,
    ) -> Result<(), HexError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.load_from(format, &bytes)
    }

    fn load_from(&mut self, kind: FormatKind, bytes: &[u8]) -> Result<(), HexError> {
        let mut map = MemoryMap::new();
        map.set_blank_data(self.memory_map.blank_data());
        let report = format::load_bytes(kind, bytes, &mut map, self.invalid_checksum_warning)?;
        self.memory_map = map;
        self.format = Some(kind);
        self.errors = report.errors;
        self.warnings = report.warnings;
        Ok(())
    }

    /// Save to `path`. Without an explicit format the extension decides.
    pub fn save_path(
        &mut self,
        path: impl AsRef<Path>,
        format: Option<FormatKind>,
    ) -> Result<(), HexError> {
        let path = path.as_ref();
        let kind = format.unwrap_or_else(|| FormatKind::from_extension(path));
        debug!(path = %path.display(), format = %kind, "saving data file");
        let mut file = File::create(path)?;
        self.save_writer(&mut file, kind)
    }

    /// Save to an open writer as an explicit format.
    pub fn save_writer(
        &mut self,
        writer: &mut dyn Write,
        format: FormatKind,
    ) -> Result<(), HexError> {
        format::save(format, &mut self.memory_map, writer)?;
        self.format = Some(format);
        self.errors = Vec::new();
        self.warnings = Vec::new();
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MemoryRegion;

    #[test]
    fn load_reader_with_explicit_format() {
        let mut file = DataFile::new();
        let input = ":10010000214601360121470136007EFE09D2190140\n:00000001FF";
        file.load_reader(&mut input.as_bytes(), FormatKind::IntelHex)
            .unwrap();
        assert_eq!(file.format, Some(FormatKind::IntelHex));
        assert!(file.errors.is_empty());
        assert_eq!(file.memory_map.size(), 16);
    }

    #[test]
    fn checksum_toggle_forwards() {
        let bad = ":10010000214601360121470136007EFE09D2190141\n:00000001FF";
        let mut file = DataFile::new();
        file.load_reader(&mut bad.as_bytes(), FormatKind::IntelHex)
            .unwrap();
        assert_eq!(file.errors.len(), 1);
        assert!(file.warnings.is_empty());

        let mut file = DataFile::new();
        file.invalid_checksum_warning = true;
        file.load_reader(&mut bad.as_bytes(), FormatKind::IntelHex)
            .unwrap();
        assert!(file.errors.is_empty());
        assert_eq!(file.warnings.len(), 1);
    }

    #[test]
    fn save_writer_round_trip() {
        let mut file = DataFile::new();
        file.memory_map.insert(0x8000, &[1, 2, 3]).unwrap();
        let mut out = Vec::new();
        file.save_writer(&mut out, FormatKind::TiText).unwrap();

        let mut back = DataFile::new();
        back.load_reader(&mut out.as_slice(), FormatKind::TiText)
            .unwrap();
        assert_eq!(back.memory_map, file.memory_map);
        let block = back
            .memory_map
            .fetch(MemoryRegion::new(0x8000, 0x8002))
            .unwrap();
        assert_eq!(block.data().as_slice(), &[1, 2, 3]);
    }
}
