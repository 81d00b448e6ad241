//! Raw binary images.
//!
//! Loading places the whole file at address zero. Saving writes the span
//! from the lowest to the highest implemented address with gaps filled by
//! the map's blank byte; an empty map writes nothing.

use std::io::Write;

use crate::error::HexError;
use crate::map::{MemoryMap, MemoryRegion};

pub fn load(bytes: &[u8], map: &mut MemoryMap) -> Result<(), HexError> {
    if bytes.is_empty() {
        return Ok(());
    }
    map.insert(0, bytes)
}

pub fn save(map: &MemoryMap, out: &mut dyn Write) -> Result<(), HexError> {
    let (Some(start), Some(end)) = (map.start_address(), map.end_address()) else {
        return Ok(());
    };
    let block = map.fetch(MemoryRegion::new(start, end))?;
    out.write_all(block.data().as_slice())?;
    Ok(())
}
