//! Argument surface for the `hexconv` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::format::FormatKind;
use crate::map::MemoryRegion;

/// Convert firmware images between hex-file formats.
#[derive(Debug, Parser)]
#[command(name = "hexconv", version, about)]
pub struct Args {
    /// Input file.
    pub input: PathBuf,

    /// Output file; without one, a block summary is printed instead.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Input format (detected from the contents when omitted).
    #[arg(long, value_name = "FORMAT")]
    pub from: Option<FormatKind>,

    /// Output format (detected from the output extension when omitted).
    #[arg(long, value_name = "FORMAT")]
    pub to: Option<FormatKind>,

    /// Byte value reported for unimplemented addresses.
    #[arg(long, value_parser = parse_byte, default_value = "FF")]
    pub fill: u8,

    /// Keep only this address range (hex, inclusive), e.g. 8000..FFFF.
    #[arg(long, value_parser = parse_region, value_name = "START..END")]
    pub crop: Option<MemoryRegion>,

    /// Shift every block by this many addresses before writing.
    #[arg(long, value_parser = parse_u32_arg, value_name = "DELTA")]
    pub offset: Option<u32>,

    /// Shift down instead of up.
    #[arg(long, requires = "offset")]
    pub down: bool,

    /// Data bytes per emitted record line.
    #[arg(long, value_name = "N")]
    pub bytes_per_line: Option<usize>,

    /// Report checksum mismatches as warnings instead of errors.
    #[arg(long)]
    pub checksum_warn: bool,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print nothing but errors.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    u8::from_str_radix(s, 16).map_err(|_| format!("'{s}' is not a hex byte"))
}

fn parse_u32_arg(s: &str) -> Result<u32, String> {
    let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(rest) => (rest, 16),
        None => (s, 10),
    };
    u32::from_str_radix(digits, radix).map_err(|_| format!("'{s}' is not a 32-bit value"))
}

fn parse_region(s: &str) -> Result<MemoryRegion, String> {
    let (lo, hi) = s
        .split_once("..")
        .ok_or_else(|| format!("'{s}' is not START..END"))?;
    let start =
        u32::from_str_radix(lo.trim(), 16).map_err(|_| format!("'{lo}' is not a hex address"))?;
    let end =
        u32::from_str_radix(hi.trim(), 16).map_err(|_| format!("'{hi}' is not a hex address"))?;
    Ok(MemoryRegion::new(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typical_invocation() {
        let args = Args::parse_from([
            "hexconv",
            "firmware.hex",
            "-o",
            "firmware.s19",
            "--from",
            "intel",
            "--crop",
            "8000..FFFF",
            "--fill",
            "00",
            "-vv",
        ]);
        assert_eq!(args.from, Some(FormatKind::IntelHex));
        assert_eq!(args.crop, Some(MemoryRegion::new(0x8000, 0xFFFF)));
        assert_eq!(args.fill, 0x00);
        assert_eq!(args.verbose, 2);
        assert!(args.to.is_none());
    }

    #[test]
    fn value_parsers() {
        assert_eq!(parse_byte("0xAB"), Ok(0xAB));
        assert!(parse_byte("zz").is_err());
        assert_eq!(parse_u32_arg("0x100"), Ok(256));
        assert_eq!(parse_u32_arg("256"), Ok(256));
        assert_eq!(parse_region("0..FFFF"), Ok(MemoryRegion::new(0, 0xFFFF)));
        assert!(parse_region("10").is_err());
    }
}
