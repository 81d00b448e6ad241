//! Format detection.
//!
//! Content detection peeks at the first five non-blank lines. If the peek
//! looks like text (no control characters beyond tab), each text plug-in
//! gets to parse the peeked lines and the first one that accepts them all
//! wins. Otherwise the binary plug-ins probe the raw bytes, with raw
//! binary as the fallback.

use super::{decode_text, elf, CodecState, FormatKind, LineStatus};

/// Probe order for the text plug-ins. The permissive formats come last so
/// the strict record formats get the first chance.
const TEXT_PROBE_ORDER: [FormatKind; 6] = [
    FormatKind::IntelHex,
    FormatKind::MotorolaSrec,
    FormatKind::TektronixHex,
    FormatKind::TiText,
    FormatKind::ActelHex,
    FormatKind::ChecksumMem,
];

const PEEK_LINES: usize = 5;

/// Guess the format of `bytes` from their content.
pub fn from_contents(bytes: &[u8]) -> FormatKind {
    let text = decode_text(bytes);
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(PEEK_LINES)
        .collect();
    let looks_textual = !lines.is_empty()
        && lines
            .iter()
            .all(|line| line.chars().all(|c| c == '\t' || !c.is_control()));

    if looks_textual {
        for kind in TEXT_PROBE_ORDER {
            if accepts(kind, &lines) {
                return kind;
            }
        }
    }
    if elf::probe(bytes) {
        FormatKind::Elf
    } else {
        FormatKind::Binary
    }
}

fn accepts(kind: FormatKind, lines: &[&str]) -> bool {
    let mut codec = kind.codec().expect("probe order holds text formats");
    codec.reset_state();
    let mut state = CodecState::new(false);
    for (index, line) in lines.iter().enumerate() {
        if codec.process_line(&mut state, index + 1, line) == LineStatus::Terminate {
            break;
        }
    }
    state.errors.is_empty()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_record_formats() {
        assert_eq!(
            from_contents(b":10010000214601360121470136007EFE09D2190140\n:00000001FF"),
            FormatKind::IntelHex
        );
        assert_eq!(
            from_contents(b"S00F000068656C6C6F202020202000003C\nS9030000FC"),
            FormatKind::MotorolaSrec
        );
        assert_eq!(from_contents(b"@8000\n00 01 02\nq\n"), FormatKind::TiText);
        assert_eq!(from_contents(b"000000:DEADBEEF\n"), FormatKind::ActelHex);
        assert_eq!(
            from_contents(b"Memory Type : Flash\n0x00000000    0xAB\n"),
            FormatKind::ChecksumMem
        );
    }

    #[test]
    fn detects_tektronix() {
        let mut map = crate::map::MemoryMap::new();
        map.insert(0, &[1, 2, 3]).unwrap();
        let mut out = Vec::new();
        crate::format::save(FormatKind::TektronixHex, &mut map, &mut out).unwrap();
        assert_eq!(from_contents(&out), FormatKind::TektronixHex);
    }

    #[test]
    fn binary_fallbacks() {
        assert_eq!(from_contents(b"\x7FELF\x01\x01\x01"), FormatKind::Elf);
        assert_eq!(from_contents(&[0x00, 0x01, 0x02, 0xFF]), FormatKind::Binary);
        assert_eq!(from_contents(b""), FormatKind::Binary);
        // Text that no plug-in accepts is raw binary too.
        assert_eq!(from_contents(b"hello world\n"), FormatKind::Binary);
    }

    /// Blank lines do not count toward the peek window.
    #[test]
    fn peek_skips_blank_lines() {
        assert_eq!(
            from_contents(b"\n\n\n@8000\n00 01\nq\n"),
            FormatKind::TiText
        );
    }
}
