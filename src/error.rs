//! Crate-wide error type.
//!
//! Library calls return `Result<_, HexError>`. Per-line parse problems are
//! handled differently: the codecs collect them as `Line N: …` strings so a
//! single load reports every bad line at once (see [`crate::format`]).

use thiserror::Error;

/// Errors surfaced by the memory-map, mask, and codec layers.
#[derive(Debug, Error)]
pub enum HexError {
    /// Arithmetic or indexing outside the defined domain: an address past
    /// 2^32, a negative-size region, an index past the end of a buffer.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// A parser rejected a line outright (wrong prefix, wrong length, odd
    /// hex digit count, unknown record type).
    #[error("Line {line}: {msg}")]
    MalformedRecord { line: usize, msg: String },

    /// Declared record checksum disagrees with the computed one.
    #[error("Line {line}: checksum mismatch (computed {computed:#04X}, declared {declared:#04X})")]
    ChecksumMismatch {
        line: usize,
        computed: u32,
        declared: u32,
    },

    /// A binary reader ran out of bytes mid-structure.
    #[error("unexpected end of file: {0}")]
    UnexpectedEof(String),

    /// A trie insert found the exact key already occupied. Internal: the
    /// public memory-map insert overwrites instead of failing.
    #[error("duplicate key {0:#010X}")]
    DuplicateKey(u32),

    /// The feature exists in the format inventory but is not available.
    #[error("unimplemented: {0}")]
    Unimplemented(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HexError {
    /// Shorthand for the most common error kind.
    pub(crate) fn range(msg: impl Into<String>) -> Self {
        HexError::OutOfRange(msg.into())
    }
}
