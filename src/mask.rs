//! Sparse bitmask over a signed bit-index domain.
//!
//! [`Mask`] is a partial function `bit: i64 -> {0, 1}` defined on
//! `[-2^32, 2^32 - 1]`. Every index whose 32-bit chunk is not materialized
//! reads as the mask's `default_bit`. Storage is a `BTreeMap` from chunk
//! index (`floor(bit / 32)`, which fits the 27-bit chunk domain) to the
//! `u32` word holding bits `32k..=32k+31`, so iteration order is
//! deterministic.
//!
//! # Canonical form
//!
//! A stored word never equals the default pattern (`0x0000_0000` when the
//! default bit is 0, `0xFFFF_FFFF` when it is 1). Without this rule a mask
//! with default 0 and an explicit all-zero word would be indistinguishable
//! from one lacking the word, and equality, hashing, and emptiness tests
//! would all have two representations to worry about. Every writer funnels
//! through [`Mask::set_word`], which drops default-pattern words.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{BitAnd, BitOr, BitXor, Not, Shl, Shr};

use crate::error::HexError;

/// Lowest valid bit index.
pub const BIT_INDEX_MIN: i64 = -(1 << 32);
/// Highest valid bit index.
pub const BIT_INDEX_MAX: i64 = (1 << 32) - 1;

const CHUNK_MIN: i64 = -(1 << 27);
const CHUNK_MAX: i64 = (1 << 27) - 1;

/// Sparse bit array with an implicit default value for unmaterialized bits.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Mask {
    default_bit: bool,
    words: BTreeMap<i32, u32>,
}

impl Default for Mask {
    fn default() -> Self {
        Mask::new(false)
    }
}

impl Mask {
    /// An empty mask: every bit reads as `default_bit`.
    pub fn new(default_bit: bool) -> Self {
        Mask {
            default_bit,
            words: BTreeMap::new(),
        }
    }

    /// The value returned for bits whose chunk is not materialized.
    #[inline]
    pub fn default_bit(&self) -> bool {
        self.default_bit
    }

    /// True when no bit differs from the default.
    pub fn is_uniform(&self) -> bool {
        self.words.is_empty()
    }

    /// Number of materialized 32-bit words. Diagnostic only.
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    #[inline]
    fn default_word(&self) -> u32 {
        if self.default_bit {
            u32::MAX
        } else {
            0
        }
    }

    fn check_index(index: i64) -> Result<(), HexError> {
        if (BIT_INDEX_MIN..=BIT_INDEX_MAX).contains(&index) {
            Ok(())
        } else {
            Err(HexError::range(format!("bit index {index} outside mask domain")))
        }
    }

    fn check_span(lo: i64, hi: i64) -> Result<(), HexError> {
        Self::check_index(lo)?;
        Self::check_index(hi)?;
        if lo > hi {
            return Err(HexError::range(format!("bit range {lo}..={hi} is reversed")));
        }
        Ok(())
    }

    #[inline]
    fn split(index: i64) -> (i64, u32) {
        (index.div_euclid(32), index.rem_euclid(32) as u32)
    }

    /// Word for chunk `chunk`; the default pattern when not materialized or
    /// outside the chunk domain.
    #[inline]
    fn word_at(&self, chunk: i64) -> u32 {
        if !(CHUNK_MIN..=CHUNK_MAX).contains(&chunk) {
            return self.default_word();
        }
        self.words
            .get(&(chunk as i32))
            .copied()
            .unwrap_or_else(|| self.default_word())
    }

    /// Store `word` for `chunk`, removing it when it equals the default
    /// pattern. The single point that maintains canonical form.
    #[inline]
    fn set_word(&mut self, chunk: i64, word: u32) {
        debug_assert!((CHUNK_MIN..=CHUNK_MAX).contains(&chunk));
        if word == self.default_word() {
            self.words.remove(&(chunk as i32));
        } else {
            self.words.insert(chunk as i32, word);
        }
    }

    /// Bits of word `chunk` that fall inside `[lo, hi]`, as a 32-bit mask.
    fn in_range_bits(chunk: i64, lo: i64, hi: i64) -> u32 {
        let word_lo = chunk * 32;
        let word_hi = word_lo + 31;
        let a = lo.max(word_lo);
        let b = hi.min(word_hi);
        if a > b {
            return 0;
        }
        let first = (a - word_lo) as u32;
        let count = (b - a + 1) as u32;
        low_bits(count) << first
    }

    // ── Access ───────────────────────────────────────────────────────────────

    pub fn get(&self, index: i64) -> Result<bool, HexError> {
        Self::check_index(index)?;
        let (chunk, offset) = Self::split(index);
        Ok((self.word_at(chunk) >> offset) & 1 == 1)
    }

    pub fn set(&mut self, index: i64, value: bool) -> Result<(), HexError> {
        Self::check_index(index)?;
        let (chunk, offset) = Self::split(index);
        let word = self.word_at(chunk);
        let updated = if value {
            word | (1 << offset)
        } else {
            word & !(1 << offset)
        };
        self.set_word(chunk, updated);
        Ok(())
    }

    // ── Range operations ─────────────────────────────────────────────────────

    /// Force every bit outside `[lo, hi]` to the default. Only stored words
    /// need touching; when `lo` and `hi` land in the same word the combined
    /// in-range mask is applied once, so the word is not masked twice.
    pub fn crop(&mut self, lo: i64, hi: i64) -> Result<(), HexError> {
        Self::check_span(lo, hi)?;
        let default = self.default_word();
        let keys: Vec<i32> = self.words.keys().copied().collect();
        for k in keys {
            let keep = Self::in_range_bits(k as i64, lo, hi);
            let word = self.words[&k];
            self.set_word(k as i64, (word & keep) | (default & !keep));
        }
        Ok(())
    }

    /// Force every bit inside `[lo, hi]` to the default.
    pub fn delete(&mut self, lo: i64, hi: i64) -> Result<(), HexError> {
        Self::check_span(lo, hi)?;
        let default = self.default_word();
        let keys: Vec<i32> = self.words.keys().copied().collect();
        for k in keys {
            let cut = Self::in_range_bits(k as i64, lo, hi);
            if cut == 0 {
                continue;
            }
            let word = self.words[&k];
            self.set_word(k as i64, (word & !cut) | (default & cut));
        }
        Ok(())
    }

    /// Set every bit in `[lo, hi]` to `value`, materializing words as needed.
    pub fn set_range(&mut self, lo: i64, hi: i64, value: bool) -> Result<(), HexError> {
        Self::check_span(lo, hi)?;
        if value == self.default_bit {
            // Equivalent to deleting the range: only stored words can differ.
            return self.delete(lo, hi);
        }
        let (chunk_lo, _) = Self::split(lo);
        let (chunk_hi, _) = Self::split(hi);
        for chunk in chunk_lo..=chunk_hi {
            let m = Self::in_range_bits(chunk, lo, hi);
            let word = self.word_at(chunk);
            let updated = if value { word | m } else { word & !m };
            self.set_word(chunk, updated);
        }
        Ok(())
    }

    // ── Range constructors ───────────────────────────────────────────────────

    /// Mask whose default bit is 1 with zeros materialized over `[lo, hi]`.
    pub fn zeros(lo: i64, hi: i64) -> Result<Self, HexError> {
        let mut mask = Mask::new(true);
        mask.set_range(lo, hi, false)?;
        Ok(mask)
    }

    /// Mask whose default bit is 0 with ones materialized over `[lo, hi]`.
    pub fn ones(lo: i64, hi: i64) -> Result<Self, HexError> {
        let mut mask = Mask::new(false);
        mask.set_range(lo, hi, true)?;
        Ok(mask)
    }

    // ── Boolean algebra ──────────────────────────────────────────────────────

    fn combine(&self, other: &Mask, op: impl Fn(u32, u32) -> u32) -> Mask {
        let default = op(self.default_word(), other.default_word()) != 0;
        let mut out = Mask::new(default);
        // Walk the union of materialized chunks; the absent side reads its
        // default pattern through `word_at`.
        let chunks: BTreeSet<i32> = self
            .words
            .keys()
            .chain(other.words.keys())
            .copied()
            .collect();
        for k in chunks {
            out.set_word(k as i64, op(self.word_at(k as i64), other.word_at(k as i64)));
        }
        out
    }

    pub fn and(&self, other: &Mask) -> Mask {
        self.combine(other, |a, b| a & b)
    }

    pub fn or(&self, other: &Mask) -> Mask {
        self.combine(other, |a, b| a | b)
    }

    pub fn xor(&self, other: &Mask) -> Mask {
        self.combine(other, |a, b| a ^ b)
    }

    pub fn not(&self) -> Mask {
        let mut out = Mask::new(!self.default_bit);
        for (&k, &w) in &self.words {
            out.set_word(k as i64, !w);
        }
        out
    }

    // ── Shifts ───────────────────────────────────────────────────────────────

    /// Shift every bit toward higher indices by `n`. Negative `n` delegates
    /// to [`Mask::shr`]. Bits whose chunk leaves the storable chunk domain
    /// are silently dropped.
    pub fn shl(&self, n: i64) -> Mask {
        if n < 0 {
            return self.shr(n.unsigned_abs() as i64);
        }
        self.shift(n as u64, true)
    }

    /// Shift every bit toward lower indices by `n`. Negative `n` delegates
    /// to [`Mask::shl`].
    pub fn shr(&self, n: i64) -> Mask {
        if n < 0 {
            return self.shl(n.unsigned_abs() as i64);
        }
        self.shift(n as u64, false)
    }

    /// Decomposes the shift into a chunk transpose (`n / 32`) and a bit
    /// scatter (`n % 32`): each destination word merges the shifted halves
    /// of its two source words. Non-candidate destinations would only ever
    /// receive the default pattern (shifting an all-default pair yields the
    /// default pattern again), so walking the candidate set is exhaustive.
    fn shift(&self, n: u64, up: bool) -> Mask {
        let word_shift = (n / 32) as i64;
        let bit_shift = (n % 32) as u32;
        let mut out = Mask::new(self.default_bit);
        let mut dests: BTreeSet<i64> = BTreeSet::new();
        for &k in self.words.keys() {
            let k = k as i64;
            let base = if up { k + word_shift } else { k - word_shift };
            dests.insert(base);
            if bit_shift != 0 {
                dests.insert(if up { base + 1 } else { base - 1 });
            }
        }
        for d in dests {
            if !(CHUNK_MIN..=CHUNK_MAX).contains(&d) {
                continue;
            }
            let word = if up {
                let low = self.word_at(d - word_shift);
                if bit_shift == 0 {
                    low
                } else {
                    let high = self.word_at(d - word_shift - 1);
                    (low << bit_shift) | (high >> (32 - bit_shift))
                }
            } else {
                let low = self.word_at(d + word_shift);
                if bit_shift == 0 {
                    low
                } else {
                    let high = self.word_at(d + word_shift + 1);
                    (low >> bit_shift) | (high << (32 - bit_shift))
                }
            };
            out.set_word(d, word);
        }
        out
    }

    // ── Conversions ──────────────────────────────────────────────────────────

    /// Build a mask holding exactly the `width` bits of `value`, little
    /// endian, starting at `bit_index`.
    fn from_value(
        value: u64,
        width: u32,
        bit_index: i64,
        default_bit: bool,
    ) -> Result<Self, HexError> {
        Self::check_span(bit_index, bit_index + (width as i64 - 1))?;
        let mut mask = Mask::new(default_bit);
        for b in 0..width {
            mask.set(bit_index + b as i64, (value >> b) & 1 == 1)?;
        }
        Ok(mask)
    }

    /// Read `width` bits little-endian starting at `bit_index`.
    fn to_value(&self, width: u32, bit_index: i64) -> Result<u64, HexError> {
        Self::check_span(bit_index, bit_index + (width as i64 - 1))?;
        let mut value = 0u64;
        for b in 0..width {
            if self.get(bit_index + b as i64)? {
                value |= 1 << b;
            }
        }
        Ok(value)
    }

    pub fn from_u8(value: u8, bit_index: i64, default_bit: bool) -> Result<Self, HexError> {
        Self::from_value(value as u64, 8, bit_index, default_bit)
    }

    pub fn from_u16(value: u16, bit_index: i64, default_bit: bool) -> Result<Self, HexError> {
        Self::from_value(value as u64, 16, bit_index, default_bit)
    }

    pub fn from_u32(value: u32, bit_index: i64, default_bit: bool) -> Result<Self, HexError> {
        Self::from_value(value as u64, 32, bit_index, default_bit)
    }

    pub fn from_u64(value: u64, bit_index: i64, default_bit: bool) -> Result<Self, HexError> {
        Self::from_value(value, 64, bit_index, default_bit)
    }

    pub fn to_u8(&self, bit_index: i64) -> Result<u8, HexError> {
        Ok(self.to_value(8, bit_index)? as u8)
    }

    pub fn to_u16(&self, bit_index: i64) -> Result<u16, HexError> {
        Ok(self.to_value(16, bit_index)? as u16)
    }

    pub fn to_u32(&self, bit_index: i64) -> Result<u32, HexError> {
        Ok(self.to_value(32, bit_index)? as u32)
    }

    pub fn to_u64(&self, bit_index: i64) -> Result<u64, HexError> {
        self.to_value(64, bit_index)
    }

    /// The `u32` words covering `[lo, hi]`, 32 bits per entry starting at
    /// `lo`. When `lo` is not chunk-aligned the read is internally shifted;
    /// bits past `hi` in the final word read as the default.
    pub fn to_words(&self, lo: i64, hi: i64) -> Result<Vec<u32>, HexError> {
        Self::check_span(lo, hi)?;
        let total = (hi - lo + 1) as u64;
        let count = total.div_ceil(32) as usize;
        let mut words = Vec::with_capacity(count);
        for i in 0..count {
            let mut word = 0u32;
            for b in 0..32u32 {
                let index = lo + (i as i64) * 32 + b as i64;
                let bit = if index > hi {
                    self.default_bit
                } else {
                    self.get(index)?
                };
                if bit {
                    word |= 1 << b;
                }
            }
            words.push(word);
        }
        Ok(words)
    }

    // ── Diagnostics ──────────────────────────────────────────────────────────

    /// Index of the lowest bit differing from the default, or `None` when
    /// every bit reads as the default. Canonical form guarantees that any
    /// materialized word yields `Some`.
    pub fn low_bit_index(&self) -> Option<i64> {
        for (&k, &w) in &self.words {
            let diff = w ^ self.default_word();
            debug_assert_ne!(diff, 0, "stored word equals default pattern");
            if diff != 0 {
                return Some(k as i64 * 32 + diff.trailing_zeros() as i64);
            }
        }
        None
    }

    /// Index of the highest bit differing from the default.
    pub fn high_bit_index(&self) -> Option<i64> {
        for (&k, &w) in self.words.iter().rev() {
            let diff = w ^ self.default_word();
            debug_assert_ne!(diff, 0, "stored word equals default pattern");
            if diff != 0 {
                return Some(k as i64 * 32 + (31 - diff.leading_zeros()) as i64);
            }
        }
        None
    }

    // ── Counting ─────────────────────────────────────────────────────────────

    /// Number of bits equal to `value` in `[lo, hi]`. Unmaterialized spans
    /// contribute arithmetically, so the cost scales with stored words, not
    /// with the width of the range.
    pub fn count_bits(&self, lo: i64, hi: i64, value: bool) -> Result<u64, HexError> {
        Self::check_span(lo, hi)?;
        let total = (hi - lo + 1) as u64;
        let mut covered = 0u64;
        let mut matching = 0u64;
        let (chunk_lo, _) = Self::split(lo);
        let (chunk_hi, _) = Self::split(hi);
        for (&k, &w) in self
            .words
            .range(chunk_lo.max(CHUNK_MIN) as i32..=chunk_hi.min(CHUNK_MAX) as i32)
        {
            let m = Self::in_range_bits(k as i64, lo, hi);
            covered += m.count_ones() as u64;
            let hits = if value { w & m } else { !w & m };
            matching += hits.count_ones() as u64;
        }
        if value == self.default_bit {
            matching += total - covered;
        }
        Ok(matching)
    }
}

#[inline]
fn low_bits(n: u32) -> u32 {
    if n >= 32 {
        u32::MAX
    } else {
        (1u32 << n) - 1
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Operator sugar
// ─────────────────────────────────────────────────────────────────────────────

impl BitAnd for &Mask {
    type Output = Mask;
    fn bitand(self, rhs: &Mask) -> Mask {
        self.and(rhs)
    }
}

impl BitOr for &Mask {
    type Output = Mask;
    fn bitor(self, rhs: &Mask) -> Mask {
        self.or(rhs)
    }
}

impl BitXor for &Mask {
    type Output = Mask;
    fn bitxor(self, rhs: &Mask) -> Mask {
        self.xor(rhs)
    }
}

impl Not for &Mask {
    type Output = Mask;
    fn not(self) -> Mask {
        Mask::not(self)
    }
}

impl Shl<i64> for &Mask {
    type Output = Mask;
    fn shl(self, n: i64) -> Mask {
        Mask::shl(self, n)
    }
}

impl Shr<i64> for &Mask {
    type Output = Mask;
    fn shr(self, n: i64) -> Mask {
        Mask::shr(self, n)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_round_trip() {
        let mut m = Mask::new(false);
        assert!(!m.get(100).unwrap());
        m.set(100, true).unwrap();
        assert!(m.get(100).unwrap());
        m.set(100, false).unwrap();
        assert!(!m.get(100).unwrap());
        // Clearing the only set bit restores canonical emptiness.
        assert!(m.is_uniform());
    }

    #[test]
    fn negative_indices() {
        let mut m = Mask::new(false);
        m.set(-1, true).unwrap();
        m.set(-33, true).unwrap();
        assert!(m.get(-1).unwrap());
        assert!(m.get(-33).unwrap());
        assert_eq!(m.low_bit_index(), Some(-33));
        assert_eq!(m.high_bit_index(), Some(-1));
    }

    #[test]
    fn domain_is_enforced() {
        let mut m = Mask::new(false);
        assert!(m.set(BIT_INDEX_MAX + 1, true).is_err());
        assert!(m.get(BIT_INDEX_MIN - 1).is_err());
        assert!(m.set(BIT_INDEX_MAX, true).is_ok());
        assert!(m.set(BIT_INDEX_MIN, true).is_ok());
    }

    #[test]
    fn set_default_value_removes_word() {
        let mut m = Mask::new(true);
        m.set(5, false).unwrap();
        assert_eq!(m.word_count(), 1);
        m.set(5, true).unwrap();
        assert_eq!(m.word_count(), 0);
    }

    #[test]
    fn crop_and_delete_same_word() {
        // lo and hi inside one 32-bit word.
        let mut m = Mask::ones(0, 31).unwrap();
        m.crop(4, 7).unwrap();
        assert_eq!(m.count_bits(0, 31, true).unwrap(), 4);
        assert!(m.get(4).unwrap() && m.get(7).unwrap());
        assert!(!m.get(3).unwrap() && !m.get(8).unwrap());

        let mut m = Mask::ones(0, 31).unwrap();
        m.delete(4, 7).unwrap();
        assert_eq!(m.count_bits(0, 31, true).unwrap(), 28);
        assert!(!m.get(5).unwrap());
    }

    #[test]
    fn crop_spanning_words() {
        let mut m = Mask::ones(0, 127).unwrap();
        m.crop(30, 90).unwrap();
        assert_eq!(m.count_bits(0, 127, true).unwrap(), 61);
        assert_eq!(m.low_bit_index(), Some(30));
        assert_eq!(m.high_bit_index(), Some(90));
    }

    #[test]
    fn boolean_ops_and_defaults() {
        let a = Mask::ones(0, 15).unwrap();
        let b = Mask::ones(8, 23).unwrap();
        let both = &a & &b;
        assert!(!both.default_bit());
        assert_eq!(both.low_bit_index(), Some(8));
        assert_eq!(both.high_bit_index(), Some(15));

        let either = &a | &b;
        assert_eq!(either.count_bits(0, 31, true).unwrap(), 24);

        let diff = &a ^ &b;
        assert_eq!(diff.count_bits(0, 31, true).unwrap(), 16);

        // Result default derives from the operand defaults.
        let z = Mask::zeros(0, 7).unwrap(); // default 1
        assert!((&a | &z).default_bit());
        assert!(!(&a & &z).default_bit());
    }

    #[test]
    fn not_flips_default_and_words() {
        let a = Mask::ones(3, 5).unwrap();
        let inv = !&a;
        assert!(inv.default_bit());
        assert!(!inv.get(4).unwrap());
        assert!(inv.get(6).unwrap());
        assert_eq!(!&inv, a);
    }

    #[test]
    fn shift_scatter() {
        let a = Mask::from_u32(0x0000_00FF, 0, false).unwrap();
        let shifted = a.shl(4);
        assert_eq!(shifted, Mask::from_u32(0x0000_0FF0, 0, false).unwrap());
        // Cross-word scatter.
        let wide = a.shl(28);
        assert_eq!(wide.low_bit_index(), Some(28));
        assert_eq!(wide.high_bit_index(), Some(35));
        // Round trip back down.
        assert_eq!(wide.shr(28), a);
    }

    #[test]
    fn shift_negative_delegates() {
        let a = Mask::ones(32, 39).unwrap();
        assert_eq!(a.shl(-32), a.shr(32));
        assert_eq!(a.shr(-8), a.shl(8));
    }

    #[test]
    fn shift_drops_out_of_domain_chunks() {
        let a = Mask::ones(BIT_INDEX_MAX - 7, BIT_INDEX_MAX).unwrap();
        let gone = a.shl(64);
        assert!(gone.is_uniform());
    }

    #[test]
    fn value_round_trip() {
        let v = 0xDEAD_BEEF_CAFE_F00Du64;
        let m = Mask::from_u64(v, 17, false).unwrap();
        assert_eq!(m.to_u64(17).unwrap(), v);
        assert_eq!(m.to_u8(17).unwrap(), 0x0D);
        assert_eq!(m.to_u16(17).unwrap(), 0xF00D);
    }

    #[test]
    fn to_words_unaligned() {
        let m = Mask::from_u32(0xFFFF_FFFF, 8, false).unwrap();
        let words = m.to_words(8, 39).unwrap();
        assert_eq!(words, vec![0xFFFF_FFFF]);
        let words = m.to_words(0, 39).unwrap();
        assert_eq!(words, vec![0xFFFF_FF00, 0x0000_00FF]);
    }

    #[test]
    fn count_law() {
        let mut m = Mask::new(false);
        m.set_range(10, 20, true).unwrap();
        m.set(100, true).unwrap();
        let ones = m.count_bits(0, 127, true).unwrap();
        let zeros = m.count_bits(0, 127, false).unwrap();
        assert_eq!(ones, 12);
        assert_eq!(ones + zeros, 128);
    }

    #[test]
    fn count_over_unmaterialized_span() {
        let m = Mask::new(true);
        assert_eq!(m.count_bits(-1000, 999, true).unwrap(), 2000);
        assert_eq!(m.count_bits(-1000, 999, false).unwrap(), 0);
    }

    #[test]
    fn zeros_ones_constructors() {
        let z = Mask::zeros(3, 66).unwrap();
        assert!(z.default_bit());
        assert_eq!(z.count_bits(0, 127, false).unwrap(), 64);
        let o = Mask::ones(3, 66).unwrap();
        assert!(!o.default_bit());
        assert_eq!(o.count_bits(0, 127, true).unwrap(), 64);
        // The two are complements over the whole domain.
        assert_eq!(!&o, z);
    }

    #[test]
    fn equality_is_structural() {
        let mut a = Mask::new(false);
        a.set_range(0, 63, true).unwrap();
        a.delete(0, 63).unwrap();
        assert_eq!(a, Mask::new(false));
        assert_ne!(Mask::new(false), Mask::new(true));
    }
}
