// Algebraic laws of the sparse bitmask, property-tested over small random
// masks. The bit windows stay far from the +/-2^32 domain edges so no law
// is disturbed by chunk dropping.

use hexmap::Mask;
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;

/// A mask with up to eight random bits touched inside a +/-10000 window.
#[derive(Clone, Debug)]
struct SmallMask(Mask);

impl Arbitrary for SmallMask {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut mask = Mask::new(bool::arbitrary(g));
        for _ in 0..(usize::arbitrary(g) % 8) {
            let index = i64::arbitrary(g) % 10_000;
            mask.set(index, bool::arbitrary(g)).unwrap();
        }
        SmallMask(mask)
    }
}

#[quickcheck]
fn or_and_are_idempotent(a: SmallMask) -> bool {
    let a = a.0;
    a.or(&a) == a && a.and(&a) == a
}

#[quickcheck]
fn xor_with_self_is_uniform_default(a: SmallMask) -> bool {
    let x = a.0.xor(&a.0);
    // Every bit equals the result's default; canonical form makes that the
    // same as holding no words at all.
    x.is_uniform() && x == Mask::new(x.default_bit())
}

#[quickcheck]
fn double_complement_is_identity(a: SmallMask) -> bool {
    a.0.not().not() == a.0
}

#[quickcheck]
fn shift_round_trip(a: SmallMask, n: u16) -> bool {
    let n = n as i64;
    a.0.shl(n).shr(n) == a.0
}

#[quickcheck]
fn count_partitions_the_range(a: SmallMask, lo: i16, len: u8) -> bool {
    let lo = lo as i64;
    let hi = lo + len as i64;
    let ones = a.0.count_bits(lo, hi, true).unwrap();
    let zeros = a.0.count_bits(lo, hi, false).unwrap();
    ones + zeros == (hi - lo + 1) as u64
}

#[quickcheck]
fn value_round_trip(v: u64, index: u16, default_bit: bool) -> bool {
    let index = index as i64;
    let mask = Mask::from_u64(v, index, default_bit).unwrap();
    mask.to_u64(index).unwrap() == v
}

#[quickcheck]
fn boolean_ops_match_per_bit(a: SmallMask, b: SmallMask) -> bool {
    let (a, b) = (a.0, b.0);
    let or = a.or(&b);
    let and = a.and(&b);
    let xor = a.xor(&b);
    (-10_050..10_050).all(|i| {
        let (x, y) = (a.get(i).unwrap(), b.get(i).unwrap());
        or.get(i).unwrap() == (x | y)
            && and.get(i).unwrap() == (x & y)
            && xor.get(i).unwrap() == (x ^ y)
    })
}

#[quickcheck]
fn crop_then_count(a: SmallMask) -> bool {
    let mut cropped = a.0.clone();
    cropped.crop(0, 99).unwrap();
    // Outside the kept window everything reads as the default.
    (100..10_100).all(|i| cropped.get(i).unwrap() == cropped.default_bit())
        && (-10_100..0).all(|i| cropped.get(i).unwrap() == cropped.default_bit())
}

/// The fixed shift scenario: 0xFF at bit 0 shifted up a nibble.
#[test]
fn shift_scenario() {
    let a = Mask::from_u32(0x0000_00FF, 0, false).unwrap();
    let expected = Mask::from_u32(0x0000_0FF0, 0, false).unwrap();
    assert_eq!(a.shl(4), expected);
}
