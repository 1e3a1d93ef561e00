//! Bit-field helpers the instruction decoder is built on.
//!
//! Positions and counts are in bits, `pos + count` must not exceed 32.

/// Mask with the low `count` bits set. `count` may be 32.
#[inline]
pub const fn bit_mask(count: u8) -> u32 {
    ((1u64 << count) - 1) as u32
}

/// Interprets the low `bits` of `value` as a two's-complement number and
/// sign-extends it to 32 bits.
#[inline]
pub const fn sign_extend(value: u32, bits: u8) -> i32 {
    debug_assert!(bits >= 1 && bits <= 32);
    let shift = 32 - bits as u32;
    ((value << shift) as i32) >> shift
}

/// Returns the `count`-bit unsigned field starting at bit `pos`.
#[inline]
pub const fn extract_bits(value: u32, pos: u8, count: u8) -> u32 {
    debug_assert!(pos as u32 + count as u32 <= 32);
    if pos >= 32 {
        return 0;
    }
    (value >> pos) & bit_mask(count)
}

/// Returns `value` with bits `[pos, pos + count)` replaced by the low `count`
/// bits of `replacement`.
#[inline]
pub const fn insert_bits(value: u32, pos: u8, count: u8, replacement: u32) -> u32 {
    debug_assert!(pos as u32 + count as u32 <= 32);
    if pos >= 32 {
        return value;
    }
    let mask = bit_mask(count);
    (value & !(mask << pos)) | ((replacement & mask) << pos)
}

/// Returns bit `pos` of `value` as 0 or 1.
#[inline]
pub const fn test_bit(value: u32, pos: u8) -> u32 {
    (value >> pos) & 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn sign_extend_negative_fields_keep_low_bits() {
        for bits in 1..=32u8 {
            let field = (1u32 << (bits - 1)) | (bit_mask(bits - 1) & 0x5555_5555);
            let extended = sign_extend(field, bits);
            assert!(extended < 0, "{bits} bit field 0x{field:x} should be negative");
            assert_eq!(extended as u32 & bit_mask(bits), field);
        }
    }

    #[test]
    fn sign_extend_positive_fields_are_unchanged() {
        for bits in 1..=32u8 {
            let field = bit_mask(bits - 1) & 0x3333_3333;
            assert_eq!(sign_extend(field, bits), field as i32);
        }
    }

    #[test]
    fn sign_extend_ignores_bits_above_the_field() {
        assert_eq!(sign_extend(0xffff_f7ff, 12), 0x7ff);
        assert_eq!(sign_extend(0x0000_0800, 12), -2048);
        assert_eq!(sign_extend(0x8000_0000, 32), i32::MIN);
    }

    #[test]
    fn extract_and_insert() {
        let word = 0xdead_beef;
        assert_eq!(extract_bits(word, 0, 8), 0xef);
        assert_eq!(extract_bits(word, 28, 4), 0xd);
        assert_eq!(extract_bits(word, 0, 32), word);
        assert_eq!(extract_bits(word, 31, 1), 1);

        assert_eq!(insert_bits(word, 8, 8, 0x12), 0xdead_12ef);
        assert_eq!(insert_bits(word, 0, 32, 0x1234_5678), 0x1234_5678);
        // only the low `count` bits of the replacement are used
        assert_eq!(insert_bits(0, 4, 4, 0xff), 0xf0);
    }

    #[test]
    fn bit_tests() {
        assert_eq!(test_bit(0b1010, 1), 1);
        assert_eq!(test_bit(0b1010, 2), 0);
        assert_eq!(test_bit(0x8000_0000, 31), 1);
        assert_eq!(bit_mask(0), 0);
        assert_eq!(bit_mask(32), u32::MAX);
    }
}
