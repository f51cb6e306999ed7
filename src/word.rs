//! 16-bit word primitives.
//!
//! The LC-3 works entirely in unsigned 16-bit words. Arithmetic wraps
//! modulo 2^16, so nothing in here can fail:
//! - [`sign_extend`] widens an n-bit two's-complement field to a word
//! - [`field`] pulls an unsigned bit field out of an instruction
//! - [`is_negative`] / [`to_signed`] interpret a word as two's complement

/// The machine's native data size.
pub type Word = u16;

/// Widen the low `bit_count` bits of `x` to 16 bits, treating them as a
/// two's-complement number.
///
/// Bits above the field are ignored, so callers may pass the raw
/// instruction masked or unmasked.
#[inline]
pub const fn sign_extend(x: Word, bit_count: u32) -> Word {
    debug_assert!(bit_count > 0 && bit_count <= 16);
    if bit_count >= 16 {
        return x;
    }
    let mask = (1u16 << bit_count) - 1;
    let x = x & mask;
    if (x >> (bit_count - 1)) & 1 != 0 {
        x | !mask
    } else {
        x
    }
}

/// Extract `width` bits of `instr` starting at bit `shift`.
#[inline]
pub const fn field(instr: Word, shift: u32, width: u32) -> Word {
    (instr >> shift) & ((1u16 << width) - 1)
}

/// True when bit 15 is set.
#[inline]
pub const fn is_negative(x: Word) -> bool {
    x >> 15 != 0
}

/// Reinterpret a word as a signed value.
#[inline]
pub const fn to_signed(x: Word) -> i16 {
    x as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sign_extend_examples() {
        assert_eq!(sign_extend(0x1F, 5), 0xFFFF);
        assert_eq!(sign_extend(0x10, 5), 0xFFF0);
        assert_eq!(sign_extend(0x0F, 5), 0x000F);
        assert_eq!(sign_extend(0x3F, 6), 0xFFFF);
        assert_eq!(sign_extend(0x100, 9), 0xFF00);
        assert_eq!(sign_extend(0x0FF, 9), 0x00FF);
        assert_eq!(sign_extend(0x400, 11), 0xFC00);
    }

    #[test]
    fn test_sign_extend_ignores_high_bits() {
        // ADD R0, R0, #-1 with the opcode and registers still attached
        assert_eq!(sign_extend(0x103F, 5), 0xFFFF);
    }

    #[test]
    fn test_field() {
        let instr = 0b0001_010_011_1_00101;
        assert_eq!(field(instr, 12, 4), 0b0001);
        assert_eq!(field(instr, 9, 3), 0b010);
        assert_eq!(field(instr, 6, 3), 0b011);
        assert_eq!(field(instr, 5, 1), 1);
        assert_eq!(field(instr, 0, 5), 0b00101);
    }

    #[test]
    fn test_is_negative() {
        assert!(is_negative(0x8000));
        assert!(is_negative(0xFFFF));
        assert!(!is_negative(0x7FFF));
        assert!(!is_negative(0));
    }

    proptest! {
        #[test]
        fn prop_negative_imm5_is_value_minus_32(v in 0x10u16..0x20) {
            let extended = sign_extend(v, 5);
            prop_assert_eq!(to_signed(extended) as i32, v as i32 - 32);
        }

        #[test]
        fn prop_positive_fields_zero_extend(bits in 2u32..16, raw: u16) {
            let v = raw & ((1u16 << (bits - 1)) - 1);
            prop_assert_eq!(sign_extend(v, bits), v);
        }

        #[test]
        fn prop_sign_extend_matches_signed_shift(bits in 1u32..16, raw: u16) {
            let shift = 16 - bits;
            let expected = ((raw << shift) as i16 >> shift) as u16;
            prop_assert_eq!(sign_extend(raw, bits), expected);
        }
    }
}
