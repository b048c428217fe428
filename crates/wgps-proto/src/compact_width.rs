//! Compact-width unsigned integer encoding.
//!
//! WGPS encodes every handle, amount, offset, count, and length as a
//! big-endian unsigned integer in the smallest of 1, 2, 4, or 8 bytes that
//! fits the value. The chosen width is not self-describing: it travels as a
//! two-bit tag packed into some framing byte of the surrounding message,
//! usually the low two bits of the message's first byte.

/// One of the four widths a compact integer can occupy on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactWidth {
    /// 1 byte, values below 2^8
    One,
    /// 2 bytes, values below 2^16
    Two,
    /// 4 bytes, values below 2^32
    Four,
    /// 8 bytes, any `u64`
    Eight,
}

impl CompactWidth {
    /// Number of bytes this width occupies.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
        }
    }

    /// Two-bit wire tag for this width: 1 → `0b00`, 2 → `0b01`, 4 → `0b10`,
    /// 8 → `0b11`.
    #[must_use]
    pub const fn tag_bits(self) -> u8 {
        match self {
            Self::One => 0b00,
            Self::Two => 0b01,
            Self::Four => 0b10,
            Self::Eight => 0b11,
        }
    }

    /// Width named by the low two bits of a framing byte.
    ///
    /// Equivalent to `1 << (byte & 0b11)` bytes; all four bit patterns are
    /// valid, so this cannot fail.
    #[must_use]
    pub const fn from_tag_bits(byte: u8) -> Self {
        match byte & 0b11 {
            0b00 => Self::One,
            0b01 => Self::Two,
            0b10 => Self::Four,
            _ => Self::Eight,
        }
    }

    /// Smallest width that fits `value`.
    #[must_use]
    pub const fn fitting(value: u64) -> Self {
        if value < 1 << 8 {
            Self::One
        } else if value < 1 << 16 {
            Self::Two
        } else if value < 1 << 32 {
            Self::Four
        } else {
            Self::Eight
        }
    }
}

/// Append `value` to `out` as exactly `width` big-endian bytes.
///
/// `width` must fit `value`; encoders always derive it via
/// [`CompactWidth::fitting`], so a truncating width is a caller bug.
pub fn put_compact(out: &mut Vec<u8>, width: CompactWidth, value: u64) {
    debug_assert!(width.bytes() >= CompactWidth::fitting(value).bytes());

    match width {
        CompactWidth::One => out.push(value as u8),
        CompactWidth::Two => out.extend_from_slice(&(value as u16).to_be_bytes()),
        CompactWidth::Four => out.extend_from_slice(&(value as u32).to_be_bytes()),
        CompactWidth::Eight => out.extend_from_slice(&value.to_be_bytes()),
    }
}

/// Append `value` with a leading width byte (tag in the low two bits).
///
/// Used where no surrounding framing byte has spare bits: path component
/// counts and lengths, timestamps inside ranges, and similar interior
/// integers.
pub fn put_tagged(out: &mut Vec<u8>, value: u64) {
    let width = CompactWidth::fitting(value);
    out.push(width.tag_bits());
    put_compact(out, width, value);
}

/// Reassemble a big-endian compact integer from exactly `width` bytes.
///
/// `bytes` must be exactly `width.bytes()` long; the decoder always slices
/// precisely, so a mismatch is a caller bug.
#[must_use]
pub fn compact_from_be(width: CompactWidth, bytes: &[u8]) -> u64 {
    debug_assert_eq!(bytes.len(), width.bytes());

    let mut value = 0u64;
    for byte in bytes {
        value = (value << 8) | u64::from(*byte);
    }
    value
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn widths_match_value_magnitude() {
        // Scenario: the eight canonical boundary values decode with widths
        // 1,1,2,2,4,4,8,8.
        let cases: [(u64, CompactWidth); 8] = [
            (1, CompactWidth::One),
            (255, CompactWidth::One),
            (256, CompactWidth::Two),
            (65_535, CompactWidth::Two),
            (65_536, CompactWidth::Four),
            (u64::from(u32::MAX), CompactWidth::Four),
            (u64::from(u32::MAX) + 1, CompactWidth::Eight),
            ((1 << 63) - 1, CompactWidth::Eight),
        ];

        for (value, expected) in cases {
            assert_eq!(CompactWidth::fitting(value), expected, "value {value}");
        }
    }

    #[test]
    fn tag_bits_round_trip() {
        for width in [
            CompactWidth::One,
            CompactWidth::Two,
            CompactWidth::Four,
            CompactWidth::Eight,
        ] {
            assert_eq!(CompactWidth::from_tag_bits(width.tag_bits()), width);
        }
    }

    #[test]
    fn tag_bits_ignore_high_bits() {
        assert_eq!(CompactWidth::from_tag_bits(0b1010_0110), CompactWidth::Four);
    }

    proptest! {
        #[test]
        fn round_trip_any_value(value in any::<u64>()) {
            let width = CompactWidth::fitting(value);
            let mut out = Vec::new();
            put_compact(&mut out, width, value);

            prop_assert_eq!(out.len(), width.bytes());
            prop_assert_eq!(compact_from_be(width, &out), value);
        }

        #[test]
        fn encoded_length_is_minimal(value in any::<u64>()) {
            let width = CompactWidth::fitting(value);

            // No strictly smaller legal width fits the value.
            for smaller in [CompactWidth::One, CompactWidth::Two, CompactWidth::Four] {
                if smaller.bytes() < width.bytes() {
                    let limit = 1u128 << (smaller.bytes() * 8);
                    prop_assert!(u128::from(value) >= limit);
                }
            }
        }
    }
}
