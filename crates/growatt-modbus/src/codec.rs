// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Conversions between raw 16-bit words and scaled values.
//!
//! # Word Layout
//!
//! ```text
//! count = 1:  [ w0 ]            -> w0                  (signed: w0 - 0x10000 if w0 >= 0x8000)
//! count = 2:  [ w0 ][ w1 ]      -> (w0 << 16) | w1     (signed: v - 2^32 if v >= 0x8000_0000)
//!
//! encode_u32(v, HighLow) -> [ hi ][ lo ]
//! encode_u32(v, LowHigh) -> [ lo ][ hi ]
//! ```
//!
//! Decoded integers are multiplied by the descriptor's scale.

use tracing::debug;

use crate::types::{RegisterDescriptor, WordOrder};

/// Decodes `count` words from the start of `words`.
///
/// Returns `None` if fewer than `count` words are available or `count` is
/// not 1 or 2.
pub fn decode(words: &[u16], count: u8, signed: bool, scale: f64) -> Option<f64> {
    let raw: i64 = match (count, words) {
        (1, [w0, ..]) => {
            let v = i64::from(*w0);
            if signed && v >= 0x8000 {
                v - 0x1_0000
            } else {
                v
            }
        }
        (2, [w0, w1, ..]) => {
            let v = i64::from(assemble_u32(*w0, *w1));
            if signed && v >= 0x8000_0000 {
                v - 0x1_0000_0000
            } else {
                v
            }
        }
        _ => return None,
    };

    Some(raw as f64 * scale)
}

/// Decodes a descriptor from a window read that started at `window_start`.
///
/// A descriptor the returned words do not fully cover decodes to `None`.
pub fn decode_register(
    words: &[u16],
    window_start: u16,
    descriptor: &RegisterDescriptor,
) -> Option<f64> {
    let offset = usize::from(descriptor.address.checked_sub(window_start)?);
    let value = words
        .get(offset..)
        .and_then(|tail| decode(tail, descriptor.count, descriptor.signed, descriptor.scale));

    if value.is_none() {
        debug!(
            unique_id = %descriptor.unique_id,
            address = descriptor.address,
            count = descriptor.count,
            window_start,
            returned = words.len(),
            "Short window read, value absent"
        );
    }

    value
}

/// Assembles two words big-endian into a 32-bit value.
#[inline]
pub fn assemble_u32(high: u16, low: u16) -> u32 {
    (u32::from(high) << 16) | u32::from(low)
}

/// Splits a 32-bit value into two words in the given order.
///
/// The value is reduced modulo 2^32 first, so negative inputs wrap.
pub fn encode_u32(value: i64, order: WordOrder) -> [u16; 2] {
    let v = truncate_u32(value);
    let hi = (v >> 16) as u16;
    let lo = (v & 0xFFFF) as u16;
    match order {
        WordOrder::HighLow => [hi, lo],
        WordOrder::LowHigh => [lo, hi],
    }
}

/// Reduces a value modulo 2^32.
#[inline]
pub fn truncate_u32(value: i64) -> u32 {
    (value & 0xFFFF_FFFF) as u32
}

/// Extracts a bitfield: `(value & mask) >> shift`.
#[inline]
pub fn extract_field(value: u32, mask: u32, shift: u32) -> u32 {
    (value & mask).checked_shr(shift).unwrap_or(0)
}

/// Replaces the masked bits of `old` with `field << shift`.
///
/// Bits of `field` that land outside `mask` are dropped.
#[inline]
pub fn pack_field(old: u32, field: u32, mask: u32, shift: u32) -> u32 {
    let shifted = field.checked_shl(shift).unwrap_or(0);
    (old & !mask) | (shifted & mask)
}

/// Limits an option value to the bits the mask leaves after shifting.
#[inline]
pub fn field_width_mask(mask: u32, shift: u32) -> u32 {
    mask.checked_shr(shift).unwrap_or(0)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_unsigned_16() {
        for w in [0u16, 1, 0x7FFF, 0x8000, 0xFFFF] {
            assert_eq!(decode(&[w], 1, false, 1.0), Some(f64::from(w)));
        }
    }

    #[test]
    fn test_decode_signed_16() {
        assert_eq!(decode(&[0xFFFF], 1, true, 1.0), Some(-1.0));
        assert_eq!(decode(&[0x8000], 1, true, 1.0), Some(-32768.0));
        assert_eq!(decode(&[0x7FFF], 1, true, 1.0), Some(32767.0));
    }

    #[test]
    fn test_decode_32_bit() {
        assert_eq!(decode(&[0x0001, 0x0002], 2, false, 1.0), Some(65538.0));
        assert_eq!(decode(&[0xFFFF, 0xFFFE], 2, true, 1.0), Some(-2.0));
        assert_eq!(decode(&[0xFFFF, 0xFFFF], 2, false, 1.0), Some(4_294_967_295.0));
    }

    #[test]
    fn test_decode_applies_scale() {
        assert_eq!(decode(&[2305], 1, false, 0.1), Some(2305.0 * 0.1));
        assert_eq!(decode(&[0, 1234], 2, false, 0.1), Some(1234.0 * 0.1));
    }

    #[test]
    fn test_decode_short_input() {
        assert_eq!(decode(&[], 1, false, 1.0), None);
        assert_eq!(decode(&[1], 2, false, 1.0), None);
        assert_eq!(decode(&[1, 2], 3, false, 1.0), None);
    }

    #[test]
    fn test_decode_register_offsets() {
        let words = [100, 200, 300];
        let a = RegisterDescriptor::input("a", 10);
        let b = RegisterDescriptor::input("b", 12);
        let wide = RegisterDescriptor::input("w", 11).with_count(2);
        let trailing = RegisterDescriptor::input("t", 12).with_count(2);

        assert_eq!(decode_register(&words, 10, &a), Some(100.0));
        assert_eq!(decode_register(&words, 10, &b), Some(300.0));
        assert_eq!(
            decode_register(&words, 10, &wide),
            Some(f64::from(assemble_u32(200, 300)))
        );
        assert_eq!(decode_register(&words, 10, &trailing), None);
        assert_eq!(decode_register(&words, 11, &a), None);
    }

    #[test]
    fn test_encode_word_order() {
        assert_eq!(encode_u32(0x1234_5678, WordOrder::HighLow), [0x1234, 0x5678]);
        assert_eq!(encode_u32(0x1234_5678, WordOrder::LowHigh), [0x5678, 0x1234]);
        assert_eq!(encode_u32(-1, WordOrder::HighLow), [0xFFFF, 0xFFFF]);
        assert_eq!(encode_u32(0x1_0000_0001, WordOrder::HighLow), [0x0000, 0x0001]);
    }

    #[test]
    fn test_encode_decode_inverse() {
        for v in [0u32, 1, 0xFFFF, 0x1_0000, 0x8000_0000, 0xDEAD_BEEF, u32::MAX] {
            let hl = encode_u32(i64::from(v), WordOrder::HighLow);
            assert_eq!(decode(&hl, 2, false, 1.0), Some(f64::from(v)));

            let lh = encode_u32(i64::from(v), WordOrder::LowHigh);
            assert_eq!(decode(&[lh[1], lh[0]], 2, false, 1.0), Some(f64::from(v)));
        }
    }

    #[test]
    fn test_bitfield_read_modify_write() {
        let old = 0x00FF_00FF;
        let mask = 0x0000_FF00;
        let shift = 8;
        let field = 0xAA & field_width_mask(mask, shift);

        let packed = pack_field(old, field, mask, shift);
        assert_eq!(packed, 0x00FF_AAFF);
        assert_eq!(extract_field(packed, mask, shift), 0xAA);
        assert_eq!(packed & !mask, old & !mask);
    }

    #[test]
    fn test_bitfield_oversized_field_is_masked() {
        assert_eq!(pack_field(0, 0x1FF, 0x0000_FF00, 8), 0x0000_FF00);
        assert_eq!(pack_field(0xFFFF_FFFF, 0, 0xF, 32), 0xFFFF_FFF0);
        assert_eq!(extract_field(0xFFFF_FFFF, u32::MAX, 32), 0);
    }
}
