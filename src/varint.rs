// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The UTF-8-like variable-length coding of frame/sample numbers.
//!
//! The frame-number field of a frame header uses a UTF-8-style encoding
//! extended to 36-bit values (7 bytes maximum). The head byte carries the
//! width; each trailing byte stores 6 payload bits under a `10xxxxxx` marker.

use nom::bytes::streaming::take as byte_take;
use nom::combinator::map;
use nom::error::ParseError;
use nom::error_position;
use nom::IResult;

use crate::error::RangeError;

/// Lookup table of head-byte markers indexed by the number of trailing bytes.
const UTF8_HEADS: [u8; 7] = [0x80, 0xC0, 0xE0, 0xF0, 0xF8, 0xFC, 0xFE];

/// Returns the number of bytes `encode` uses for `val`.
///
/// The result is meaningful only for `val < 2^36`; wider values are not
/// encodable and are rejected by [`encode`].
///
/// # Examples
///
/// ```
/// # use flacmerge::varint::width_of;
/// assert_eq!(width_of(0), 1);
/// assert_eq!(width_of(128), 2);
/// assert_eq!(width_of((1 << 36) - 1), 7);
/// ```
#[inline]
pub const fn width_of(val: u64) -> usize {
    let code_bits = (u64::BITS - val.leading_zeros()) as usize;
    if code_bits <= 7 {
        1
    } else {
        1 + (code_bits - 2) / 5
    }
}

/// Encodes the given integer into UTF-8-like byte sequence.
///
/// # Errors
///
/// It returns an error if `val` exceeds 36-bit value.
///
/// # Examples
///
/// ```
/// # use flacmerge::varint::encode;
/// assert_eq!(encode(0x56).unwrap(), &[0x56]);
/// assert_eq!(encode(0x1024).unwrap(), &[0xE1, 0x80, 0xA4]);
/// ```
#[inline]
pub fn encode(val: u64) -> Result<heapless::Vec<u8, 7>, RangeError> {
    let val_size = u64::BITS as usize;
    let code_bits: usize = val_size - val.leading_zeros() as usize;
    let mut ret = heapless::Vec::new();
    if code_bits <= 7 {
        ret.push(val as u8).unwrap();
    } else if code_bits > 36 {
        return Err(RangeError::from_display(
            "input",
            "cannot exceed 36 bits.",
            &val,
        ));
    } else {
        // capacity = n * 6 + 6 - n = n * 5 + 6
        // n = ceil(capacity - 6 / 5)
        let trailing_bytes: usize = (code_bits - 2) / 5;
        debug_assert!(trailing_bytes >= 1);
        debug_assert!(trailing_bytes <= 6);
        let capacity = trailing_bytes * 6 + 6 - trailing_bytes;
        debug_assert!(capacity >= code_bits);

        let first_bits = 6 - trailing_bytes;
        let mut val = val << (val_size - capacity);
        let head_byte: u8 = if trailing_bytes == 6 {
            0xFEu8
        } else {
            UTF8_HEADS[trailing_bytes] | ((val >> (64 - first_bits)) & 0xFF) as u8
        };
        ret.push(head_byte).unwrap();
        val <<= first_bits;

        for _i in 0..trailing_bytes {
            let b = 0x80u8 | (val >> 58) as u8;
            ret.push(b).unwrap();
            val <<= 6;
        }
    }
    Ok(ret)
}

/// Recognizes a UTF-8-like coded number.
///
/// # Errors
///
/// Same as other nom parsers, this returns [`nom::Err`] if `input` doesn't
/// conform to the format.
pub fn decode<'a, E>(input: &'a [u8]) -> IResult<&'a [u8], u64, E>
where
    E: ParseError<&'a [u8]>,
{
    let remaining_input = input;
    let (remaining_input, head): (_, u64) =
        map(byte_take(1usize), |x: &[u8]| x[0].into())(remaining_input)?;

    let (tail_count, mut acc) = if head < 128 {
        (0usize, head & 0x7F)
    } else if head < 0xE0 {
        (1, head & 0x1F)
    } else if head < 0xF0 {
        (2, head & 0x0F)
    } else if head < 0xF8 {
        (3, head & 0x07)
    } else if head < 0xFC {
        (4, head & 0x03)
    } else if head < 0xFE {
        (5, head & 0x01)
    } else if head == 0xFE {
        (6, 0)
    } else {
        return Err(nom::Err::Error(error_position!(
            remaining_input,
            nom::error::ErrorKind::TagBits
        )));
    };

    let (remaining_input, tail): (_, &[u8]) = byte_take(tail_count)(remaining_input)?;
    for b in tail {
        acc = acc << 6 | u64::from(*b & 0x3F);
    }
    Ok((remaining_input, acc))
}
