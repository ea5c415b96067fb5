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

//! nom parsers for whole frames.

use nom::bits::bits;
use nom::bits::streaming::tag as bit_tag;
use nom::bits::streaming::take as bit_take;
use nom::branch::alt;
use nom::combinator::into;
use nom::combinator::map;
use nom::combinator::verify;
use nom::error::ParseError;
use nom::error_position;
use nom::multi::many_m_n;
use nom::number::streaming::be_u16;
use nom::number::streaming::be_u8;
use nom::IResult;
use nom::Offset;

use crate::constant::MAX_BITS_PER_SAMPLE;
use crate::frame::datatype::BlockSizeSpec;
use crate::frame::datatype::ChannelAssignment;
use crate::frame::datatype::Constant;
use crate::frame::datatype::FixedLpc;
use crate::frame::datatype::Frame;
use crate::frame::datatype::FrameHeader;
use crate::frame::datatype::FrameNumber;
use crate::frame::datatype::Lpc;
use crate::frame::datatype::Residual;
use crate::frame::datatype::SampleRateSpec;
use crate::frame::datatype::SampleSizeSpec;
use crate::frame::datatype::SubFrame;
use crate::frame::datatype::Verbatim;
use crate::meta::convert_bits_err;
use crate::meta::StreamInfo;
use crate::rewrite::FRAME_CRC;
use crate::rewrite::HEADER_CRC;
use crate::varint;

type BitInput<'a> = (&'a [u8], usize);

/// Recognizes a [`Frame`].
///
/// The returned parser consumes exactly the frame's bytes (CRC-16 footer
/// included), so callers can derive the frame's byte length from
/// [`nom::Offset`] over the remaining input.
///
/// # Errors
///
/// Same as other nom parsers, this returns [`nom::Err`] if `input` doesn't
/// conform to the format.
pub fn frame<'a, E>(
    stream_info: &StreamInfo,
    check_crc: bool,
) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], Frame, E>
where
    E: ParseError<&'a [u8]>,
{
    let channels_from_header = stream_info.channels();
    let bits_per_sample_from_header = stream_info.bits_per_sample();

    move |input| {
        let input_start = input;
        let remaining_input = input;
        let (remaining_input, header) = frame_header(check_crc)(remaining_input)?;
        let channels = header.channel_assignment().channels();
        if channels != channels_from_header {
            return Err(nom::Err::Error(error_position!(
                remaining_input,
                nom::error::ErrorKind::TagBits
            )));
        }
        let block_size = header.block_size();
        let bits_per_sample = header
            .bits_per_sample()
            .unwrap_or(bits_per_sample_from_header);
        if bits_per_sample != bits_per_sample_from_header {
            return Err(nom::Err::Error(error_position!(
                remaining_input,
                nom::error::ErrorKind::TagBits
            )));
        }

        let mut ch = 0;
        let (remaining_input, subframes) = bits(many_m_n(channels, channels, |i| {
            let ret = subframe::<(BitInput<'a>, nom::error::ErrorKind)>(
                block_size,
                bits_per_sample + header.channel_assignment().bits_per_sample_offset(ch),
            )(i);
            ch += 1;
            ret
        }))(remaining_input)
        .map_err(convert_bits_err)?;
        let test_crc16 = check_crc.then(|| {
            let frame_bytes = &input_start[..input_start.offset(remaining_input)];
            FRAME_CRC.checksum(frame_bytes)
        });
        let (remaining_input, _) =
            verify(be_u16, |crc| test_crc16.map_or(true, |x| x == *crc))(remaining_input)?;

        let frame = Frame::from_parts(header, subframes);
        Ok((remaining_input, frame))
    }
}

/// Recognizes a [`FrameHeader`].
///
/// # Errors
///
/// Same as other nom parsers, this returns [`nom::Err`] if `input` doesn't
/// conform to the format.
pub fn frame_header<'a, E>(
    check_crc: bool,
) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], FrameHeader, E>
where
    E: ParseError<&'a [u8]>,
{
    move |input| {
        let input_start = input;
        let (
            remaining_input,
            (blocking_type, block_size_tag, sample_rate_tag, channel_tag, sample_size_tag),
        ) = bits(|bit_input| {
            let remaining_input = bit_input;
            let (remaining_input, _sync) = bit_tag(0x7FFCu16, 15usize)(remaining_input)?;
            let (remaining_input, blocking_type): (_, u8) = bit_take(1usize)(remaining_input)?;

            let (remaining_input, block_size_tag): (_, u8) = bit_take(4usize)(remaining_input)?;
            let (remaining_input, sample_rate_tag): (_, u8) = bit_take(4usize)(remaining_input)?;
            let (remaining_input, channel_tag): (_, u8) = bit_take(4usize)(remaining_input)?;
            let (remaining_input, sample_size_tag): (_, u8) = bit_take(3usize)(remaining_input)?;
            let (remaining_input, _reserved) = bit_tag(0, 1usize)(remaining_input)?;
            let ret: IResult<BitInput<'a>, _, (BitInput<'a>, nom::error::ErrorKind)> = Ok((
                remaining_input,
                (
                    blocking_type,
                    block_size_tag,
                    sample_rate_tag,
                    channel_tag,
                    sample_size_tag,
                ),
            ));
            ret
        })(input)
        .map_err(convert_bits_err)?;

        let sample_size_spec = SampleSizeSpec::from_tag(sample_size_tag).ok_or_else(|| {
            nom::Err::Error(error_position!(
                remaining_input,
                nom::error::ErrorKind::TagBits
            ))
        })?;
        let channel_assignment = ChannelAssignment::from_tag(channel_tag).ok_or_else(|| {
            nom::Err::Error(error_position!(
                remaining_input,
                nom::error::ErrorKind::TagBits
            ))
        })?;

        let number_start = remaining_input;
        let (remaining_input, number) = if blocking_type == 0 {
            map(varint::decode, |x| FrameNumber::Frame(x as u32))(remaining_input)?
        } else {
            map(varint::decode, FrameNumber::StartSample)(remaining_input)?
        };
        let number_width = number_start.offset(remaining_input);

        let (remaining_input, block_size_spec) = block_size_code(block_size_tag)(remaining_input)?;
        let (remaining_input, sample_rate_spec) =
            sample_rate_code(sample_rate_tag)(remaining_input)?;

        let test_crc8 = check_crc.then(|| {
            let header_bytes = &input_start[..input_start.offset(remaining_input)];
            HEADER_CRC.checksum(header_bytes)
        });
        let (remaining_input, _) =
            verify(be_u8, |crc| test_crc8.map_or(true, |x| x == *crc))(remaining_input)?;

        let frame_header = FrameHeader::from_parts(
            number,
            number_width,
            block_size_spec,
            channel_assignment,
            sample_size_spec,
            sample_rate_spec,
        );

        Ok((remaining_input, frame_header))
    }
}

fn block_size_code<'a, E>(tag: u8) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], BlockSizeSpec, E>
where
    E: ParseError<&'a [u8]>,
{
    move |input| match tag {
        0b0001 => Ok((input, BlockSizeSpec::S192)),
        0b0010..=0b0101 => Ok((input, BlockSizeSpec::Pow2Mul576(tag - 0b0010))),
        0b0110 => {
            let (i, x) = be_u8(input)?;
            Ok((i, BlockSizeSpec::ExtraByte(x)))
        }
        0b0111 => {
            let (i, x) = be_u16(input)?;
            Ok((i, BlockSizeSpec::ExtraTwoBytes(x)))
        }
        0b1000..=0b1111 => Ok((input, BlockSizeSpec::Pow2Mul256(tag - 0b1000))),
        _ => Err(nom::Err::Error(error_position!(
            input,
            nom::error::ErrorKind::TagBits
        ))),
    }
}

fn sample_rate_code<'a, E>(tag: u8) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], SampleRateSpec, E>
where
    E: ParseError<&'a [u8]>,
{
    move |input| {
        let remaining_input = input;
        let (remaining_input, data) = if tag == 0b1100 {
            let (r, x) = be_u8(remaining_input)?;
            (r, Some(x as usize))
        } else if tag == 0b1101 || tag == 0b1110 {
            let (r, x) = be_u16(remaining_input)?;
            (r, Some(x as usize))
        } else {
            (remaining_input, None)
        };
        let spec = SampleRateSpec::from_tag_and_data(tag, data).ok_or_else(|| {
            nom::Err::Error(error_position!(
                remaining_input,
                nom::error::ErrorKind::TagBits
            ))
        })?;
        Ok((remaining_input, spec))
    }
}

/// Recognizes a [`SubFrame`].
///
/// # Errors
///
/// Same as other nom parsers, this returns [`nom::Err`] if `input` doesn't
/// conform to the format.
pub fn subframe<'a, E>(
    block_size: usize,
    bits_per_sample: usize,
) -> impl FnMut(BitInput<'a>) -> IResult<BitInput<'a>, SubFrame, E>
where
    E: ParseError<BitInput<'a>>,
{
    debug_assert!(bits_per_sample <= MAX_BITS_PER_SAMPLE + 1);
    alt((
        into(constant::<E>(block_size, bits_per_sample)),
        into(fixed_lpc::<E>(block_size, bits_per_sample)),
        into(lpc::<E>(block_size, bits_per_sample)),
        into(verbatim::<E>(block_size, bits_per_sample)),
    ))
}

/// Recognizes a subframe header: the type tag and the wasted-bits count.
///
/// When the wasted-bits flag is set, the count follows in unary with a bias
/// of one, and the subframe's samples are stored that many bits narrower.
fn subframe_header<'a, E>(input: BitInput<'a>) -> IResult<BitInput<'a>, (u8, u8), E>
where
    E: ParseError<BitInput<'a>>,
{
    let remaining_input = input;

    let (remaining_input, _reserved) = bit_tag(0, 1usize)(remaining_input)?;
    let (remaining_input, typetag) = bit_take(6usize)(remaining_input)?;
    let (remaining_input, wasted_flag): (_, u8) = bit_take(1usize)(remaining_input)?;

    let (remaining_input, wasted_bits) = if wasted_flag == 0 {
        (remaining_input, 0u8)
    } else {
        let (i, w) = unary_code(remaining_input)?;
        (i, (w + 1) as u8)
    };

    Ok((remaining_input, (typetag, wasted_bits)))
}

/// Recognizes a [`Constant`] subframe.
///
/// # Errors
///
/// Same as other nom parsers, this returns [`nom::Err`] if `input` doesn't
/// conform to the format.
pub fn constant<'a, E>(
    block_size: usize,
    bits_per_sample: usize,
) -> impl FnMut(BitInput<'a>) -> IResult<BitInput<'a>, Constant, E>
where
    E: ParseError<BitInput<'a>>,
{
    move |input| {
        let remaining_input = input;
        let (remaining_input, (typetag, wasted_bits)) = subframe_header(remaining_input)?;
        if typetag != 0x00 {
            return Err(nom::Err::Error(error_position!(
                remaining_input,
                nom::error::ErrorKind::TagBits
            )));
        }
        let width = bits_per_sample - wasted_bits as usize;

        let (remaining_input, dc_offset) =
            map(bit_take(width), |u| u_to_i(u, width))(remaining_input)?;

        Ok((
            remaining_input,
            Constant::from_parts(block_size, dc_offset, wasted_bits),
        ))
    }
}

/// Recognizes a [`FixedLpc`] subframe.
///
/// # Errors
///
/// Same as other nom parsers, this returns [`nom::Err`] if `input` doesn't
/// conform to the format.
///
/// # Panics
///
/// Only panics by an internal error.
pub fn fixed_lpc<'a, E>(
    block_size: usize,
    bits_per_sample: usize,
) -> impl FnMut(BitInput<'a>) -> IResult<BitInput<'a>, FixedLpc, E>
where
    E: ParseError<BitInput<'a>>,
{
    move |input| {
        let remaining_input = input;
        let (remaining_input, (typetag, wasted_bits)) = subframe_header(remaining_input)?;
        if !(0x08..=0x0C).contains(&typetag) {
            return Err(nom::Err::Error(error_position!(
                remaining_input,
                nom::error::ErrorKind::TagBits
            )));
        }
        let order = (typetag as usize) - 0x08;
        let width = bits_per_sample - wasted_bits as usize;
        let (remaining_input, warm_up) = raw_samples(width, order)(remaining_input)?;
        let warm_up = heapless::Vec::try_from(warm_up.as_slice()).expect("unexpected error");

        let (remaining_input, residual) = residual(block_size, order)(remaining_input)?;

        Ok((
            remaining_input,
            FixedLpc::from_parts(warm_up, residual, wasted_bits),
        ))
    }
}

/// Recognizes an [`Lpc`] subframe.
///
/// # Errors
///
/// Same as other nom parsers, this returns [`nom::Err`] if `input` doesn't
/// conform to the format.
pub fn lpc<'a, E>(
    block_size: usize,
    bits_per_sample: usize,
) -> impl FnMut(BitInput<'a>) -> IResult<BitInput<'a>, Lpc, E>
where
    E: ParseError<BitInput<'a>>,
{
    move |input| {
        let remaining_input = input;
        let (remaining_input, (typetag, wasted_bits)) = subframe_header(remaining_input)?;
        if !(0x20..0x40).contains(&typetag) {
            return Err(nom::Err::Error(error_position!(
                remaining_input,
                nom::error::ErrorKind::TagBits
            )));
        }
        let order = (typetag as usize) - 0x20 + 1;
        let width = bits_per_sample - wasted_bits as usize;
        let (remaining_input, warm_up) = raw_samples(width, order)(remaining_input)?;

        let (remaining_input, precision): (_, usize) =
            map(bit_take(4usize), |p: u8| (p as usize + 1))(remaining_input)?;
        let (remaining_input, shift): (_, i8) =
            map(bit_take(5usize), |x: u8| u_to_i(u32::from(x), 5) as i8)(remaining_input)?;
        let (remaining_input, coefs) = raw_samples(precision, order)(remaining_input)?;
        let coefs: Vec<i16> = coefs.into_iter().map(|x| x as i16).collect();

        let (remaining_input, residual) = residual(block_size, order)(remaining_input)?;

        Ok((
            remaining_input,
            Lpc::from_parts(warm_up, coefs, shift, residual, wasted_bits),
        ))
    }
}

/// Recognizes a [`Verbatim`] subframe.
///
/// # Errors
///
/// Same as other nom parsers, this returns [`nom::Err`] if `input` doesn't
/// conform to the format.
pub fn verbatim<'a, E>(
    block_size: usize,
    bits_per_sample: usize,
) -> impl FnMut(BitInput<'a>) -> IResult<BitInput<'a>, Verbatim, E>
where
    E: ParseError<BitInput<'a>>,
{
    move |input| {
        let remaining_input = input;
        let (remaining_input, (typetag, wasted_bits)) = subframe_header(remaining_input)?;
        if typetag != 0x01 {
            return Err(nom::Err::Error(error_position!(
                remaining_input,
                nom::error::ErrorKind::TagBits
            )));
        }
        let width = bits_per_sample - wasted_bits as usize;

        let (remaining_input, data) = raw_samples(width, block_size)(remaining_input)?;

        Ok((
            remaining_input,
            Verbatim::from_parts(data, wasted_bits),
        ))
    }
}

/// Recognizes a [`Residual`].
///
/// # Errors
///
/// Same as other nom parsers, this returns [`nom::Err`] if `input` doesn't
/// conform to the format.
pub fn residual<'a, E>(
    block_size: usize,
    warmup_length: usize,
) -> impl FnMut(BitInput<'a>) -> IResult<BitInput<'a>, Residual, E>
where
    E: ParseError<BitInput<'a>>,
{
    move |input| {
        let remaining_input = input;

        let (remaining_input, method): (_, u8) = bit_take(2usize)(remaining_input)?;
        let p_bits = match method {
            0b00 => 4usize,
            0b01 => 5usize,
            _ => {
                return Err(nom::Err::Error(error_position!(
                    remaining_input,
                    nom::error::ErrorKind::TagBits
                )));
            }
        };
        let (remaining_input, partition_order): (_, u8) = bit_take(4usize)(remaining_input)?;

        let partition_count = 1usize << (partition_order as usize);
        let partition_len = block_size / partition_count;
        if partition_len == 0 || block_size % partition_count != 0 {
            return Err(nom::Err::Error(error_position!(
                remaining_input,
                nom::error::ErrorKind::Verify
            )));
        }

        let mut rice_params = Vec::with_capacity(partition_count);
        let mut quotients = Vec::with_capacity(block_size);
        let mut remainders = Vec::with_capacity(block_size);

        let mut remaining_input = remaining_input;
        for part in 0..partition_count {
            let (i, rice_p) = bit_take(p_bits)(remaining_input)?;
            remaining_input = i;
            rice_params.push(rice_p);

            for t in (partition_len * part)..(partition_len * (part + 1)) {
                if t < warmup_length {
                    quotients.push(0);
                    remainders.push(0);
                    continue;
                }

                let (i, q): (_, usize) = unary_code(remaining_input)?;
                remaining_input = i;
                let (i, r): (_, u32) = bit_take(rice_p as usize)(remaining_input)?;
                remaining_input = i;
                quotients.push(q as u32);
                remainders.push(r);
            }
        }
        let parsed = Residual::from_parts(
            partition_order,
            block_size,
            rice_params,
            quotients,
            remainders,
        );

        Ok((remaining_input, parsed))
    }
}

fn u_to_i(x: u32, bits: usize) -> i32 {
    let x: u64 = x.into(); // widen
    let msb: u64 = 1u64 << (bits - 1);
    let offset: i32 = if x >= msb { (1u32 << bits) as i32 } else { 0 };
    i32::try_from(x).unwrap() - offset
}

/// Utility parser for reading a sequence of samples with an arbitrary bit-width.
fn raw_samples<'a, E>(
    bits_per_sample: usize,
    size: usize,
) -> impl FnMut(BitInput<'a>) -> IResult<BitInput<'a>, Vec<i32>, E>
where
    E: ParseError<BitInput<'a>>,
{
    move |input| {
        let mut remaining_input = input;
        let mut data = Vec::with_capacity(size);

        for _t in 0..size {
            let (i, u): (_, u32) = bit_take(bits_per_sample)(remaining_input)?;
            remaining_input = i;
            data.push(u_to_i(u, bits_per_sample));
        }
        Ok((remaining_input, data))
    }
}

/// Recognizes unary-code of unsigned integers.
fn unary_code<'a, E>(input: BitInput<'a>) -> IResult<BitInput<'a>, usize, E>
where
    E: ParseError<BitInput<'a>>,
{
    let remaining_input = input;
    let (remaining_input, ret) = nom::multi::many0_count(bit_tag(0, 1usize))(remaining_input)?;
    let (remaining_input, _) = bit_tag(1, 1usize)(remaining_input)?;
    Ok((remaining_input, ret))
}

#[cfg(test)]
mod tests {
    use super::*;

    use nom::error::VerboseError;

    use crate::frame::Decode;
    use crate::test_helper::FixtureTrack;

    // Canonical header: 192-sample block, 2 independent channels, sample
    // rate and size deferred to STREAMINFO, start sample 0. The CRC-8 byte
    // is a known value for this prefix.
    const CANONICAL_HEADER: [u8; 6] = [0xFF, 0xF9, 0x10, 0x10, 0x00, 0x69];

    #[test]
    fn decoding_canonical_header() {
        let (rest, header) = frame_header::<VerboseError<&[u8]>>(true)(&CANONICAL_HEADER)
            .expect("unexpected parse error");
        assert!(rest.is_empty());
        assert!(header.is_variable_blocking());
        assert_eq!(header.number(), FrameNumber::StartSample(0));
        assert_eq!(header.number_width(), 1);
        assert_eq!(header.block_size(), 192);
        assert_eq!(header.channel_assignment(), &ChannelAssignment::Independent(2));
        assert_eq!(header.bits_per_sample(), None);
        assert_eq!(header.sample_rate_spec(), SampleRateSpec::Unspecified);
    }

    #[test]
    fn header_crc_mismatch_is_error() {
        let mut broken = CANONICAL_HEADER;
        broken[5] ^= 0xFF;
        assert!(frame_header::<VerboseError<&[u8]>>(true)(&broken).is_err());
        // and the same bytes pass with checking disabled.
        assert!(frame_header::<VerboseError<&[u8]>>(false)(&broken).is_ok());
    }

    #[test]
    fn decoding_fixture_frames() {
        let track = FixtureTrack::new(44100, 2, 16).block_sizes(&[4096, 4096, 1000]);
        let bytes = track.to_bytes();
        let (frames_region, (info, _)) =
            crate::meta::stream_prefix::<VerboseError<&[u8]>>(&bytes)
                .expect("unexpected parse error");

        let mut rest = frames_region;
        let mut numbers = vec![];
        let mut sizes = vec![];
        while !rest.is_empty() {
            let before = rest;
            let (after, f) =
                frame::<VerboseError<&[u8]>>(&info, true)(rest).expect("unexpected parse error");
            numbers.push(f.header().number().value());
            sizes.push(f.block_size());
            assert_eq!(f.subframe_count(), 2);
            assert!(before.len() > after.len());
            rest = after;
        }
        assert_eq!(numbers, &[0, 1, 2]);
        assert_eq!(sizes, &[4096, 4096, 1000]);
    }

    #[test]
    fn decoding_fixture_samples() {
        let track = FixtureTrack::new(8000, 1, 16)
            .block_sizes(&[192])
            .dc_offsets(&[-123]);
        let bytes = track.to_bytes();
        let (frames_region, (info, _)) =
            crate::meta::stream_prefix::<VerboseError<&[u8]>>(&bytes)
                .expect("unexpected parse error");
        let (_, f) = frame::<VerboseError<&[u8]>>(&info, true)(frames_region)
            .expect("unexpected parse error");
        let signal = f.decode();
        assert_eq!(signal.len(), 192);
        assert!(signal.iter().all(|x| *x == -123));
    }

    #[test]
    fn truncated_frame_is_incomplete() {
        let track = FixtureTrack::new(44100, 2, 16).block_sizes(&[4096]);
        let bytes = track.to_bytes();
        let (frames_region, (info, _)) =
            crate::meta::stream_prefix::<VerboseError<&[u8]>>(&bytes)
                .expect("unexpected parse error");
        let cut = &frames_region[..frames_region.len() - 3];
        match frame::<VerboseError<&[u8]>>(&info, true)(cut) {
            Err(nom::Err::Incomplete(_)) => {}
            other => panic!("expected Incomplete, got {other:?}"),
        };
    }

    #[test]
    fn unsigned_to_signed_conversion() {
        assert_eq!(127, u_to_i(127, 8));
        assert_eq!(-128, u_to_i(128, 8));
    }

    #[test]
    fn decoding_unary_code() {
        let (remaining_input, decoded) = unary_code::<VerboseError<BitInput>>((&[0x01], 0))
            .expect("unexpected error from `unary_code`");
        assert_eq!(decoded, 7);
        assert_eq!(remaining_input, ([].as_slice(), 0));

        let (remaining_input, decoded) = unary_code::<VerboseError<BitInput>>((&[0x80, 0x0F], 1))
            .expect("unexpected error from `unary_code`");
        assert_eq!(decoded, 11);
        assert_eq!(remaining_input, ([0x0F].as_slice(), 5));
    }
}
