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

//! In-flight frame renumbering.
//!
//! Every emitted frame is put into variable-blocking mode with its number
//! field re-coded as the starting sample index in the merged stream. All
//! other header fields and the subframe payload are copied byte-exact; only
//! the two checksums are recomputed.

use std::io::Write;

use crate::error::MergeError;
use crate::error::ParseError;
use crate::frame::FrameHeader;
use crate::varint;

const CRC_8_FLAC: crc::Algorithm<u8> = crc::CRC_8_SMBUS;
const CRC_16_FLAC: crc::Algorithm<u16> = crc::CRC_16_UMTS;

/// CRC-8 (poly 0x07) covering a frame header up to the checksum byte.
pub static HEADER_CRC: crc::Crc<u8, crc::Table<16>> =
    crc::Crc::<u8, crc::Table<16>>::new(&CRC_8_FLAC);

/// CRC-16 (poly 0x8005) covering a whole frame up to the footer.
pub static FRAME_CRC: crc::Crc<u16, crc::Table<16>> =
    crc::Crc::<u16, crc::Table<16>>::new(&CRC_16_FLAC);

// 4 fixed bytes + up to 7 number bytes + up to 4 optional bytes + CRC-8.
const MAX_HEADER_BYTES: usize = 16;

/// Returns the number of optional block-size/sample-rate bytes that follow
/// the number field, derived from the third header byte.
#[inline]
pub(crate) fn optional_field_bytes(byte2: u8) -> usize {
    let mut additional = 0usize;
    // block-size bits == 011x: one byte follows, two when the low bit is set.
    if byte2 & 0xE0 == 0x60 {
        additional += 1;
        if byte2 & 0x10 != 0 {
            additional += 1;
        }
    }
    // sample-rate bits == 11xx: one byte for kHz (1100), two otherwise.
    if byte2 & 0x0C == 0x0C {
        additional += 1;
        if byte2 & 0x03 != 0 {
            additional += 1;
        }
    }
    additional
}

/// Copies one frame into `sink` with its number replaced by `start_sample`.
///
/// `src` must hold exactly the frame's bytes (CRC-16 footer included), as
/// delimited by the frame parser; `header` is the parsed view of its header.
/// The blocking-strategy bit of the emitted frame is always set, the number
/// field is re-coded as a sample index, and both checksums are recomputed.
///
/// Returns the emitted byte length. It differs from `src.len()` exactly when
/// the re-coded number occupies a different number of bytes than the
/// original.
///
/// # Errors
///
/// Returns [`MergeError::Range`] when `start_sample` does not fit 36 bits,
/// [`MergeError::Truncated`] when `src` is shorter than its own header
/// claims, and [`MergeError::Io`] when writing to `sink` fails.
pub fn rewrite_frame<W: Write>(
    src: &[u8],
    header: &FrameHeader,
    start_sample: u64,
    sink: &mut W,
) -> Result<usize, MergeError> {
    let old_width = header.number_width();
    let new_number = varint::encode(start_sample)?;

    let mut head = heapless::Vec::<u8, MAX_HEADER_BYTES>::new();
    let truncated = || MergeError::Truncated(ParseError::new("frame shorter than its header"));

    let fixed = src.get(0..4).ok_or_else(truncated)?;
    head.extend_from_slice(fixed).unwrap();
    head[1] |= 1; // variable-blocking mode; the number is a sample index.

    let additional = optional_field_bytes(head[2]);
    head.extend_from_slice(&new_number).unwrap();
    head.extend_from_slice(
        src.get(4 + old_width..4 + old_width + additional)
            .ok_or_else(truncated)?,
    )
    .unwrap();

    let crc8 = HEADER_CRC.checksum(&head);
    head.push(crc8).unwrap();

    // Everything between the input's CRC-8 byte and its CRC-16 footer is
    // opaque subframe payload.
    let payload_start = 4 + old_width + additional + 1;
    if payload_start + 2 > src.len() {
        return Err(truncated());
    }
    let payload = &src[payload_start..src.len() - 2];

    let mut crc16 = FRAME_CRC.digest();
    crc16.update(&head);
    crc16.update(payload);
    let crc16 = crc16.finalize();

    sink.write_all(&head)?;
    sink.write_all(payload)?;
    sink.write_all(&crc16.to_be_bytes())?;

    Ok(head.len() + payload.len() + 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    use nom::error::VerboseError;
    use rstest::rstest;

    use crate::frame::parser;
    use crate::frame::Decode;
    use crate::frame::FrameNumber;
    use crate::meta::stream_prefix;
    use crate::test_helper::FixtureTrack;

    #[rstest]
    #[case(0x00, 0)]
    #[case(0x10, 0)] // preset block size, preset rate
    #[case(0x60, 1)] // 8-bit block size
    #[case(0x70, 2)] // 16-bit block size
    #[case(0x0C, 1)] // kHz sample rate
    #[case(0x0D, 2)] // Hz sample rate
    #[case(0x0E, 2)] // daHz sample rate
    #[case(0x0F, 2)] // reserved, treated as two bytes
    #[case(0x6C, 2)] // 8-bit block size + kHz rate
    #[case(0x7D, 4)] // 16-bit block size + Hz rate
    fn optional_bytes(#[case] byte2: u8, #[case] expected: usize) {
        assert_eq!(optional_field_bytes(byte2), expected);
    }

    fn parse_single_frame(bytes: &[u8]) -> (crate::meta::StreamInfo, Vec<u8>) {
        let (frames, (info, _)) =
            stream_prefix::<VerboseError<&[u8]>>(bytes).expect("unexpected parse error");
        (info, frames.to_vec())
    }

    #[test]
    fn renumbered_frame_reverifies() {
        let track = FixtureTrack::new(44100, 2, 16).block_sizes(&[4096]);
        let bytes = track.to_bytes();
        let (info, frames) = parse_single_frame(&bytes);
        let (rest, frame) = parser::frame::<VerboseError<&[u8]>>(&info, true)(&frames)
            .expect("unexpected parse error");
        let src = &frames[..frames.len() - rest.len()];

        let mut sink = Vec::new();
        let emitted =
            rewrite_frame(src, frame.header(), 123_456, &mut sink).expect("rewrite failed");
        assert_eq!(emitted, sink.len());

        // the rewritten frame parses with CRC checking on, in variable mode,
        // and decodes to the same PCM.
        let (rest, rewritten) = parser::frame::<VerboseError<&[u8]>>(&info, true)(&sink)
            .expect("rewritten frame should parse");
        assert!(rest.is_empty());
        assert!(rewritten.header().is_variable_blocking());
        assert_eq!(
            rewritten.header().number(),
            FrameNumber::StartSample(123_456)
        );
        assert_eq!(rewritten.decode(), frame.decode());
    }

    #[test]
    fn emitted_length_tracks_number_width() {
        let track = FixtureTrack::new(44100, 2, 16).block_sizes(&[4096]);
        let bytes = track.to_bytes();
        let (info, frames) = parse_single_frame(&bytes);
        let (rest, frame) = parser::frame::<VerboseError<&[u8]>>(&info, true)(&frames)
            .expect("unexpected parse error");
        let src = &frames[..frames.len() - rest.len()];
        assert_eq!(frame.header().number_width(), 1);

        // a one-byte number stays one byte.
        let mut sink = Vec::new();
        let emitted = rewrite_frame(src, frame.header(), 127, &mut sink).unwrap();
        assert_eq!(emitted, src.len());

        // a five-byte number grows the frame by four bytes.
        let mut sink = Vec::new();
        let emitted = rewrite_frame(src, frame.header(), 1 << 25, &mut sink).unwrap();
        assert_eq!(emitted, src.len() + 4);
    }

    #[test]
    fn payload_is_copied_verbatim() {
        let track = FixtureTrack::new(44100, 2, 16).block_sizes(&[1000]);
        let bytes = track.to_bytes();
        let (info, frames) = parse_single_frame(&bytes);
        let (rest, frame) = parser::frame::<VerboseError<&[u8]>>(&info, true)(&frames)
            .expect("unexpected parse error");
        let src = &frames[..frames.len() - rest.len()];

        let mut sink = Vec::new();
        rewrite_frame(src, frame.header(), 0, &mut sink).unwrap();

        let old_width = frame.header().number_width();
        let additional = optional_field_bytes(src[2]);
        let payload_start = 4 + old_width + additional + 1;
        assert_eq!(
            &src[payload_start..src.len() - 2],
            &sink[payload_start..sink.len() - 2],
        );
    }

    #[test]
    fn rejects_oversized_sample_index() {
        let track = FixtureTrack::new(44100, 2, 16).block_sizes(&[4096]);
        let bytes = track.to_bytes();
        let (info, frames) = parse_single_frame(&bytes);
        let (rest, frame) = parser::frame::<VerboseError<&[u8]>>(&info, true)(&frames)
            .expect("unexpected parse error");
        let src = &frames[..frames.len() - rest.len()];

        let mut sink = Vec::new();
        let err = rewrite_frame(src, frame.header(), 1u64 << 36, &mut sink);
        assert!(matches!(err, Err(MergeError::Range(_))));
    }

    #[test]
    fn rejects_truncated_source() {
        let track = FixtureTrack::new(44100, 2, 16).block_sizes(&[4096]);
        let bytes = track.to_bytes();
        let (info, frames) = parse_single_frame(&bytes);
        let (rest, frame) = parser::frame::<VerboseError<&[u8]>>(&info, true)(&frames)
            .expect("unexpected parse error");
        let src = &frames[..frames.len() - rest.len()];

        let mut sink = Vec::new();
        let err = rewrite_frame(&src[..3], frame.header(), 0, &mut sink);
        assert!(matches!(err, Err(MergeError::Truncated(_))));
    }
}
