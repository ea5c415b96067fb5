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

//! Types and parsers for the metadata prefix of a FLAC stream.

use nom::bits::bits;
use nom::bits::streaming::take as bit_take;
use nom::bytes::streaming::tag as byte_tag;
use nom::bytes::streaming::take as byte_take;
use nom::error::ParseError;
use nom::error_position;
use nom::number::streaming::be_u16;
use nom::number::streaming::be_u24;
use nom::number::streaming::be_u32;
use nom::number::streaming::be_u64;
use nom::number::streaming::be_u8;
use nom::number::streaming::le_u32;
use nom::IResult;

use crate::constant::block_type;
use crate::constant::FRONT_COVER_PICTURE;
use crate::constant::MAX_BITS_PER_SAMPLE;
use crate::constant::MAX_CHANNELS;
use crate::constant::MIN_BITS_PER_SAMPLE;
use crate::constant::PLACEHOLDER_SEEK_POINT;
use crate::constant::SAMPLE_RATE_LIMIT;
use crate::constant::SEEK_POINT_BYTES;
use crate::error::verify_range;
use crate::error::verify_true;
use crate::error::Verify;
use crate::error::VerifyError;

type BitInput<'a> = (&'a [u8], usize);

/// `STREAMINFO` metadata, as parsed from an input or aggregated for the
/// output.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StreamInfo {
    min_block_size: u16, // 16 bits: Minimum block size in samples.
    max_block_size: u16, // 16 bits: Maximum block size in samples.
    min_frame_size: u32, // 24 bits: Minimum frame size in bytes.
    max_frame_size: u32, // 24 bits: Maximum frame size in bytes.
    sample_rate: u32,    // 20 bits: Sample rate in Hz.
    channels: u8,        // 3 bits: will be written with a bias (-1)
    bits_per_sample: u8, // 5 bits: will be written with a bias (-1)
    total_samples: u64,  // 36 bits: Can be zero (unknown)
    md5: [u8; 16],
}

impl StreamInfo {
    /// Constructs new `StreamInfo`.
    ///
    /// For unspecified fields, the following default values are used:
    ///
    /// -  `min_block_size`: [`u16::MAX`],
    /// -  `max_block_size`: `0`,
    /// -  `min_frame_size`: [`u32::MAX`],
    /// -  `max_frame_size`: `0`,
    /// -  `total_samples`: `0`,
    /// -  `md5`: `[0u8; 16]` (indicating verification disabled.)
    ///
    /// # Errors
    ///
    /// Returns an error if an input argument is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// # use flacmerge::meta::StreamInfo;
    /// let info = StreamInfo::new(44100, 2, 16).unwrap();
    /// assert_eq!(info.max_frame_size(), 0);
    /// assert!(StreamInfo::new(1 << 20, 2, 16).is_err());
    /// ```
    pub fn new(
        sample_rate: usize,
        channels: usize,
        bits_per_sample: usize,
    ) -> Result<Self, VerifyError> {
        let ret = Self {
            min_block_size: u16::MAX,
            max_block_size: 0,
            min_frame_size: u32::MAX,
            max_frame_size: 0,
            sample_rate: sample_rate as u32,
            channels: channels as u8,
            bits_per_sample: bits_per_sample as u8,
            total_samples: 0,
            md5: [0; 16],
        };
        ret.verify()?;
        Ok(ret)
    }

    /// Returns the minimum frame size in bytes.
    #[inline]
    pub fn min_frame_size(&self) -> usize {
        self.min_frame_size as usize
    }

    /// Returns the maximum frame size in bytes.
    #[inline]
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size as usize
    }

    /// Returns the minimum block size in samples.
    #[inline]
    pub fn min_block_size(&self) -> usize {
        self.min_block_size as usize
    }

    /// Returns the maximum block size in samples.
    #[inline]
    pub fn max_block_size(&self) -> usize {
        self.max_block_size as usize
    }

    /// Returns sampling rate of the stream.
    #[inline]
    pub fn sample_rate(&self) -> usize {
        self.sample_rate as usize
    }

    /// Returns the number of channels of the stream.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels as usize
    }

    /// Returns bits-per-sample of the stream.
    #[inline]
    pub fn bits_per_sample(&self) -> usize {
        self.bits_per_sample as usize
    }

    /// Returns the number of inter-channel samples of the stream.
    #[inline]
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Sets the number of inter-channel samples.
    #[inline]
    pub fn set_total_samples(&mut self, n: u64) {
        self.total_samples = n;
    }

    /// Returns md5 digest of the decoded waveform.
    #[inline]
    pub fn md5_digest(&self) -> &[u8; 16] {
        &self.md5
    }

    /// Resets MD5 digest value by the given slice.
    pub fn set_md5_digest(&mut self, digest: &[u8; 16]) {
        self.md5.copy_from_slice(digest);
    }

    /// Resets the minimum/ maximum block sizes.
    pub fn set_block_sizes(&mut self, min_value: u16, max_value: u16) {
        self.min_block_size = min_value;
        self.max_block_size = max_value;
    }

    /// Resets the minimum/ maximum frame sizes.
    pub fn set_frame_sizes(&mut self, min_value: u32, max_value: u32) {
        self.min_frame_size = min_value;
        self.max_frame_size = max_value;
    }
}

impl Verify for StreamInfo {
    fn verify(&self) -> Result<(), VerifyError> {
        verify_range!("sample_rate", self.sample_rate as usize, 1..)?;
        verify_range!(
            "sample_rate",
            self.sample_rate as usize,
            ..(SAMPLE_RATE_LIMIT as usize)
        )?;
        verify_range!("channels", self.channels as usize, 1..=MAX_CHANNELS)?;
        verify_range!(
            "bits_per_sample",
            self.bits_per_sample as usize,
            MIN_BITS_PER_SAMPLE..=MAX_BITS_PER_SAMPLE
        )
    }
}

/// One entry of a `SEEKTABLE` metadata block.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SeekPoint {
    /// Sample number of the first sample in the target frame, or
    /// [`PLACEHOLDER_SEEK_POINT`] for an unused entry.
    pub sample: u64,
    /// Offset in bytes from the first byte of the first frame header to the
    /// first byte of the target frame's header.
    pub offset: u64,
    /// Number of samples in the target frame.
    pub frame_samples: u16,
}

impl SeekPoint {
    /// Returns true when this is an unused table entry.
    #[inline]
    pub const fn is_placeholder(&self) -> bool {
        self.sample == PLACEHOLDER_SEEK_POINT
    }
}

/// `VORBIS_COMMENT` metadata: vendor string and tag pairs.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VorbisComment {
    vendor: String,
    comments: Vec<(String, String)>,
}

impl VorbisComment {
    /// Constructs `VorbisComment` from parts.
    pub fn from_parts(vendor: String, comments: Vec<(String, String)>) -> Self {
        Self { vendor, comments }
    }

    /// Returns the vendor string.
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    /// Returns the value of the first comment with the given (ASCII
    /// case-insensitive) name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use flacmerge::meta::VorbisComment;
    /// let c = VorbisComment::from_parts(
    ///     "vendor".to_owned(),
    ///     vec![("Title".to_owned(), "Intro".to_owned())],
    /// );
    /// assert_eq!(c.tag("TITLE"), Some("Intro"));
    /// assert_eq!(c.tag("ARTIST"), None);
    /// ```
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.comments
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns all comment pairs in file order.
    pub fn comments(&self) -> &[(String, String)] {
        &self.comments
    }
}

/// `PICTURE` metadata block contents.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Picture {
    /// Picture type tag (3 = front cover).
    pub picture_type: u32,
    /// MIME type string.
    pub mime: String,
    /// Description string.
    pub description: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Color depth in bits per pixel.
    pub depth: u32,
    /// Number of palette colors (0 for non-indexed images).
    pub palette_size: u32,
    /// The image data.
    pub data: Vec<u8>,
}

impl Picture {
    /// Returns true when the picture is tagged as a front cover.
    #[inline]
    pub fn is_front_cover(&self) -> bool {
        self.picture_type == FRONT_COVER_PICTURE
    }

    /// Returns the number of bytes the canonical serialization of `self`
    /// occupies.
    pub fn serialized_len(&self) -> usize {
        32 + self.mime.len() + self.description.len() + self.data.len()
    }
}

/// A metadata block: its body plus the last-block marker.
#[derive(Clone, Debug)]
pub struct MetadataBlock {
    /// Set on the final block of the metadata prefix.
    pub is_last: bool,
    /// The block body.
    pub data: MetadataBlockData,
}

/// Enum that covers the variants of a metadata block this crate consumes.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum MetadataBlockData {
    /// `STREAMINFO` block.
    StreamInfo(StreamInfo),
    /// `SEEKTABLE` block.
    SeekTable(Vec<SeekPoint>),
    /// `VORBIS_COMMENT` block.
    VorbisComment(VorbisComment),
    /// `PICTURE` block.
    Picture(Picture),
    /// Any other block, carried as an opaque blob.
    Unknown {
        /// 7-bit metadata type tag.
        typetag: u8,
        /// Block contents.
        data: Vec<u8>,
    },
}

impl MetadataBlockData {
    /// Obtain inner [`StreamInfo`] if `self` contains `StreamInfo`.
    pub fn as_stream_info(&self) -> Option<&StreamInfo> {
        if let Self::StreamInfo(ref info) = self {
            Some(info)
        } else {
            None
        }
    }
}

pub(crate) fn convert_bits_err<'a, E>(e: nom::Err<(&'a [u8], nom::error::ErrorKind)>) -> nom::Err<E>
where
    E: ParseError<&'a [u8]>,
{
    e.map(|(inp, kind)| E::from_error_kind(inp, kind))
}

/// Recognizes the metadata prefix of a FLAC stream.
///
/// Consumes the `"fLaC"` signature, the leading `STREAMINFO`, and every
/// following metadata block, leaving the input positioned at the first byte
/// of the first frame.
///
/// # Errors
///
/// Same as other nom parsers, this returns [`nom::Err`] if `input` doesn't
/// conform to the format.
pub fn stream_prefix<'a, E>(
    input: &'a [u8],
) -> IResult<&'a [u8], (StreamInfo, Vec<MetadataBlock>), E>
where
    E: ParseError<&'a [u8]>,
{
    let remaining_input = input;
    let (remaining_input, _) = byte_tag("fLaC")(remaining_input)?;
    let (remaining_input, stream_info_block) = metadata_block(remaining_input)?;
    let stream_info = stream_info_block
        .data
        .as_stream_info()
        .ok_or_else(|| nom::Err::Error(error_position!(input, nom::error::ErrorKind::Verify)))?
        .clone();

    let mut is_last = stream_info_block.is_last;
    let mut blocks = vec![];
    let mut remaining_input = remaining_input;
    while !is_last {
        let (i, b) = metadata_block(remaining_input)?;
        is_last = b.is_last;
        remaining_input = i;
        blocks.push(b);
    }

    Ok((remaining_input, (stream_info, blocks)))
}

/// Recognizes a [`MetadataBlock`].
///
/// # Errors
///
/// Same as other nom parsers, this returns [`nom::Err`] if `input` doesn't
/// conform to the format.
pub fn metadata_block<'a, E>(input: &'a [u8]) -> IResult<&'a [u8], MetadataBlock, E>
where
    E: ParseError<&'a [u8]>,
{
    let remaining_input = input;
    let (remaining_input, first_byte) = be_u8(remaining_input)?;
    let is_last = (first_byte >> 7) != 0;
    let tag = first_byte & 0x7F;
    let (remaining_input, length) = be_u24(remaining_input)?;

    let (remaining_input, body) = match tag {
        block_type::STREAM_INFO => {
            let (i, info) = stream_info(remaining_input)?;
            (i, MetadataBlockData::StreamInfo(info))
        }
        block_type::SEEK_TABLE => {
            let (i, points) = seek_table(length)(remaining_input)?;
            (i, MetadataBlockData::SeekTable(points))
        }
        block_type::VORBIS_COMMENT => {
            let (i, blob) = byte_take(length)(remaining_input)?;
            let (_, comment) = vorbis_comment_body::<E>(blob).map_err(|_e| {
                nom::Err::Error(error_position!(
                    remaining_input,
                    nom::error::ErrorKind::Verify
                ))
            })?;
            (i, MetadataBlockData::VorbisComment(comment))
        }
        block_type::PICTURE => {
            let (i, blob) = byte_take(length)(remaining_input)?;
            let (_, picture) = picture_body::<E>(blob).map_err(|_e| {
                nom::Err::Error(error_position!(
                    remaining_input,
                    nom::error::ErrorKind::Verify
                ))
            })?;
            (i, MetadataBlockData::Picture(picture))
        }
        _ => {
            let (i, blob) = byte_take(length)(remaining_input)?;
            (
                i,
                MetadataBlockData::Unknown {
                    typetag: tag,
                    data: blob.to_owned(),
                },
            )
        }
    };
    Ok((remaining_input, MetadataBlock { is_last, data: body }))
}

/// Recognizes a [`StreamInfo`].
///
/// # Errors
///
/// Same as other nom parsers, this returns [`nom::Err`] if `input` doesn't
/// conform to the format.
pub fn stream_info<'a, E>(input: &'a [u8]) -> IResult<&'a [u8], StreamInfo, E>
where
    E: ParseError<&'a [u8]>,
{
    let remaining_input = input;
    let (remaining_input, min_block_size) = be_u16(remaining_input)?;
    let (remaining_input, max_block_size) = be_u16(remaining_input)?;
    let (remaining_input, min_frame_size) = be_u24(remaining_input)?;
    let (remaining_input, max_frame_size) = be_u24(remaining_input)?;
    let (remaining_input, (sample_rate, channels, bits_per_sample, total_samples)) =
        bits(|input| {
            let remaining_input = input;
            let (remaining_input, sr): (_, usize) = bit_take(20usize)(remaining_input)?;
            let (remaining_input, ch): (_, usize) = bit_take(3usize)(remaining_input)?;
            let (remaining_input, bps): (_, usize) = bit_take(5usize)(remaining_input)?;
            let (remaining_input, total): (_, u64) = bit_take(36usize)(remaining_input)?;
            let ret: IResult<_, _, (BitInput<'a>, nom::error::ErrorKind)> =
                Ok((remaining_input, (sr, ch + 1, bps + 1, total)));
            ret
        })(remaining_input)
        .map_err(convert_bits_err)?;
    let (remaining_input, md5) = byte_take(16usize)(remaining_input)?;

    let mut info = StreamInfo::new(sample_rate, channels, bits_per_sample).map_err(|_e| {
        nom::Err::Error(error_position!(
            remaining_input,
            nom::error::ErrorKind::Verify
        ))
    })?;
    info.set_total_samples(total_samples);
    info.set_md5_digest(md5.try_into().expect("md5 slice must be 16 bytes"));
    info.set_block_sizes(min_block_size, max_block_size);
    info.set_frame_sizes(min_frame_size, max_frame_size);
    Ok((remaining_input, info))
}

/// Recognizes a `SEEKTABLE` body of the given byte length.
fn seek_table<'a, E>(length: u32) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], Vec<SeekPoint>, E>
where
    E: ParseError<&'a [u8]>,
{
    move |input| {
        if length as usize % SEEK_POINT_BYTES != 0 {
            return Err(nom::Err::Error(error_position!(
                input,
                nom::error::ErrorKind::Verify
            )));
        }
        let count = length as usize / SEEK_POINT_BYTES;
        let mut points = Vec::with_capacity(count);
        let mut remaining_input = input;
        for _ in 0..count {
            let (i, sample) = be_u64(remaining_input)?;
            let (i, offset) = be_u64(i)?;
            let (i, frame_samples) = be_u16(i)?;
            remaining_input = i;
            points.push(SeekPoint {
                sample,
                offset,
                frame_samples,
            });
        }
        Ok((remaining_input, points))
    }
}

/// Recognizes a `VORBIS_COMMENT` body.
///
/// Length framing inside the block is little-endian. Entries without a `=`
/// separator are skipped.
fn vorbis_comment_body<'a, E>(input: &'a [u8]) -> IResult<&'a [u8], VorbisComment, E>
where
    E: ParseError<&'a [u8]>,
{
    let remaining_input = input;
    let (remaining_input, vendor_len) = le_u32(remaining_input)?;
    let (remaining_input, vendor) = byte_take(vendor_len)(remaining_input)?;
    let (remaining_input, count) = le_u32(remaining_input)?;

    let mut comments = Vec::new();
    let mut remaining_input = remaining_input;
    for _ in 0..count {
        let (i, entry_len) = le_u32(remaining_input)?;
        let (i, entry) = byte_take(entry_len)(i)?;
        remaining_input = i;
        let entry = String::from_utf8_lossy(entry);
        if let Some((name, value)) = entry.split_once('=') {
            comments.push((name.to_owned(), value.to_owned()));
        }
    }
    Ok((
        remaining_input,
        VorbisComment::from_parts(String::from_utf8_lossy(vendor).into_owned(), comments),
    ))
}

/// Recognizes a `PICTURE` body.
fn picture_body<'a, E>(input: &'a [u8]) -> IResult<&'a [u8], Picture, E>
where
    E: ParseError<&'a [u8]>,
{
    let remaining_input = input;
    let (remaining_input, picture_type) = be_u32(remaining_input)?;
    let (remaining_input, mime_len) = be_u32(remaining_input)?;
    let (remaining_input, mime) = byte_take(mime_len)(remaining_input)?;
    let (remaining_input, desc_len) = be_u32(remaining_input)?;
    let (remaining_input, description) = byte_take(desc_len)(remaining_input)?;
    let (remaining_input, width) = be_u32(remaining_input)?;
    let (remaining_input, height) = be_u32(remaining_input)?;
    let (remaining_input, depth) = be_u32(remaining_input)?;
    let (remaining_input, palette_size) = be_u32(remaining_input)?;
    let (remaining_input, data_len) = be_u32(remaining_input)?;
    let (remaining_input, data) = byte_take(data_len)(remaining_input)?;

    Ok((
        remaining_input,
        Picture {
            picture_type,
            mime: String::from_utf8_lossy(mime).into_owned(),
            description: String::from_utf8_lossy(description).into_owned(),
            width,
            height,
            depth,
            palette_size,
            data: data.to_owned(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    use nom::error::VerboseError;

    use crate::bitsink::BitSink;
    use crate::bitsink::ByteSink;

    fn stream_info_bytes(info: &StreamInfo) -> Vec<u8> {
        let mut sink = ByteSink::new();
        sink.write::<u16>(info.min_block_size() as u16);
        sink.write::<u16>(info.max_block_size() as u16);
        sink.write_lsbs(info.min_frame_size() as u32, 24);
        sink.write_lsbs(info.max_frame_size() as u32, 24);
        sink.write_lsbs(info.sample_rate() as u32, 20);
        sink.write_lsbs((info.channels() - 1) as u8, 3);
        sink.write_lsbs((info.bits_per_sample() - 1) as u8, 5);
        sink.write_lsbs(info.total_samples(), 36);
        sink.write_bytes_aligned(info.md5_digest());
        sink.into_inner()
    }

    #[test]
    fn stream_info_roundtrip() {
        let mut info = StreamInfo::new(44100, 2, 16).unwrap();
        info.set_block_sizes(1024, 4096);
        info.set_frame_sizes(123, 4567);
        info.set_total_samples(9_876_543);
        info.set_md5_digest(&[0xAB; 16]);

        let bytes = stream_info_bytes(&info);
        assert_eq!(bytes.len(), crate::constant::STREAM_INFO_BYTES);
        let (rest, decoded) =
            stream_info::<VerboseError<&[u8]>>(&bytes).expect("unexpected parse error");
        assert!(rest.is_empty());
        assert_eq!(decoded, info);
    }

    #[test]
    fn stream_info_rejects_out_of_range_rate() {
        let mut info = StreamInfo::new(44100, 2, 16).unwrap();
        // Forge a 2^20-1 rate; anything above is unencodable in 20 bits and
        // `new` already rejects it.
        info.sample_rate = SAMPLE_RATE_LIMIT - 1;
        assert!(info.verify().is_ok());
        info.sample_rate = SAMPLE_RATE_LIMIT;
        assert!(info.verify().is_err());
    }

    #[test]
    fn vorbis_comment_parsing() {
        let mut body = Vec::new();
        let vendor = b"reference libFLAC 1.3.2";
        body.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        body.extend_from_slice(vendor);
        body.extend_from_slice(&3u32.to_le_bytes());
        for entry in ["TITLE=Intro", "artist=Someone", "DATE=2001=remaster"] {
            body.extend_from_slice(&(entry.len() as u32).to_le_bytes());
            body.extend_from_slice(entry.as_bytes());
        }

        let (_, comment) =
            vorbis_comment_body::<VerboseError<&[u8]>>(&body).expect("unexpected parse error");
        assert_eq!(comment.vendor(), "reference libFLAC 1.3.2");
        assert_eq!(comment.tag("title"), Some("Intro"));
        assert_eq!(comment.tag("ARTIST"), Some("Someone"));
        // split happens at the first '='.
        assert_eq!(comment.tag("Date"), Some("2001=remaster"));
        assert_eq!(comment.tag("GENRE"), None);
    }

    #[test]
    fn picture_parsing() {
        let mut body = Vec::new();
        body.extend_from_slice(&3u32.to_be_bytes());
        body.extend_from_slice(&10u32.to_be_bytes());
        body.extend_from_slice(b"image/jpeg");
        body.extend_from_slice(&5u32.to_be_bytes());
        body.extend_from_slice(b"cover");
        for v in [600u32, 600, 24, 0] {
            body.extend_from_slice(&v.to_be_bytes());
        }
        body.extend_from_slice(&4u32.to_be_bytes());
        body.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

        let (rest, picture) =
            picture_body::<VerboseError<&[u8]>>(&body).expect("unexpected parse error");
        assert!(rest.is_empty());
        assert!(picture.is_front_cover());
        assert_eq!(picture.mime, "image/jpeg");
        assert_eq!(picture.description, "cover");
        assert_eq!(picture.width, 600);
        assert_eq!(picture.data, &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(picture.serialized_len(), body.len());
    }

    #[test]
    fn seek_table_parsing() {
        let mut block = Vec::new();
        for (sample, offset, n) in [(0u64, 0u64, 4096u16), (441000, 123456, 4096)] {
            block.extend_from_slice(&sample.to_be_bytes());
            block.extend_from_slice(&offset.to_be_bytes());
            block.extend_from_slice(&n.to_be_bytes());
        }
        block.extend_from_slice(&PLACEHOLDER_SEEK_POINT.to_be_bytes());
        block.extend_from_slice(&[0u8; 10]);

        let (rest, points) = seek_table::<VerboseError<&[u8]>>(block.len() as u32)(&block)
            .expect("unexpected parse error");
        assert!(rest.is_empty());
        assert_eq!(points.len(), 3);
        assert_eq!(points[1].sample, 441000);
        assert!(points[2].is_placeholder());
        assert!(!points[0].is_placeholder());
    }

    #[test]
    fn prefix_parsing() {
        let mut stream = Vec::new();
        stream.extend_from_slice(b"fLaC");
        let info = StreamInfo::new(48000, 1, 24).unwrap();
        // STREAMINFO header with last-flag unset, then an unknown block with
        // the last flag.
        stream.extend_from_slice(&[0x00, 0x00, 0x00, 34]);
        stream.extend_from_slice(&stream_info_bytes(&info));
        stream.extend_from_slice(&[0x80 | 0x02, 0x00, 0x00, 0x03]);
        stream.extend_from_slice(&[0x01, 0x02, 0x03]);
        stream.extend_from_slice(&[0xFF, 0xF8]); // frame region begins

        let (rest, (decoded, blocks)) =
            stream_prefix::<VerboseError<&[u8]>>(&stream).expect("unexpected parse error");
        assert_eq!(rest, &[0xFF, 0xF8]);
        assert_eq!(decoded, info);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].is_last);
        assert!(matches!(
            blocks[0].data,
            MetadataBlockData::Unknown { typetag: 2, .. }
        ));
    }

    #[test]
    fn signature_mismatch_is_error() {
        assert!(stream_prefix::<VerboseError<&[u8]>>(b"fLaX....").is_err());
    }
}
