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

//! Output assembly: metadata prefix plus the rewritten frame stream.
//!
//! The emitted block sequence is STREAMINFO, SEEKTABLE (when non-empty),
//! PICTURE (when a front cover was found), then a PADDING block sized so the
//! first audio frame lands on a configured byte alignment.

use std::io::Read;
use std::io::Write;

use crate::album::MergedAlbum;
use crate::bitsink::BitSink;
use crate::bitsink::ByteSink;
use crate::config;
use crate::constant::block_type;
use crate::constant::SEEK_POINT_BYTES;
use crate::constant::STREAM_INFO_BYTES;
use crate::error::MergeError;
use crate::meta::Picture;
use crate::meta::SeekPoint;
use crate::meta::StreamInfo;

/// Writes a 4-byte metadata block header.
fn block_header(sink: &mut ByteSink, is_last: bool, typetag: u8, length: usize) {
    sink.write_lsbs(u8::from(is_last), 1);
    sink.write_lsbs(typetag, 7);
    sink.write_lsbs(length as u32, 24);
}

fn stream_info_block(sink: &mut ByteSink, info: &StreamInfo) {
    block_header(sink, false, block_type::STREAM_INFO, STREAM_INFO_BYTES);
    sink.write::<u16>(info.min_block_size() as u16);
    sink.write::<u16>(info.max_block_size() as u16);
    sink.write_lsbs(info.min_frame_size() as u32, 24);
    sink.write_lsbs(info.max_frame_size() as u32, 24);
    sink.write_lsbs(info.sample_rate() as u32, 20);
    sink.write_lsbs((info.channels() - 1) as u8, 3);
    sink.write_lsbs((info.bits_per_sample() - 1) as u8, 5);
    sink.write_lsbs(info.total_samples(), 36);
    sink.write_bytes_aligned(info.md5_digest());
}

fn seek_table_block(sink: &mut ByteSink, points: &[SeekPoint]) {
    block_header(
        sink,
        false,
        block_type::SEEK_TABLE,
        SEEK_POINT_BYTES * points.len(),
    );
    for p in points {
        sink.write::<u64>(p.sample);
        sink.write::<u64>(p.offset);
        sink.write::<u16>(p.frame_samples);
    }
}

fn picture_block(sink: &mut ByteSink, picture: &Picture) {
    // The block length is the serialized field sum; the parsed block's own
    // length is never reused.
    block_header(sink, false, block_type::PICTURE, picture.serialized_len());
    sink.write::<u32>(picture.picture_type);
    sink.write::<u32>(picture.mime.len() as u32);
    sink.write_bytes_aligned(picture.mime.as_bytes());
    sink.write::<u32>(picture.description.len() as u32);
    sink.write_bytes_aligned(picture.description.as_bytes());
    sink.write::<u32>(picture.width);
    sink.write::<u32>(picture.height);
    sink.write::<u32>(picture.depth);
    sink.write::<u32>(picture.palette_size);
    sink.write::<u32>(picture.data.len() as u32);
    sink.write_bytes_aligned(&picture.data);
}

/// Renders the metadata prefix (signature included) for the merged stream.
///
/// The length of the returned buffer is always a multiple of the configured
/// frame alignment.
pub fn metadata_prefix(album: &MergedAlbum, config: &config::Merge) -> Vec<u8> {
    let mut sink = ByteSink::new();
    sink.write_bytes_aligned(b"fLaC");
    stream_info_block(&mut sink, &album.stream_info);
    if !album.seek_table.is_empty() {
        seek_table_block(&mut sink, &album.seek_table);
    }
    if let Some(ref picture) = album.picture {
        picture_block(&mut sink, picture);
    }

    // Padding block sized so the first frame starts on the alignment
    // boundary. The pad is in 1..=alignment: a block header always precedes
    // the frames even when the prefix already aligns.
    let offset = (sink.len() / 8) as u64;
    let alignment = config.frame_alignment;
    let pad = alignment - ((offset + 4) & (alignment - 1));
    block_header(&mut sink, true, block_type::PADDING, pad as usize);
    let mut bytes = sink.into_inner();
    bytes.resize(bytes.len() + pad as usize, 0u8);
    bytes
}

/// Writes the complete output: metadata prefix, then the frame sink copied
/// through.
///
/// Returns the total number of bytes written.
///
/// # Errors
///
/// Returns [`MergeError::Io`] when reading the frame sink or writing the
/// output fails.
pub fn write_stream<R: Read, W: Write>(
    album: &MergedAlbum,
    config: &config::Merge,
    frames: &mut R,
    out: &mut W,
) -> Result<u64, MergeError> {
    let prefix = metadata_prefix(album, config);
    out.write_all(&prefix)?;
    let copied = std::io::copy(frames, out)?;
    Ok(prefix.len() as u64 + copied)
}
