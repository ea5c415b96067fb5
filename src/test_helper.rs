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

//! Test utility: synthesizes well-formed FLAC inputs byte-exactly.
//!
//! Fixtures use constant subframes only, which keeps them tiny while still
//! exercising headers, checksums, optional block-size bytes, tags, and
//! pictures.

use md5::Digest;
use md5::Md5;

use crate::bitsink::BitSink;
use crate::bitsink::ByteSink;
use crate::constant::block_type;
use crate::frame::BlockSizeSpec;
use crate::frame::ChannelAssignment;
use crate::rewrite::FRAME_CRC;
use crate::rewrite::HEADER_CRC;
use crate::varint;

/// Builder for one synthetic FLAC input.
#[derive(Clone, Debug)]
pub struct FixtureTrack {
    sample_rate: u32,
    channels: u8,
    bits_per_sample: u8,
    block_sizes: Vec<u16>,
    dc_offsets: Vec<i32>,
    variable_blocking: bool,
    title: Option<String>,
    album: Option<String>,
    artist: Option<String>,
    date: Option<String>,
    genre: Option<String>,
    pictures: Vec<(u32, Vec<u8>)>,
}

impl FixtureTrack {
    /// Starts a fixture with one 4096-sample frame and no tags.
    pub fn new(sample_rate: u32, channels: u8, bits_per_sample: u8) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
            block_sizes: vec![4096],
            dc_offsets: vec![],
            variable_blocking: false,
            title: None,
            album: None,
            artist: None,
            date: None,
            genre: None,
            pictures: vec![],
        }
    }

    /// Sets the per-frame block sizes (one frame per entry).
    #[must_use]
    pub fn block_sizes(mut self, sizes: &[u16]) -> Self {
        self.block_sizes = sizes.to_vec();
        self
    }

    /// Sets the constant sample values, cycled over the frames.
    #[must_use]
    pub fn dc_offsets(mut self, offsets: &[i32]) -> Self {
        self.dc_offsets = offsets.to_vec();
        self
    }

    /// Switches the fixture's frames to variable-blocking numbering.
    #[must_use]
    pub fn variable_blocking(mut self, on: bool) -> Self {
        self.variable_blocking = on;
        self
    }

    /// Sets the TITLE tag.
    #[must_use]
    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_owned());
        self
    }

    /// Sets the album-level tags.
    #[must_use]
    pub fn album_tags(mut self, album: &str, artist: &str, date: &str, genre: &str) -> Self {
        self.album = Some(album.to_owned());
        self.artist = Some(artist.to_owned());
        self.date = Some(date.to_owned());
        self.genre = Some(genre.to_owned());
        self
    }

    /// Adds a picture block with the given type tag.
    #[must_use]
    pub fn picture(mut self, picture_type: u32, data: &[u8]) -> Self {
        self.pictures.push((picture_type, data.to_vec()));
        self
    }

    fn frame_dc(&self, index: usize) -> i32 {
        if self.dc_offsets.is_empty() {
            (index as i32) * 3 - 7
        } else {
            self.dc_offsets[index % self.dc_offsets.len()]
        }
    }

    /// Returns the decoded interleaved PCM of the whole fixture.
    pub fn pcm(&self) -> Vec<i32> {
        let mut out = vec![];
        for (i, bs) in self.block_sizes.iter().enumerate() {
            let dc = self.frame_dc(i);
            out.extend(std::iter::repeat(dc).take(*bs as usize * self.channels as usize));
        }
        out
    }

    fn stream_info_payload(&self) -> Vec<u8> {
        let total: u64 = self.block_sizes.iter().map(|b| u64::from(*b)).sum();
        let mut md5 = Md5::new();
        let bytes_per_sample = (self.bits_per_sample as usize + 7) / 8;
        for v in self.pcm() {
            md5.update(&v.to_le_bytes()[0..bytes_per_sample]);
        }
        let digest: [u8; 16] = md5.finalize().into();

        let mut sink = ByteSink::new();
        sink.write::<u16>(*self.block_sizes.iter().min().unwrap());
        sink.write::<u16>(*self.block_sizes.iter().max().unwrap());
        sink.write_lsbs(0u32, 24); // frame sizes unknown
        sink.write_lsbs(0u32, 24);
        sink.write_lsbs(self.sample_rate, 20);
        sink.write_lsbs(self.channels - 1, 3);
        sink.write_lsbs(self.bits_per_sample - 1, 5);
        sink.write_lsbs(total, 36);
        sink.write_bytes_aligned(&digest);
        sink.into_inner()
    }

    fn vorbis_comment_payload(&self) -> Option<Vec<u8>> {
        let mut entries = vec![];
        for (name, value) in [
            ("ALBUM", &self.album),
            ("ARTIST", &self.artist),
            ("DATE", &self.date),
            ("GENRE", &self.genre),
            ("TITLE", &self.title),
        ] {
            if let Some(value) = value {
                entries.push(format!("{name}={value}"));
            }
        }
        if entries.is_empty() {
            return None;
        }

        let vendor = b"flacmerge fixture";
        let mut out = vec![];
        out.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        out.extend_from_slice(vendor);
        out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        for entry in entries {
            out.extend_from_slice(&(entry.len() as u32).to_le_bytes());
            out.extend_from_slice(entry.as_bytes());
        }
        Some(out)
    }

    fn picture_payload(picture_type: u32, data: &[u8]) -> Vec<u8> {
        let mime = b"image/png";
        let mut out = vec![];
        out.extend_from_slice(&picture_type.to_be_bytes());
        out.extend_from_slice(&(mime.len() as u32).to_be_bytes());
        out.extend_from_slice(mime);
        out.extend_from_slice(&0u32.to_be_bytes()); // empty description
        for v in [16u32, 16, 24, 0] {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(data);
        out
    }

    fn frame_bytes(&self, index: usize, start_sample: u64) -> Vec<u8> {
        let block_size = self.block_sizes[index];
        let spec = BlockSizeSpec::from_size(block_size);
        let assignment = ChannelAssignment::Independent(self.channels);

        let mut sink = ByteSink::new();
        sink.write_lsbs(0x7FFCu16, 15); // sync code
        sink.write_lsbs(u8::from(self.variable_blocking), 1);
        sink.write_lsbs(spec.tag(), 4);
        sink.write_lsbs(0u8, 4); // sample rate from STREAMINFO
        sink.write_lsbs(assignment.tag(), 4);
        sink.write_lsbs(0u8, 3); // sample size from STREAMINFO
        sink.write_lsbs(0u8, 1); // reserved

        let number = if self.variable_blocking {
            start_sample
        } else {
            index as u64
        };
        sink.write_bytes_aligned(&varint::encode(number).expect("number must fit 36 bits"));
        spec.write_extra_bits(&mut sink);
        let crc8 = HEADER_CRC.checksum(sink.as_slice());
        sink.write_lsbs(crc8, 8);

        let dc = self.frame_dc(index);
        for _ch in 0..self.channels {
            sink.write_lsbs(0u8, 8); // constant subframe, no wasted bits
            sink.write_twoc(dc, self.bits_per_sample as usize);
        }
        sink.align_to_byte();
        let crc16 = FRAME_CRC.checksum(sink.as_slice());
        sink.write::<u16>(crc16);
        sink.into_inner()
    }

    /// Serializes the fixture into a complete FLAC stream.
    pub fn to_bytes(&self) -> Vec<u8> {
        let comment = self.vorbis_comment_payload();
        let mut blocks: Vec<(u8, Vec<u8>)> = vec![(
            block_type::STREAM_INFO,
            self.stream_info_payload(),
        )];
        if let Some(comment) = comment {
            blocks.push((block_type::VORBIS_COMMENT, comment));
        }
        for (picture_type, data) in &self.pictures {
            blocks.push((block_type::PICTURE, Self::picture_payload(*picture_type, data)));
        }

        let mut out = vec![];
        out.extend_from_slice(b"fLaC");
        let block_count = blocks.len();
        for (i, (typetag, payload)) in blocks.into_iter().enumerate() {
            let is_last = i + 1 == block_count;
            out.push(typetag | if is_last { 0x80 } else { 0x00 });
            out.extend_from_slice(&(payload.len() as u32).to_be_bytes()[1..4]);
            out.extend_from_slice(&payload);
        }

        let mut start_sample = 0u64;
        for i in 0..self.block_sizes.len() {
            out.extend_from_slice(&self.frame_bytes(i, start_sample));
            start_sample += u64::from(self.block_sizes[i]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_info_payload_size() {
        let track = FixtureTrack::new(44100, 2, 16);
        assert_eq!(
            track.stream_info_payload().len(),
            crate::constant::STREAM_INFO_BYTES
        );
    }

    #[test]
    fn pcm_length() {
        let track = FixtureTrack::new(44100, 2, 16).block_sizes(&[100, 200]);
        assert_eq!(track.pcm().len(), 2 * (100 + 200));
    }
}
