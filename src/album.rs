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

//! Album-level aggregation state.
//!
//! One `AlbumStats` value accumulates everything the output needs across the
//! inputs: the frozen stream parameters, frame statistics, the incremental
//! MD5 of the decoded audio, the generated seek table, the front cover, and
//! the tag/title data feeding the CUE sheet.

use md5::Digest;
use md5::Md5;

use crate::error::IncompatibleStreamError;
use crate::error::MergeError;
use crate::meta::Picture;
use crate::meta::SeekPoint;
use crate::meta::StreamInfo;
use crate::meta::VorbisComment;

/// Album-level tags, taken from the first input's Vorbis comment.
#[derive(Clone, Debug, Default)]
pub struct AlbumTags {
    /// ALBUM tag.
    pub album: Option<String>,
    /// ARTIST tag.
    pub artist: Option<String>,
    /// DATE tag.
    pub date: Option<String>,
    /// GENRE tag.
    pub genre: Option<String>,
}

/// One output track: its title and where it starts in the merged stream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrackTitle {
    /// TITLE tag of the source input; empty when untagged.
    pub title: String,
    /// First sample of the track in the merged stream.
    pub start_sample: u64,
}

/// Everything the output assembler and the CUE emitter need once all inputs
/// are drained.
#[derive(Debug)]
pub struct MergedAlbum {
    /// Aggregated STREAMINFO for the output.
    pub stream_info: StreamInfo,
    /// Generated seek table, strictly increasing in sample number.
    pub seek_table: Vec<SeekPoint>,
    /// Front cover of the first input, if any.
    pub picture: Option<Picture>,
    /// Album-level tags.
    pub tags: AlbumTags,
    /// Per-track titles with starting samples.
    pub titles: Vec<TrackTitle>,
    /// Number of frames written to the frame sink.
    pub total_frames: u64,
    /// Number of bytes written to the frame sink.
    pub total_bytes: u64,
}

/// Aggregation state threaded through the input driver.
#[derive(Debug)]
pub struct AlbumStats {
    // frozen from the first input.
    sample_rate: u32,
    channels: u8,
    bits_per_sample: u8,

    total_samples: u64,
    total_frames: u64,
    total_bytes: u64,

    block_size_min: u16,
    block_size_max: u16,
    frame_size_min: u32,
    frame_size_max: u32,

    md5: Md5,
    seek_table: Vec<SeekPoint>,
    picture: Option<Picture>,
    tags: AlbumTags,
    titles: Vec<TrackTitle>,
}

impl AlbumStats {
    /// Constructs the aggregate, freezing stream parameters from the first
    /// input's `STREAMINFO`.
    ///
    /// # Errors
    ///
    /// Returns an error when `info` carries out-of-range parameters.
    pub fn new(info: &StreamInfo) -> Result<Self, MergeError> {
        use crate::error::Verify;
        info.verify().map_err(|e| e.within("stream_info"))?;
        Ok(Self {
            sample_rate: info.sample_rate() as u32,
            channels: info.channels() as u8,
            bits_per_sample: info.bits_per_sample() as u8,
            total_samples: 0,
            total_frames: 0,
            total_bytes: 0,
            // Seeded past the representable extremes so the first emitted
            // frame establishes both bounds.
            block_size_min: u16::MAX,
            block_size_max: 0,
            frame_size_min: u32::MAX,
            frame_size_max: 0,
            md5: Md5::new(),
            seek_table: Vec::with_capacity(1024),
            picture: None,
            tags: AlbumTags::default(),
            titles: Vec::with_capacity(32),
        })
    }

    /// Returns the frozen sample rate.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of inter-channel samples aggregated so far.
    #[inline]
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Returns the number of bytes emitted so far. During a merge this is
    /// the offset of the next frame in the frame sink.
    #[inline]
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Checks a follow-up input against the frozen stream parameters.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Incompatible`] naming the first mismatching
    /// field.
    pub fn check_compatible(&self, info: &StreamInfo) -> Result<(), MergeError> {
        if info.sample_rate() != self.sample_rate as usize {
            return Err(MergeError::Incompatible(IncompatibleStreamError::new(
                "sample rate",
                self.sample_rate.into(),
                info.sample_rate() as u64,
            )));
        }
        if info.channels() != self.channels as usize {
            return Err(MergeError::Incompatible(IncompatibleStreamError::new(
                "number of channels",
                self.channels.into(),
                info.channels() as u64,
            )));
        }
        if info.bits_per_sample() != self.bits_per_sample as usize {
            return Err(MergeError::Incompatible(IncompatibleStreamError::new(
                "bits per sample",
                self.bits_per_sample.into(),
                info.bits_per_sample() as u64,
            )));
        }
        Ok(())
    }

    /// Opens a new track entry starting at the current end of the stream.
    pub fn begin_track(&mut self) {
        self.titles.push(TrackTitle {
            title: String::new(),
            start_sample: self.total_samples,
        });
    }

    /// Harvests tags from one input's Vorbis comment.
    ///
    /// Album/Artist/Date/Genre stick only from the first input; the Title
    /// lands in the track entry opened by the latest [`Self::begin_track`].
    pub fn harvest_comment(&mut self, comment: &VorbisComment, first_input: bool) {
        fn fill(slot: &mut Option<String>, value: Option<&str>) {
            if slot.is_none() {
                *slot = value.map(str::to_owned);
            }
        }
        if first_input {
            fill(&mut self.tags.album, comment.tag("ALBUM"));
            fill(&mut self.tags.artist, comment.tag("ARTIST"));
            fill(&mut self.tags.date, comment.tag("DATE"));
            fill(&mut self.tags.genre, comment.tag("GENRE"));
        }
        if let (Some(title), Some(last)) = (comment.tag("TITLE"), self.titles.last_mut()) {
            last.title = title.to_owned();
        }
    }

    /// Keeps the first front-cover picture of the first input.
    pub fn harvest_picture(&mut self, picture: &Picture, first_input: bool) {
        if first_input && self.picture.is_none() && picture.is_front_cover() {
            self.picture = Some(picture.clone());
        }
    }

    /// Feeds one frame's decoded PCM into the running MD5.
    ///
    /// Samples are interleaved and hashed in little-endian order truncated
    /// to the stream's bytes-per-sample, the canonical form decoders verify
    /// against.
    pub fn update_md5(&mut self, interleaved: &[i32]) {
        let bytes_per_sample = (self.bits_per_sample as usize + 7) / 8;
        for v in interleaved {
            self.md5.update(&v.to_le_bytes()[0..bytes_per_sample]);
        }
    }

    /// Appends a seek point unless the last one already addresses the same
    /// sample.
    pub fn push_seek_point(&mut self, sample: u64, offset: u64, frame_samples: u16) {
        if self.seek_table.last().map_or(false, |p| p.sample == sample) {
            return;
        }
        self.seek_table.push(SeekPoint {
            sample,
            offset,
            frame_samples,
        });
    }

    /// Accounts for one emitted frame.
    pub fn note_frame(&mut self, block_size: u16, emitted_len: usize) {
        self.block_size_min = self.block_size_min.min(block_size);
        self.block_size_max = self.block_size_max.max(block_size);
        self.frame_size_min = self.frame_size_min.min(emitted_len as u32);
        self.frame_size_max = self.frame_size_max.max(emitted_len as u32);
        self.total_bytes += emitted_len as u64;
    }

    /// Closes out one input's contribution to the totals.
    pub fn finish_track(&mut self, samples: u64, frames: u64) {
        self.total_samples += samples;
        self.total_frames += frames;
    }

    /// Finalizes the aggregate into the data the assembler and CUE emitter
    /// consume.
    ///
    /// # Errors
    ///
    /// Returns an error when the aggregated totals don't fit their
    /// STREAMINFO fields.
    pub fn finalize(self) -> Result<MergedAlbum, MergeError> {
        let mut stream_info = StreamInfo::new(
            self.sample_rate as usize,
            self.channels as usize,
            self.bits_per_sample as usize,
        )
        .map_err(|e| e.within("stream_info"))?;
        stream_info.set_total_samples(self.total_samples);
        stream_info.set_block_sizes(self.block_size_min, self.block_size_max);
        stream_info.set_frame_sizes(self.frame_size_min, self.frame_size_max);
        let digest: [u8; 16] = self.md5.finalize().into();
        stream_info.set_md5_digest(&digest);

        Ok(MergedAlbum {
            stream_info,
            seek_table: self.seek_table,
            picture: self.picture,
            tags: self.tags,
            titles: self.titles,
            total_frames: self.total_frames,
            total_bytes: self.total_bytes,
        })
    }
}
