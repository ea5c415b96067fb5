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

//! The input driver: feeds whole inputs through the frame rewriter.

use std::io::Write;
use std::path::Path;

use log::debug;

use crate::album::AlbumStats;
use crate::album::MergedAlbum;
use crate::config;
use crate::error::MergeError;
use crate::error::ParseError;
use crate::frame::parser as frame_parser;
use crate::frame::Decode;
use crate::meta;
use crate::meta::MetadataBlockData;
use crate::rewrite;

type NomError<'a> = nom::error::Error<&'a [u8]>;

fn map_nom_err(e: nom::Err<NomError<'_>>, name: &str, what: &str) -> MergeError {
    let parse_error = ParseError::new(what).set_path(name);
    match e {
        nom::Err::Incomplete(_) => MergeError::Truncated(parse_error),
        nom::Err::Error(_) | nom::Err::Failure(_) => MergeError::Parse(parse_error),
    }
}

/// Drives the merge: one [`Self::append_file`] call per input, in album
/// order, then [`Self::finalize`].
///
/// Rewritten frames land in the caller-provided sink as each input is
/// appended; the caller copies the sink behind the metadata prefix via
/// [`crate::assemble::write_stream`] once the aggregate is finalized.
pub struct Merger {
    config: config::Merge,
    album: Option<AlbumStats>,
}

impl Merger {
    /// Constructs an empty merger.
    pub const fn new(config: config::Merge) -> Self {
        Self {
            config,
            album: None,
        }
    }

    /// Reads one input file and appends its rewritten frames to `sink`.
    ///
    /// # Errors
    ///
    /// Any error is fatal to the whole merge: I/O failures, malformed or
    /// truncated FLAC data, and stream parameters that differ from the
    /// first input's.
    pub fn append_file<P: AsRef<Path>, W: Write>(
        &mut self,
        path: P,
        sink: &mut W,
    ) -> Result<(), MergeError> {
        let bytes = std::fs::read(&path)?;
        self.append_bytes(&path.as_ref().to_string_lossy(), &bytes, sink)
    }

    /// Appends one in-memory input. `name` is used in error messages only.
    ///
    /// # Errors
    ///
    /// Same as [`Self::append_file`].
    pub fn append_bytes<W: Write>(
        &mut self,
        name: &str,
        bytes: &[u8],
        sink: &mut W,
    ) -> Result<(), MergeError> {
        let (frames_region, (info, blocks)) = meta::stream_prefix::<NomError>(bytes)
            .map_err(|e| map_nom_err(e, name, "malformed metadata prefix"))?;

        let first_input = self.album.is_none();
        match self.album {
            Some(ref album) => album.check_compatible(&info)?,
            None => self.album = Some(AlbumStats::new(&info)?),
        }
        let album = self
            .album
            .as_mut()
            .expect("album state is initialized above");

        album.begin_track();
        for block in &blocks {
            match block.data {
                MetadataBlockData::VorbisComment(ref comment) => {
                    album.harvest_comment(comment, first_input);
                }
                MetadataBlockData::Picture(ref picture) => {
                    album.harvest_picture(picture, first_input);
                }
                // Input seek tables are dropped; the output table is
                // regenerated on a fixed cadence while frames are emitted.
                MetadataBlockData::SeekTable(_)
                | MetadataBlockData::StreamInfo(_)
                | MetadataBlockData::Unknown { .. } => {}
            }
        }

        let seek_interval_samples =
            u64::from(album.sample_rate()) * self.config.seek_interval_secs;

        let mut rest = frames_region;
        let mut samples_in_input = 0u64;
        let mut frames_in_input = 0u64;
        let mut last_seek_window = 0u64;
        while !rest.is_empty() {
            let (after, frame) = frame_parser::frame::<NomError>(&info, true)(rest)
                .map_err(|e| map_nom_err(e, name, "malformed frame"))?;
            let src = &rest[..rest.len() - after.len()];

            album.update_md5(&frame.decode());

            let seek_window = if seek_interval_samples == 0 {
                0
            } else {
                samples_in_input / seek_interval_samples
            };
            if frames_in_input == 0 || seek_window > last_seek_window {
                album.push_seek_point(
                    album.total_samples() + samples_in_input,
                    album.total_bytes(),
                    frame.block_size() as u16,
                );
            }
            last_seek_window = seek_window;

            let start_sample = album.total_samples() + samples_in_input;
            let emitted = rewrite::rewrite_frame(src, frame.header(), start_sample, sink)?;
            album.note_frame(frame.block_size() as u16, emitted);

            samples_in_input += frame.block_size() as u64;
            frames_in_input += 1;
            rest = after;
        }

        debug!("{name}: {frames_in_input} frames, {samples_in_input} samples");
        album.finish_track(samples_in_input, frames_in_input);
        Ok(())
    }

    /// Closes the merge and returns the aggregated album data.
    ///
    /// # Errors
    ///
    /// Returns an error when no input was appended, or when aggregated
    /// totals don't fit their output fields.
    pub fn finalize(self) -> Result<MergedAlbum, MergeError> {
        let album = self
            .album
            .ok_or_else(|| MergeError::Parse(ParseError::new("no inputs were merged")))?;
        album.finalize()
    }
}

/// Merges the given files in order, writing rewritten frames to `sink`.
///
/// This is the one-call form of [`Merger`].
///
/// # Errors
///
/// Same as [`Merger::append_file`].
pub fn merge_files<P: AsRef<Path>, W: Write>(
    paths: &[P],
    config: &config::Merge,
    sink: &mut W,
) -> Result<MergedAlbum, MergeError> {
    let mut merger = Merger::new(config.clone());
    for path in paths {
        merger.append_file(path, sink)?;
    }
    merger.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    use md5::Digest;
    use md5::Md5;
    use nom::error::VerboseError;

    use crate::test_helper::FixtureTrack;

    fn append_tracks(tracks: &[&FixtureTrack]) -> (MergedAlbum, Vec<u8>) {
        let mut merger = Merger::new(config::Merge::default());
        let mut sink = Vec::new();
        for (i, track) in tracks.iter().enumerate() {
            merger
                .append_bytes(&format!("track{i}"), &track.to_bytes(), &mut sink)
                .expect("append failed");
        }
        (merger.finalize().expect("finalize failed"), sink)
    }

    fn parse_all_frames(album: &MergedAlbum, frames: &[u8]) -> Vec<(u64, usize, usize)> {
        // (start_sample, block_size, byte_offset) triples.
        let mut rest = frames;
        let mut out = vec![];
        while !rest.is_empty() {
            let offset = frames.len() - rest.len();
            let (after, f) =
                frame_parser::frame::<VerboseError<&[u8]>>(&album.stream_info, true)(rest)
                    .expect("emitted frame should re-parse with CRC checking");
            assert!(f.header().is_variable_blocking());
            out.push((f.header().number().value(), f.block_size(), offset));
            rest = after;
        }
        out
    }

    #[test]
    fn single_input_renumbering() {
        // fixed-blocksize input; output numbers become sample indices.
        let track = FixtureTrack::new(44100, 2, 16).block_sizes(&[4096, 4096, 4096, 100]);
        let (album, sink) = append_tracks(&[&track]);

        let frames = parse_all_frames(&album, &sink);
        let numbers: Vec<u64> = frames.iter().map(|f| f.0).collect();
        assert_eq!(numbers, &[0, 4096, 8192, 12288]);

        assert_eq!(album.stream_info.total_samples(), 4096 * 3 + 100);
        assert_eq!(album.total_frames, 4);
        assert_eq!(album.total_bytes, sink.len() as u64);
        assert_eq!(album.stream_info.min_block_size(), 100);
        assert_eq!(album.stream_info.max_block_size(), 4096);
    }

    #[test]
    fn block_size_sum_matches_stream_info() {
        let a = FixtureTrack::new(44100, 2, 16).block_sizes(&[4096, 4096, 777]);
        let b = FixtureTrack::new(44100, 2, 16).block_sizes(&[1000, 1000]);
        let (album, sink) = append_tracks(&[&a, &b]);

        let total: usize = parse_all_frames(&album, &sink)
            .iter()
            .map(|f| f.1)
            .sum();
        assert_eq!(album.stream_info.total_samples(), total as u64);
    }

    #[test]
    fn renumbering_is_exact_across_inputs() {
        // total sample counts of the two inputs differ by exactly one
        // (385 vs. 384), so an off-by-one in the boundary renumbering
        // would show up in every frame of the second input.
        let a = FixtureTrack::new(8000, 1, 16).block_sizes(&[192, 193]);
        let b = FixtureTrack::new(8000, 1, 16).block_sizes(&[192, 192]);
        let (album, sink) = append_tracks(&[&a, &b]);

        let numbers: Vec<u64> = parse_all_frames(&album, &sink).iter().map(|f| f.0).collect();
        assert_eq!(numbers, &[0, 192, 385, 577]);
        assert_eq!(
            album.titles.iter().map(|t| t.start_sample).collect::<Vec<_>>(),
            &[0, 385]
        );
        assert_eq!(album.stream_info.total_samples(), 769);
    }

    #[test]
    fn incompatible_sample_rate_is_fatal() {
        let a = FixtureTrack::new(44100, 2, 16).block_sizes(&[4096]);
        let b = FixtureTrack::new(48000, 2, 16).block_sizes(&[4096]);

        let mut merger = Merger::new(config::Merge::default());
        let mut sink = Vec::new();
        merger.append_bytes("a", &a.to_bytes(), &mut sink).unwrap();
        let err = merger.append_bytes("b", &b.to_bytes(), &mut sink);
        assert!(matches!(err, Err(MergeError::Incompatible(_))));
    }

    #[test]
    fn doubled_input_aggregates() {
        // two identical ~10-second inputs: one frame per input covering
        // 10s at 44.1kHz is unrepresentable (max block 65535), so use
        // frames of 44100 samples per second.
        let track = FixtureTrack::new(44100, 2, 16)
            .block_sizes(&[44100; 10])
            .title("Part");
        let (album, sink) = append_tracks(&[&track, &track]);

        assert_eq!(album.stream_info.total_samples(), 44100 * 20);
        assert_eq!(album.titles.len(), 2);
        assert_eq!(album.titles[1].start_sample, 441000);

        // one seek point at the head of each input plus one per elapsed
        // 10-second window.
        let frames = parse_all_frames(&album, &sink);
        assert_eq!(album.seek_table.len(), 2);
        for point in &album.seek_table {
            let hit = frames
                .iter()
                .find(|(num, _, _)| *num == point.sample)
                .expect("seek point must address an emitted frame");
            assert_eq!(hit.2 as u64, point.offset);
        }
        assert_eq!(album.seek_table[0].sample, 0);
        assert_eq!(album.seek_table[1].sample, 441000);
    }

    #[test]
    fn seek_points_on_cadence_within_one_input() {
        // 25 seconds of audio in one-second frames: points at 0s, 10s, 20s.
        let track = FixtureTrack::new(44100, 1, 16).block_sizes(&[44100; 25]);
        let (album, _) = append_tracks(&[&track]);
        let samples: Vec<u64> = album.seek_table.iter().map(|p| p.sample).collect();
        assert_eq!(samples, &[0, 441000, 882000]);
    }

    #[test]
    fn titles_and_tags_follow_input_order() {
        let a = FixtureTrack::new(44100, 2, 16)
            .block_sizes(&[4096])
            .title("A")
            .album_tags("The Album", "The Artist", "2001", "Rock");
        let b = FixtureTrack::new(44100, 2, 16)
            .block_sizes(&[4096])
            .title("B")
            .album_tags("Ignored", "Ignored", "1999", "Pop");
        let c = FixtureTrack::new(44100, 2, 16).block_sizes(&[4096]).title("C");
        let (album, _) = append_tracks(&[&a, &b, &c]);

        assert_eq!(album.tags.album.as_deref(), Some("The Album"));
        assert_eq!(album.tags.artist.as_deref(), Some("The Artist"));
        assert_eq!(album.tags.date.as_deref(), Some("2001"));
        assert_eq!(album.tags.genre.as_deref(), Some("Rock"));
        let titles: Vec<&str> = album.titles.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, &["A", "B", "C"]);
    }

    #[test]
    fn md5_covers_all_decoded_audio() {
        let a = FixtureTrack::new(44100, 2, 16)
            .block_sizes(&[4096, 1000])
            .dc_offsets(&[17, -9]);
        let b = FixtureTrack::new(44100, 2, 16).block_sizes(&[192]).dc_offsets(&[5]);
        let (album, _) = append_tracks(&[&a, &b]);

        let mut direct = Md5::new();
        for track in [&a, &b] {
            for v in track.pcm() {
                direct.update(&v.to_le_bytes()[0..2]);
            }
        }
        let direct: [u8; 16] = direct.finalize().into();
        assert_eq!(album.stream_info.md5_digest(), &direct);
    }

    #[test]
    fn truncated_input_is_fatal() {
        let track = FixtureTrack::new(44100, 2, 16).block_sizes(&[4096, 4096]);
        let bytes = track.to_bytes();
        let cut = &bytes[..bytes.len() - 5];

        let mut merger = Merger::new(config::Merge::default());
        let mut sink = Vec::new();
        let err = merger.append_bytes("cut", cut, &mut sink);
        assert!(matches!(err, Err(MergeError::Truncated(_))));
    }

    #[test]
    fn garbage_input_is_parse_error() {
        let mut merger = Merger::new(config::Merge::default());
        let mut sink = Vec::new();
        let err = merger.append_bytes("junk", b"RIFF....WAVEfmt ....junkjunk", &mut sink);
        assert!(matches!(err, Err(MergeError::Parse(_))));
    }

    #[test]
    fn finalize_without_inputs_is_error() {
        let merger = Merger::new(config::Merge::default());
        assert!(merger.finalize().is_err());
    }

    #[test]
    fn variable_blocksize_input_is_accepted() {
        let track = FixtureTrack::new(44100, 2, 16)
            .block_sizes(&[4096, 1234, 4096])
            .variable_blocking(true);
        let (album, sink) = append_tracks(&[&track]);
        let numbers: Vec<u64> = parse_all_frames(&album, &sink).iter().map(|f| f.0).collect();
        assert_eq!(numbers, &[0, 4096, 5330]);
    }
}
