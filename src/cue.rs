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

//! CUE sheet emission for the merged stream.

use std::fmt::Write;

use crate::album::MergedAlbum;

/// Replaces double quotes so a value can sit inside a quoted CUE field.
fn quote(value: &str) -> String {
    value.replace('"', "'")
}

/// Converts a sample index to the `MM:SS:FF` timestamp format (75 frames
/// per second).
///
/// # Examples
///
/// ```
/// # use flacmerge::cue::samples_to_msf;
/// assert_eq!(samples_to_msf(0, 44100), "00:00:00");
/// assert_eq!(samples_to_msf(441000, 44100), "00:10:00");
/// assert_eq!(samples_to_msf(44100 * 61, 44100), "01:01:00");
/// ```
pub fn samples_to_msf(sample: u64, sample_rate: u32) -> String {
    let t = sample * 75 / u64::from(sample_rate);
    let m = t / (60 * 75);
    let s = (t - m * 60 * 75) / 75;
    let f = t % 75;
    format!("{m:02}:{s:02}:{f:02}")
}

/// Renders the CUE sheet referencing `flac_file_name`.
///
/// Lines are emitted in the fixed order REM DATE, REM GENRE, PERFORMER,
/// TITLE, FILE, then one TRACK/TITLE/INDEX triple per input. DATE and GENRE
/// lines are omitted when the first input carried no such tag.
pub fn render(album: &MergedAlbum, flac_file_name: &str) -> String {
    let sample_rate = album.stream_info.sample_rate() as u32;
    let mut out = String::new();

    if let Some(ref date) = album.tags.date {
        let _ = writeln!(out, "REM DATE {}", quote(date));
    }
    if let Some(ref genre) = album.tags.genre {
        let _ = writeln!(out, "REM GENRE {}", quote(genre));
    }
    let _ = writeln!(
        out,
        "PERFORMER \"{}\"",
        quote(album.tags.artist.as_deref().unwrap_or(""))
    );
    let _ = writeln!(
        out,
        "TITLE \"{}\"",
        quote(album.tags.album.as_deref().unwrap_or(""))
    );
    let _ = writeln!(out, "FILE \"{}\" WAVE", quote(flac_file_name));
    for (i, track) in album.titles.iter().enumerate() {
        let _ = writeln!(out, "  TRACK {:02} AUDIO", i + 1);
        let _ = writeln!(out, "    TITLE \"{}\"", quote(&track.title));
        let _ = writeln!(
            out,
            "    INDEX 01 {}",
            samples_to_msf(track.start_sample, sample_rate)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::album::AlbumStats;
    use crate::album::MergedAlbum;
    use crate::album::TrackTitle;
    use crate::meta::StreamInfo;

    fn make_album(titles: &[(&str, u64)]) -> MergedAlbum {
        let info = StreamInfo::new(44100, 2, 16).unwrap();
        let stats = AlbumStats::new(&info).unwrap();
        let mut album = stats.finalize().unwrap();
        album.titles = titles
            .iter()
            .map(|(t, s)| TrackTitle {
                title: (*t).to_owned(),
                start_sample: *s,
            })
            .collect();
        album
    }

    #[test]
    fn msf_conversion() {
        assert_eq!(samples_to_msf(0, 44100), "00:00:00");
        assert_eq!(samples_to_msf(441000, 44100), "00:10:00");
        // one CUE frame is 1/75 s = 588 samples at 44.1kHz.
        assert_eq!(samples_to_msf(588, 44100), "00:00:01");
        assert_eq!(samples_to_msf(587, 44100), "00:00:00");
        assert_eq!(samples_to_msf(44100 * 60 * 100, 44100), "100:00:00");
    }

    #[test]
    fn full_sheet() {
        let mut album = make_album(&[("A", 0), ("B", 441000), ("C", 882000)]);
        album.tags.album = Some("Album".to_owned());
        album.tags.artist = Some("Artist".to_owned());
        album.tags.date = Some("2001".to_owned());
        album.tags.genre = Some("Rock".to_owned());

        let sheet = render(&album, "Artist - Album.flac");
        assert_eq!(
            sheet,
            "REM DATE 2001\n\
             REM GENRE Rock\n\
             PERFORMER \"Artist\"\n\
             TITLE \"Album\"\n\
             FILE \"Artist - Album.flac\" WAVE\n\
             \x20\x20TRACK 01 AUDIO\n\
             \x20\x20\x20\x20TITLE \"A\"\n\
             \x20\x20\x20\x20INDEX 01 00:00:00\n\
             \x20\x20TRACK 02 AUDIO\n\
             \x20\x20\x20\x20TITLE \"B\"\n\
             \x20\x20\x20\x20INDEX 01 00:10:00\n\
             \x20\x20TRACK 03 AUDIO\n\
             \x20\x20\x20\x20TITLE \"C\"\n\
             \x20\x20\x20\x20INDEX 01 00:20:00\n"
        );
    }

    #[test]
    fn optional_rem_lines_are_omitted() {
        let album = make_album(&[("Only", 0)]);
        let sheet = render(&album, "out.flac");
        assert!(!sheet.contains("REM DATE"));
        assert!(!sheet.contains("REM GENRE"));
        assert!(sheet.starts_with("PERFORMER \"\"\n"));
    }

    #[test]
    fn quotes_are_sanitized() {
        let mut album = make_album(&[("Song \"quoted\"", 0)]);
        album.tags.album = Some("An \"Album\"".to_owned());
        let sheet = render(&album, "out.flac");
        assert!(sheet.contains("TITLE \"An 'Album'\""));
        assert!(sheet.contains("TITLE \"Song 'quoted'\""));
    }
}
