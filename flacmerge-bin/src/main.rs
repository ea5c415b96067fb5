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

#![doc = include_str!("../README.md")]
#![warn(clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::multiple_crate_versions
)]

use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::num::NonZeroU8;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::warn;

use flacmerge::album::AlbumTags;
use flacmerge::assemble;
use flacmerge::config;
use flacmerge::cue;
use flacmerge::error::Verify;
use flacmerge::Merger;

mod display;

/// FLAC album merger: joins per-track FLAC files into one FLAC + CUE pair.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct ProgramArgs {
    /// Input FLAC files, merged in the given order.
    inputs: Vec<PathBuf>,
    /// Suppress progress output.
    #[clap(short, long)]
    silent: bool,
    /// Delete the input files after the outputs are written.
    #[clap(short, long)]
    delete: bool,
    /// Output directory for the merged pair.
    #[clap(short, long, default_value = ".")]
    output: PathBuf,
    /// If set, load merge tunables from the specified TOML file.
    #[clap(long)]
    config: Option<PathBuf>,
    /// If set, dump the config used to the specified path.
    #[clap(long)]
    dump_config: Option<PathBuf>,
}

// Exit codes of the tool: 1 = usage, 2 = output/setup, 3 = input processing.
//
// The unsafe blocks below is only a tentative workaround before "const_option"
// feature is stabilized.
const EX_USAGE: NonZeroU8 = unsafe { NonZeroU8::new_unchecked(1) };
const EX_SETUP: NonZeroU8 = unsafe { NonZeroU8::new_unchecked(2) };
const EX_INPUT: NonZeroU8 = unsafe { NonZeroU8::new_unchecked(3) };

/// Makes a file-name component from a tag value.
///
/// Double quotes become apostrophes and anything outside a conservative
/// character set is stripped.
fn sanitize_component(value: &str) -> String {
    value
        .replace('"', "'")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || " _-',.[]()".contains(*c))
        .collect()
}

/// Derives the output file stem from the album tags.
fn output_stem(tags: &AlbumTags) -> String {
    let artist = sanitize_component(tags.artist.as_deref().unwrap_or(""));
    let album = sanitize_component(tags.album.as_deref().unwrap_or(""));
    match (artist.is_empty(), album.is_empty()) {
        (false, false) => format!("{artist} - {album}"),
        (false, true) => artist,
        (true, false) => album,
        (true, true) => "album".to_owned(),
    }
}

fn load_config(args: &ProgramArgs) -> Result<config::Merge, NonZeroU8> {
    let merge_config = match args.config {
        Some(ref path) => {
            let conf_str = std::fs::read_to_string(path).map_err(|e| {
                display::show_error_msg("failed to read the config file.", Some(e));
                EX_SETUP
            })?;
            toml::from_str(&conf_str).map_err(|e| {
                display::show_error_msg("config file syntax error.", Some(e));
                EX_SETUP
            })?
        }
        None => config::Merge::default(),
    };
    merge_config.verify().map_err(|e| {
        display::show_error_msg("invalid config parameter is detected.", Some(e));
        EX_SETUP
    })?;

    if let Some(ref path) = args.dump_config {
        let dump = toml::to_string(&merge_config).expect("config must serialize");
        std::fs::write(path, dump).map_err(|e| {
            display::show_error_msg("failed to write the config dump file.", Some(e));
            EX_SETUP
        })?;
    }
    Ok(merge_config)
}

#[allow(clippy::needless_pass_by_value)]
fn main_body(args: ProgramArgs) -> Result<(), NonZeroU8> {
    if args.inputs.is_empty() {
        display::show_error_msg::<std::io::Error>(
            "no input files. usage: flacmerge [options] <flac files>",
            None,
        );
        return Err(EX_USAGE);
    }
    let merge_config = load_config(&args)?;

    // The frame sink lives in the system temp dir and is unlinked by the OS
    // on every exit path.
    let mut temp_file = tempfile::tempfile().map_err(|e| {
        display::show_error_msg("unable to create the temporary frame sink.", Some(e));
        EX_SETUP
    })?;

    let mut merger = Merger::new(merge_config.clone());
    {
        let mut frame_sink = BufWriter::new(&temp_file);
        for (i, path) in args.inputs.iter().enumerate() {
            if !args.silent {
                let _ = display::show_progress_track(i, args.inputs.len(), path);
            }
            merger.append_file(path, &mut frame_sink).map_err(|e| {
                display::show_error_msg("failed to merge an input.", Some(e));
                EX_INPUT
            })?;
        }
        frame_sink.flush().map_err(|e| {
            display::show_error_msg("failed to write the temporary frame sink.", Some(e));
            EX_INPUT
        })?;
    }
    let album = merger.finalize().map_err(|e| {
        display::show_error_msg("failed to aggregate the inputs.", Some(e));
        EX_INPUT
    })?;

    let stem = output_stem(&album.tags);
    let flac_path = args.output.join(format!("{stem}.flac"));
    let cue_path = args.output.join(format!("{stem}.cue"));

    let flac_file = File::create(&flac_path).map_err(|e| {
        display::show_error_msg("failed to create the output FLAC file.", Some(e));
        EX_SETUP
    })?;
    temp_file.seek(SeekFrom::Start(0)).map_err(|e| {
        display::show_error_msg("failed to rewind the temporary frame sink.", Some(e));
        EX_SETUP
    })?;
    let mut writer = BufWriter::new(flac_file);
    let bytes_written = assemble::write_stream(
        &album,
        &merge_config,
        &mut BufReader::new(&temp_file),
        &mut writer,
    )
    .and_then(|n| {
        writer.flush()?;
        Ok(n)
    })
    .map_err(|e| {
        display::show_error_msg("failed to write the output FLAC file.", Some(e));
        EX_SETUP
    })?;

    let flac_file_name = flac_path
        .file_name()
        .expect("output path always has a file name")
        .to_string_lossy()
        .to_string();
    let sheet = cue::render(&album, &flac_file_name);
    std::fs::write(&cue_path, sheet).map_err(|e| {
        display::show_error_msg("failed to write the CUE sheet.", Some(e));
        EX_SETUP
    })?;

    if args.delete {
        for path in &args.inputs {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("could not delete {}: {e}", path.display());
            }
        }
    }

    if !args.silent {
        let duration_secs =
            album.stream_info.total_samples() as f64 / album.stream_info.sample_rate() as f64;
        let _ = display::show_done(
            &flac_path,
            &cue_path,
            bytes_written,
            album.titles.len(),
            duration_secs,
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env("FLACMERGE_LOG")
        .format_timestamp(None)
        .init();

    let args = match ProgramArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let kind = e.kind();
            let _ = e.print();
            return if kind == clap::error::ErrorKind::DisplayHelp
                || kind == clap::error::ErrorKind::DisplayVersion
            {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EX_USAGE.get())
            };
        }
    };
    main_body(args).map_or_else(|e| ExitCode::from(e.get()), |()| ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;

    use nom::error::VerboseError;

    use flacmerge::frame::parser;
    use flacmerge::meta;
    use flacmerge::test_helper::FixtureTrack;

    fn args_for(inputs: Vec<PathBuf>, output: PathBuf) -> ProgramArgs {
        ProgramArgs {
            inputs,
            silent: true,
            delete: false,
            output,
            config: None,
            dump_config: None,
        }
    }

    fn write_track(dir: &Path, name: &str, track: &FixtureTrack) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, track.to_bytes()).expect("fixture write should not fail");
        path
    }

    #[test]
    fn arg_parser() {
        let args =
            ProgramArgs::try_parse_from(["flacmerge", "-s", "-o", "out", "a.flac", "b.flac"])
                .expect("args should parse");
        assert!(args.silent);
        assert!(!args.delete);
        assert_eq!(args.output, PathBuf::from("out"));
        assert_eq!(
            args.inputs,
            vec![PathBuf::from("a.flac"), PathBuf::from("b.flac")]
        );
    }

    #[test]
    fn component_sanitization() {
        assert_eq!(sanitize_component("AC/DC"), "ACDC");
        assert_eq!(sanitize_component("a \"quoted\" name"), "a 'quoted' name");
        assert_eq!(sanitize_component("Vol. 2 [live] (x)"), "Vol. 2 [live] (x)");
        assert_eq!(sanitize_component("päth"), "pth");
    }

    #[test]
    fn output_stem_fallbacks() {
        let mut tags = AlbumTags::default();
        assert_eq!(output_stem(&tags), "album");
        tags.artist = Some("Band".to_owned());
        assert_eq!(output_stem(&tags), "Band");
        tags.album = Some("Record".to_owned());
        assert_eq!(output_stem(&tags), "Band - Record");
    }

    #[test]
    fn no_inputs_is_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = main_body(args_for(vec![], dir.path().to_path_buf()));
        assert_eq!(err, Err(EX_USAGE));
    }

    #[test]
    fn merges_two_tracks_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let a = FixtureTrack::new(44100, 2, 16)
            .block_sizes(&[4096, 4096])
            .title("First")
            .album_tags("Greatest", "Somebody", "1987", "Pop");
        let b = FixtureTrack::new(44100, 2, 16)
            .block_sizes(&[4096])
            .title("Second");
        let a_path = write_track(dir.path(), "01.flac", &a);
        let b_path = write_track(dir.path(), "02.flac", &b);

        main_body(args_for(
            vec![a_path.clone(), b_path.clone()],
            dir.path().to_path_buf(),
        ))
        .expect("merge should succeed");

        let flac_path = dir.path().join("Somebody - Greatest.flac");
        let cue_path = dir.path().join("Somebody - Greatest.cue");
        let bytes = std::fs::read(&flac_path).expect("output flac should exist");

        let (mut rest, (info, _)) = meta::stream_prefix::<VerboseError<&[u8]>>(&bytes)
            .expect("output should parse as FLAC");
        assert_eq!(info.total_samples(), 4096 * 3);
        let mut frames = 0;
        while !rest.is_empty() {
            let (after, frame) = parser::frame::<VerboseError<&[u8]>>(&info, true)(rest)
                .expect("output frames should verify");
            assert!(frame.header().is_variable_blocking());
            frames += 1;
            rest = after;
        }
        assert_eq!(frames, 3);

        let sheet = std::fs::read_to_string(&cue_path).expect("cue should exist");
        assert!(sheet.contains("REM DATE 1987"));
        assert!(sheet.contains("PERFORMER \"Somebody\""));
        assert!(sheet.contains("FILE \"Somebody - Greatest.flac\" WAVE"));
        assert!(sheet.contains("TITLE \"First\""));
        assert!(sheet.contains("TITLE \"Second\""));

        // inputs were kept (no --delete).
        assert!(a_path.exists() && b_path.exists());
    }

    #[test]
    fn mismatched_inputs_exit_with_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let a = FixtureTrack::new(44100, 2, 16).block_sizes(&[4096]);
        let b = FixtureTrack::new(48000, 2, 16).block_sizes(&[4096]);
        let a_path = write_track(dir.path(), "a.flac", &a);
        let b_path = write_track(dir.path(), "b.flac", &b);

        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let err = main_body(args_for(vec![a_path, b_path], out.clone()));
        assert_eq!(err, Err(EX_INPUT));
        // no partial output lands in the output directory.
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn delete_flag_removes_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let a = FixtureTrack::new(8000, 1, 16).block_sizes(&[192]).title("T");
        let a_path = write_track(dir.path(), "only.flac", &a);

        let mut args = args_for(vec![a_path.clone()], dir.path().to_path_buf());
        args.delete = true;
        main_body(args).expect("merge should succeed");
        assert!(!a_path.exists());
        assert!(dir.path().join("album.flac").exists());
        assert!(dir.path().join("album.cue").exists());
    }

    #[test]
    fn config_roundtrip_through_dump() {
        let dir = tempfile::tempdir().unwrap();
        let a = FixtureTrack::new(8000, 1, 16).block_sizes(&[192]);
        let a_path = write_track(dir.path(), "t.flac", &a);
        let conf_path = dir.path().join("merge.toml");
        std::fs::write(&conf_path, "seek_interval_secs = 5\nframe_alignment = 512\n").unwrap();
        let dump_path = dir.path().join("dumped.toml");

        let mut args = args_for(vec![a_path], dir.path().to_path_buf());
        args.config = Some(conf_path);
        args.dump_config = Some(dump_path.clone());
        main_body(args).expect("merge should succeed");

        let dumped: flacmerge::config::Merge =
            toml::from_str(&std::fs::read_to_string(dump_path).unwrap()).unwrap();
        assert_eq!(dumped.seek_interval_secs, 5);
        assert_eq!(dumped.frame_alignment, 512);

        // the configured alignment governs the first-frame offset.
        let bytes = std::fs::read(dir.path().join("album.flac")).unwrap();
        let (rest, _) = meta::stream_prefix::<VerboseError<&[u8]>>(&bytes).unwrap();
        assert_eq!((bytes.len() - rest.len()) % 512, 0);
    }

    #[test]
    fn invalid_config_exits_with_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let a = FixtureTrack::new(8000, 1, 16).block_sizes(&[192]);
        let a_path = write_track(dir.path(), "t.flac", &a);
        let conf_path = dir.path().join("merge.toml");
        std::fs::write(&conf_path, "frame_alignment = 100\n").unwrap();

        let mut args = args_for(vec![a_path], dir.path().to_path_buf());
        args.config = Some(conf_path);
        assert_eq!(main_body(args), Err(EX_SETUP));
    }
}
