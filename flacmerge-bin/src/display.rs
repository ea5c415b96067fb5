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

//! A module for terminal output of "flacmerge-bin".

use std::error::Error;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use termcolor::Color;
use termcolor::ColorChoice;
use termcolor::ColorSpec;
use termcolor::StandardStream;
use termcolor::WriteColor;

const UNKNOWN_FILE_NAME: &str = "[unknown]";

fn terminal_output() -> Arc<termcolor::StandardStream> {
    Arc::new(StandardStream::stderr(ColorChoice::Auto))
}

fn file_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || UNKNOWN_FILE_NAME.to_owned(),
        |s| s.to_string_lossy().to_string(),
    )
}

/// Outputs the per-input progress line.
pub fn show_progress_track(index: usize, total: usize, path: &Path) -> Result<(), std::io::Error> {
    let termout = terminal_output();
    let mut termout = termout.lock();
    termout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
    write!(termout, "{:>10} ", "Merging")?;
    termout.reset()?;
    writeln!(termout, "[{}/{}] {}", index + 1, total, file_name(path))
}

/// Outputs the after-merge summary.
pub fn show_done(
    flac_path: &Path,
    cue_path: &Path,
    bytes_written: u64,
    tracks: usize,
    duration_secs: f64,
) -> Result<(), std::io::Error> {
    let termout = terminal_output();
    let mut termout = termout.lock();
    termout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    write!(termout, "{:>10} ", "Merged")?;
    termout.reset()?;
    writeln!(
        termout,
        "{} [{} tracks, {:.1} s, {} bytes]",
        file_name(flac_path),
        tracks,
        duration_secs,
        bytes_written,
    )?;
    write!(termout, "{:>10} ", "")?;
    writeln!(termout, "cue sheet: {}", file_name(cue_path))
}

/// Outputs an error message, with its cause when available.
pub fn show_error_msg<E: Error>(msg: &str, err: Option<E>) {
    let show = || -> Result<(), std::io::Error> {
        let termout = terminal_output();
        let mut termout = termout.lock();
        termout.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        write!(termout, "{:>10} ", "error:")?;
        termout.reset()?;
        match err {
            Some(ref e) => writeln!(termout, "{msg} ({e})"),
            None => writeln!(termout, "{msg}"),
        }
    };
    let _ = show();
}
