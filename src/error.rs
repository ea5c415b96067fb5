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

//! Error types and verification traits.

use std::error::Error;
use std::fmt;
use std::path::Path;

/// Enum of errors that can occur while merging streams.
#[derive(Debug)]
#[non_exhaustive]
pub enum MergeError {
    /// The input is not a well-formed FLAC stream.
    Parse(ParseError),
    /// The input ended in the middle of a frame or metadata block.
    Truncated(ParseError),
    /// An input's stream parameters differ from the first input's.
    Incompatible(IncompatibleStreamError),
    /// A value does not fit the format field it must be written to.
    Range(RangeError),
    /// I/O error propagated from the underlying reader or writer.
    Io(std::io::Error),
}

impl Error for MergeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(e) | Self::Truncated(e) => Some(e),
            Self::Incompatible(e) => Some(e),
            Self::Range(e) => Some(e),
            Self::Io(e) => Some(e),
        }
    }
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => e.fmt(f),
            Self::Truncated(e) => write!(f, "unexpected end of stream: {e}"),
            Self::Incompatible(e) => e.fmt(f),
            Self::Range(e) => e.fmt(f),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl From<RangeError> for MergeError {
    fn from(e: RangeError) -> Self {
        Self::Range(e)
    }
}

impl From<std::io::Error> for MergeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Error emitted when an input cannot be recognized as FLAC.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseError {
    source_name: Option<String>,
    reason: String,
}

impl ParseError {
    /// Constructs `ParseError` with the given reason.
    ///
    /// # Examples
    ///
    /// ```
    /// # use flacmerge::error::*;
    /// let err = ParseError::new("invalid signature");
    /// assert_eq!(
    ///     format!("{}", err),
    ///     "error while reading <unknown>: invalid signature"
    /// );
    /// ```
    pub fn new(reason: &str) -> Self {
        Self {
            source_name: None,
            reason: reason.to_owned(),
        }
    }

    /// Sets a path as the source name, for file-based inputs.
    ///
    /// # Examples
    ///
    /// ```
    /// # use flacmerge::error::*;
    /// let err = ParseError::new("invalid signature").set_path("track01.flac");
    /// assert_eq!(
    ///     format!("{}", err),
    ///     "error while reading track01.flac: invalid signature"
    /// );
    /// ```
    #[must_use]
    pub fn set_path<P: AsRef<Path>>(self, path: P) -> Self {
        Self {
            source_name: Some(path.as_ref().to_string_lossy().to_string()),
            ..self
        }
    }
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error while reading {}: {}",
            self.source_name
                .as_ref()
                .map_or("<unknown>", String::as_str),
            self.reason
        )
    }
}

/// Error emitted when an input's stream parameters don't match the first
/// input's.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IncompatibleStreamError {
    field: &'static str,
    expected: u64,
    actual: u64,
}

impl IncompatibleStreamError {
    pub(crate) const fn new(field: &'static str, expected: u64, actual: u64) -> Self {
        Self {
            field,
            expected,
            actual,
        }
    }
}

impl Error for IncompatibleStreamError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

impl fmt::Display for IncompatibleStreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} mismatch; expected {}, got {}",
            self.field, self.expected, self.actual
        )
    }
}

/// Error emitted when a parameter is out of the expected range.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct RangeError {
    var: String,
    reason: String,
    actual: String,
}

impl RangeError {
    /// Makes range error from `actual: impl Display` that is out of range.
    pub(crate) fn from_display<T>(var: &str, reason: &str, actual: &T) -> Self
    where
        T: fmt::Display,
    {
        Self {
            var: var.to_owned(),
            reason: reason.to_owned(),
            actual: format!("{actual}"),
        }
    }
}

impl Error for RangeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` is out of range: {} (actual={})",
            self.var, self.reason, self.actual
        )
    }
}

/// Error object returned when config or stream integrity verification failed.
///
/// This error maintains a path to the field that is actually erroneous in the
/// nested structure.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct VerifyError {
    components: Vec<String>,
    reason: String,
}

impl VerifyError {
    /// Makes verification error for an invalid variable `component`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use flacmerge::error::*;
    /// let err = VerifyError::new("channels", "must be non-zero");
    /// assert_eq!(
    ///     format!("{}", err),
    ///     "verification error: `channels` is not valid. reason: must be non-zero"
    /// );
    /// ```
    pub fn new(component: &str, reason: &str) -> Self {
        Self {
            components: vec![component.to_owned()],
            reason: reason.to_owned(),
        }
    }

    /// Prepends the name of an enclosing component to the error location.
    ///
    /// # Examples
    ///
    /// ```
    /// # use flacmerge::error::*;
    /// let err = VerifyError::new("channels", "must be non-zero").within("stream_info");
    /// assert_eq!(err.path(), "stream_info.channels");
    /// ```
    #[must_use]
    pub fn within(self, component: &str) -> Self {
        let mut components = self.components;
        let reason = self.reason;
        components.push(component.to_owned());
        Self { components, reason }
    }

    /// Gets dot-separated path string for the error location.
    pub fn path(&self) -> String {
        let mut path = String::new();
        for (i, name) in self.components.iter().rev().enumerate() {
            if i != 0 {
                path.push('.');
            }
            path.push_str(name);
        }
        path
    }
}

impl Error for VerifyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "verification error: `{}` is not valid. reason: {}",
            self.path(),
            self.reason
        )
    }
}

impl From<VerifyError> for MergeError {
    fn from(e: VerifyError) -> Self {
        Self::Range(RangeError {
            var: e.path(),
            reason: e.reason,
            actual: "<rejected>".to_owned(),
        })
    }
}

/// Trait for verifiable structs.
pub trait Verify: Sized + seal_verify::Sealed {
    /// Verifies there's no internal data inconsistency.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError` if there's an invalid variable.
    fn verify(&self) -> Result<(), VerifyError>;
}

/// A wrapping function to make it compatible with "?" operator.
pub(crate) fn verify_macro_impl(cond: bool, varname: &str, msg: &str) -> Result<(), VerifyError> {
    if !cond {
        return Err(VerifyError::new(varname, msg));
    }
    Ok(())
}

/// Checks if `$cond` is true and do `return Err(...)` if so.
///
/// An error object `VerifyError` is constructed using `$varname` and
/// `$msg` that are formatted using the extra args (`$args`).
macro_rules! verify_true {
    ($varname:literal, $cond:expr, $msg:literal, $($args: expr),*) => {
        crate::error::verify_macro_impl(
            $cond,
            &format!($varname, $($args),*),
            &format!($msg, $($args),*),
        )
    };
    ($varname:literal, $cond:expr, $msg:literal) => {
        verify_true!($varname, $cond, $msg,)
    }
}
pub(crate) use verify_true;

/// Checks if `$actual` is in the range, and emits err with default msgs if not.
///
/// An error is constructed using the same way as [`verify_true`].
macro_rules! verify_range {
    ($varname: literal, $actual:expr, $lowlimit:tt ..= $highlimit:tt) => {
        verify_range!($varname, $actual, ($lowlimit)..)
            .and_then(|()| verify_range!($varname, $actual, ..=($highlimit)))
    };
    ($varname: literal, $actual:expr, $lowlimit:tt ..) => {{
        #[allow(unused_parens)]
        let limit = $lowlimit;
        verify_true!(
            $varname,
            $actual >= limit,
            "must be greater than or equal to {limit}"
        )
    }};
    ($varname: literal, $actual:expr, ..= $highlimit:tt) => {{
        #[allow(unused_parens)]
        let limit = $highlimit;
        verify_true!(
            $varname,
            $actual <= limit,
            "must be less than or equal to {limit}"
        )
    }};
    ($varname: literal, $actual:expr, .. $highlimit:tt) => {{
        #[allow(unused_parens)]
        let limit = $highlimit;
        verify_true!($varname, $actual < limit, "must be less than {limit}")
    }};
}
pub(crate) use verify_range;

mod seal_verify {
    pub trait Sealed {}

    impl Sealed for crate::config::Merge {}
    impl Sealed for crate::meta::StreamInfo {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_error_path() {
        let err = VerifyError::new("x", "must be set")
            .within("inner")
            .within("outer");
        assert_eq!(err.path(), "outer.inner.x");
    }

    #[test]
    fn incompatible_stream_message() {
        let err = IncompatibleStreamError::new("sample rate", 44100, 48000);
        assert_eq!(
            format!("{err}"),
            "sample rate mismatch; expected 44100, got 48000"
        );
    }

    #[test]
    fn verify_macros() {
        assert!(verify_true!("v", 1 + 1 == 2, "must hold").is_ok());
        assert!(verify_range!("v", 3, 1..=4).is_ok());
        assert!(verify_range!("v", 5, 1..=4).is_err());
        assert!(verify_range!("v", 0, 1..).is_err());
    }
}
