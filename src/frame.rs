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

//! Frame model: header fields, subframes, parsing, and PCM reconstruction.
//!
//! Subframes are parsed only as far as the merge needs them: locating the
//! frame's end (FLAC frames carry no length field) and reconstructing PCM for
//! the running MD5. Their bytes are never re-encoded; the rewriter copies
//! them verbatim.

mod datatype;
mod decode;
pub mod parser;

pub use datatype::*;
pub use decode::*;
