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

//! Format constants.

/// Maximum number of channels supported by the format.
pub const MAX_CHANNELS: usize = 8;

/// Minimum bits-per-sample.
pub const MIN_BITS_PER_SAMPLE: usize = 4;

/// Maximum bits-per-sample.
pub const MAX_BITS_PER_SAMPLE: usize = 32;

/// Upper bound (exclusive) for sample rates storable in STREAMINFO.
///
/// The STREAMINFO layout packs the sample rate into a 20-bit field; larger
/// rates are rejected instead of silently truncated.
pub const SAMPLE_RATE_LIMIT: u32 = 1 << 20;

/// Maximum value encodable in the frame-number field (36 bits).
pub const MAX_FRAME_NUMBER: u64 = (1u64 << 36) - 1;

/// Maximum order of the fixed prediction filters.
pub const MAX_FIXED_ORDER: usize = 4;

/// Seek-point sample number marking an unused (placeholder) table entry.
pub const PLACEHOLDER_SEEK_POINT: u64 = u64::MAX;

/// Serialized size of one seek point in bytes.
pub const SEEK_POINT_BYTES: usize = 18;

/// Serialized size of the STREAMINFO payload in bytes.
pub const STREAM_INFO_BYTES: usize = 34;

/// Metadata block type tags.
pub mod block_type {
    pub const STREAM_INFO: u8 = 0;
    pub const PADDING: u8 = 1;
    pub const SEEK_TABLE: u8 = 3;
    pub const VORBIS_COMMENT: u8 = 4;
    pub const PICTURE: u8 = 6;
}

/// Picture type tag for a front cover, per the picture-block specification.
pub const FRONT_COVER_PICTURE: u32 = 3;
