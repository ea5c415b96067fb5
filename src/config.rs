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

//! Merge configuration structs.

use serde::Deserialize;
use serde::Serialize;

use crate::error::verify_true;
use crate::error::Verify;
use crate::error::VerifyError;

/// Default spacing (in seconds of audio) between generated seek points.
pub const DEFAULT_SEEK_INTERVAL_SECS: u64 = 10;

/// Default byte alignment for the first audio frame of the output.
pub const DEFAULT_FRAME_ALIGNMENT: u64 = 256;

/// Configuration for the merge.
#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct Merge {
    /// Seconds of audio between generated seek points.
    ///
    /// A seek point is always emitted for the first frame of every input;
    /// within an input, another one is emitted each time this many seconds
    /// of audio have been consumed.
    pub seek_interval_secs: u64,
    /// Byte alignment for the first audio frame of the output.
    ///
    /// The PADDING block preceding the frames is sized so that the first
    /// frame starts at a multiple of this value.
    pub frame_alignment: u64,
}

impl Default for Merge {
    fn default() -> Self {
        Self {
            seek_interval_secs: DEFAULT_SEEK_INTERVAL_SECS,
            frame_alignment: DEFAULT_FRAME_ALIGNMENT,
        }
    }
}

impl Verify for Merge {
    fn verify(&self) -> Result<(), VerifyError> {
        verify_true!(
            "seek_interval_secs",
            self.seek_interval_secs >= 1,
            "must be at least one second"
        )?;
        verify_true!(
            "frame_alignment",
            self.frame_alignment.is_power_of_two(),
            "must be a power of two"
        )?;
        // The padding block (header included) must fit a 24-bit length.
        verify_true!(
            "frame_alignment",
            (16u64..=(1u64 << 20)).contains(&self.frame_alignment),
            "must be in 16..=1048576"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_default() {
        let config: Merge = toml::from_str("").expect("given string is default");
        assert_eq!(config.seek_interval_secs, DEFAULT_SEEK_INTERVAL_SECS);
        assert_eq!(config.frame_alignment, DEFAULT_FRAME_ALIGNMENT);
        config.verify().expect("default config should verify");
    }

    #[test]
    fn serialize_and_deserialize() {
        let config = Merge {
            seek_interval_secs: 30,
            frame_alignment: 4096,
        };
        let serialized = toml::to_string(&config).expect("no reason to fail");
        let deserialized: Merge = toml::from_str(&serialized).expect("no reason to fail");
        assert_eq!(deserialized.seek_interval_secs, 30);
        assert_eq!(deserialized.frame_alignment, 4096);
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = Merge::default();
        config.seek_interval_secs = 0;
        assert!(config.verify().is_err());

        let mut config = Merge::default();
        config.frame_alignment = 384; // not a power of two
        assert!(config.verify().is_err());

        let mut config = Merge::default();
        config.frame_alignment = 8; // too small for a block header
        assert!(config.verify().is_err());
    }
}
