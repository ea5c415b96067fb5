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

use crate::bitsink::BitSink;
use crate::constant::MAX_FIXED_ORDER;

/// Reimplementation of `u32::ilog2` for older rust compilers.
///
/// # Panics
///
/// It panics when `x == 0`.
#[inline]
fn ilog2(x: u32) -> u32 {
    31 - x.leading_zeros()
}

/// Enum for the block size specifier in [`FrameHeader`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BlockSizeSpec {
    /// Special case when `size = 192`.
    S192,
    /// Size that can be represented as `size = 576 * 2^n` where `n` in `0..=3`.
    Pow2Mul576(u8),
    /// Size that is stored in a byte at the end of [`FrameHeader`].
    ExtraByte(u8),
    /// Size that is stored in two bytes at the end of [`FrameHeader`].
    ExtraTwoBytes(u16),
    /// Size that can be represented as `size = 256 * 2^n` where `n` in `0..=8`.
    Pow2Mul256(u8),
}

impl BlockSizeSpec {
    /// Constructs `BlockSizeSpec` from a size in samples.
    #[inline]
    pub fn from_size(size: u16) -> Self {
        match size {
            192 => Self::S192,
            576 | 1152 | 2304 | 4608 => Self::Pow2Mul576(ilog2(u32::from(size / 576)) as u8),
            256 | 512 | 1024 | 2048 | 4096 | 8192 | 16384 | 32768 => {
                Self::Pow2Mul256(ilog2(u32::from(size / 256)) as u8)
            }
            x if x <= 256 => Self::ExtraByte((x - 1) as u8),
            x => Self::ExtraTwoBytes(x - 1),
        }
    }

    /// Returns the number of extra bytes that follow the number field.
    #[inline]
    pub const fn count_extra_bytes(self) -> usize {
        match self {
            Self::ExtraByte(_) => 1,
            Self::ExtraTwoBytes(_) => 2,
            Self::S192 | Self::Pow2Mul576(_) | Self::Pow2Mul256(_) => 0,
        }
    }

    /// Returns the block size in samples.
    #[inline]
    pub const fn block_size(self) -> usize {
        match self {
            Self::S192 => 192,
            Self::Pow2Mul576(x) => 576usize << x,
            Self::ExtraByte(x) => x as usize + 1,
            Self::ExtraTwoBytes(x) => x as usize + 1,
            Self::Pow2Mul256(x) => 256usize << x,
        }
    }

    /// Returns the 4-bit indicator for the block-size specifier.
    #[inline]
    pub const fn tag(self) -> u8 {
        match self {
            Self::S192 => 1,
            Self::Pow2Mul576(x) => 2 + x,
            Self::ExtraByte(_) => 6,
            Self::ExtraTwoBytes(_) => 7,
            Self::Pow2Mul256(x) => 8 + x,
        }
    }

    /// Writes the extra data field to `dest`.
    #[inline]
    pub fn write_extra_bits<S: BitSink>(self, dest: &mut S) {
        match self {
            Self::ExtraByte(v) => dest.write_lsbs(v, 8),
            Self::ExtraTwoBytes(v) => dest.write_lsbs(v, 16),
            Self::S192 | Self::Pow2Mul576(_) | Self::Pow2Mul256(_) => {}
        }
    }
}

/// Enum for the sample-rate specifier in [`FrameHeader`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SampleRateSpec {
    /// Instructs decoders to get the sample rate from `STREAMINFO`.
    Unspecified,
    /// 88.2kHz.
    R88_2kHz,
    /// 176.4kHz.
    R176_4kHz,
    /// 192kHz.
    R192kHz,
    /// 8kHz.
    R8kHz,
    /// 16kHZ.
    R16kHz,
    /// 22.05kHz.
    R22_05kHz,
    /// 24kHz.
    R24kHz,
    /// 32kHz.
    R32kHz,
    /// 44.1kHz.
    R44_1kHz,
    /// 48kHz.
    R48kHz,
    /// 96kHz.
    R96kHz,
    /// An immediate value specifying kHz up to 255kHz.
    KHz(u8),
    /// An immediate value specifying Hz up to 65535Hz.
    Hz(u16),
    /// An immediate value specifying deca-Hz up to 655.35kHz.
    DaHz(u16),
}

impl SampleRateSpec {
    /// Constructs `SampleRateSpec` from the 4-bit tag and its extra data.
    #[inline]
    pub(crate) fn from_tag_and_data(tag: u8, value: Option<usize>) -> Option<Self> {
        if tag > 0b1110 {
            return None;
        }
        Some(match tag {
            0b0000 => Self::Unspecified,
            0b0001 => Self::R88_2kHz,
            0b0010 => Self::R176_4kHz,
            0b0011 => Self::R192kHz,
            0b0100 => Self::R8kHz,
            0b0101 => Self::R16kHz,
            0b0110 => Self::R22_05kHz,
            0b0111 => Self::R24kHz,
            0b1000 => Self::R32kHz,
            0b1001 => Self::R44_1kHz,
            0b1010 => Self::R48kHz,
            0b1011 => Self::R96kHz,
            0b1100 => Self::KHz(value? as u8),
            0b1101 => Self::Hz(value? as u16),
            0b1110 => Self::DaHz(value? as u16),
            _ => unreachable!(), // this arm is covered in the first if-stmt of this fn.
        })
    }

    /// Returns the number of extra bytes that follow the number field.
    #[inline]
    pub const fn count_extra_bytes(self) -> usize {
        match self {
            Self::KHz(_) => 1,
            Self::DaHz(_) | Self::Hz(_) => 2,
            Self::Unspecified
            | Self::R88_2kHz
            | Self::R176_4kHz
            | Self::R192kHz
            | Self::R8kHz
            | Self::R16kHz
            | Self::R22_05kHz
            | Self::R24kHz
            | Self::R32kHz
            | Self::R44_1kHz
            | Self::R48kHz
            | Self::R96kHz => 0,
        }
    }
}

/// Enum for supported sample sizes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SampleSizeSpec {
    /// Instructs decoders to get the sample size from `STREAMINFO`.
    Unspecified = 0,
    /// 8 bits-per-sample.
    B8 = 1,
    /// 12 bits-per-sample.
    B12 = 2,
    /// `tag == 3` is reserved.
    Reserved = 3,
    /// 16 bits-per-sample.
    B16 = 4,
    /// 20 bits-per-sample.
    B20 = 5,
    /// 24 bits-per-sample.
    B24 = 6,
    /// 32 bits-per-sample.
    B32 = 7,
}

impl SampleSizeSpec {
    /// Constructs `SampleSizeSpec` from the tag (an integer in the bitstream).
    #[inline]
    pub const fn from_tag(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unspecified),
            1 => Some(Self::B8),
            2 => Some(Self::B12),
            3 => Some(Self::Reserved),
            4 => Some(Self::B16),
            5 => Some(Self::B20),
            6 => Some(Self::B24),
            7 => Some(Self::B32),
            _ => None,
        }
    }

    /// Returns the tag (an integer in the bitstream) corresponding to `self`.
    #[inline]
    pub const fn into_tag(self) -> u8 {
        self as u8
    }

    /// Constructs `SampleSizeSpec` from the bits-per-sample value.
    #[inline]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            8 => Some(Self::B8),
            12 => Some(Self::B12),
            16 => Some(Self::B16),
            20 => Some(Self::B20),
            24 => Some(Self::B24),
            32 => Some(Self::B32),
            _ => None,
        }
    }

    /// Returns the bits-per-sample value corresponding to `self`.
    #[inline]
    pub const fn into_bits(self) -> Option<u8> {
        match self {
            Self::Unspecified | Self::Reserved => None,
            Self::B8 => Some(8),
            Self::B12 => Some(12),
            Self::B16 => Some(16),
            Self::B20 => Some(20),
            Self::B24 => Some(24),
            Self::B32 => Some(32),
        }
    }
}

/// Enum for channel assignment in [`FrameHeader`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChannelAssignment {
    /// The frame contains multiple channels independently.
    ///
    /// The `u8` field indicates the number of channels. This is the only
    /// option if the number of channels is not two.
    Independent(u8),
    /// The frame contains left and side channels.
    LeftSide,
    /// The frame contains right and side channels.
    RightSide,
    /// The frame contains mid and side channels.
    MidSide,
}

impl ChannelAssignment {
    /// Constructs `ChannelAssignment` from the tag.
    #[inline]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        if tag < 8 {
            Some(Self::Independent(tag + 1))
        } else if tag == 8 {
            Some(Self::LeftSide)
        } else if tag == 9 {
            Some(Self::RightSide)
        } else if tag == 10 {
            Some(Self::MidSide)
        } else {
            None
        }
    }

    /// Returns the 4-bit tag corresponding to `self`.
    #[inline]
    pub const fn tag(&self) -> u8 {
        match *self {
            Self::Independent(n) => n - 1,
            Self::LeftSide => 8,
            Self::RightSide => 9,
            Self::MidSide => 10,
        }
    }

    /// Returns the number of extra bits required to store channel samples.
    ///
    /// "Side" signals require an extra bit for storing differences such as
    /// `i32::MAX - i32::MIN`. This function maps `ChannelAssignment` and
    /// channel id `ch` to the number of extra bits required (0 or 1).
    #[inline]
    pub const fn bits_per_sample_offset(&self, ch: usize) -> usize {
        #[allow(clippy::match_same_arms, clippy::bool_to_int_with_if)]
        match *self {
            Self::Independent(_) => 0,
            Self::LeftSide => {
                if ch == 1 {
                    1 // side
                } else {
                    0 // left
                }
            }
            Self::RightSide => {
                if ch == 0 {
                    1 // side
                } else {
                    0 // right
                }
            }
            Self::MidSide => {
                if ch == 1 {
                    1 // side
                } else {
                    0 // mid
                }
            }
        }
    }

    /// Returns the number of channels in the frame.
    #[inline]
    pub const fn channels(&self) -> usize {
        if let Self::Independent(n) = self {
            *n as usize
        } else {
            2
        }
    }
}

/// The frame-number field: a frame count or a starting-sample number.
///
/// `Self::Frame` implies fixed-blocking mode, and `Self::StartSample`
/// implies variable-blocking mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FrameNumber {
    /// Number of frames preceding this one (fixed-blocksize streams).
    Frame(u32),
    /// Number of samples preceding this frame (variable-blocksize streams).
    StartSample(u64),
}

impl FrameNumber {
    /// Returns the raw coded value regardless of the blocking mode.
    #[inline]
    pub const fn value(&self) -> u64 {
        match *self {
            Self::Frame(n) => n as u64,
            Self::StartSample(n) => n,
        }
    }
}

/// Parsed view of a frame header.
#[derive(Clone, Debug)]
pub struct FrameHeader {
    number: FrameNumber,
    number_width: usize,
    block_size_spec: BlockSizeSpec,
    channel_assignment: ChannelAssignment,
    sample_size_spec: SampleSizeSpec,
    sample_rate_spec: SampleRateSpec,
}

impl FrameHeader {
    pub(crate) const fn from_parts(
        number: FrameNumber,
        number_width: usize,
        block_size_spec: BlockSizeSpec,
        channel_assignment: ChannelAssignment,
        sample_size_spec: SampleSizeSpec,
        sample_rate_spec: SampleRateSpec,
    ) -> Self {
        Self {
            number,
            number_width,
            block_size_spec,
            channel_assignment,
            sample_size_spec,
            sample_rate_spec,
        }
    }

    /// Returns the coded frame/sample number.
    #[inline]
    pub const fn number(&self) -> FrameNumber {
        self.number
    }

    /// Returns the byte length the coded number occupied in the input.
    #[inline]
    pub const fn number_width(&self) -> usize {
        self.number_width
    }

    /// Returns true when the header is in variable-blocking mode.
    #[inline]
    pub const fn is_variable_blocking(&self) -> bool {
        matches!(self.number, FrameNumber::StartSample(_))
    }

    /// Returns block size in samples.
    #[inline]
    pub const fn block_size(&self) -> usize {
        self.block_size_spec.block_size()
    }

    /// Returns block size spec.
    #[inline]
    pub const fn block_size_spec(&self) -> BlockSizeSpec {
        self.block_size_spec
    }

    /// Returns sample rate spec.
    #[inline]
    pub const fn sample_rate_spec(&self) -> SampleRateSpec {
        self.sample_rate_spec
    }

    /// Returns bits-per-sample, when the header specifies it.
    ///
    /// `None` instructs decoders to take the value from `STREAMINFO`.
    #[inline]
    pub fn bits_per_sample(&self) -> Option<usize> {
        self.sample_size_spec.into_bits().map(|x| x as usize)
    }

    /// Returns [`ChannelAssignment`] of this frame.
    #[inline]
    pub const fn channel_assignment(&self) -> &ChannelAssignment {
        &self.channel_assignment
    }
}

/// Prediction residual coded with partitioned Rice coding.
///
/// Warm-up positions carry zero quotients/remainders so that one entry
/// exists per sample of the block.
#[derive(Clone, Debug)]
pub struct Residual {
    partition_order: u8,
    block_size: usize,
    rice_params: Vec<u8>,
    quotients: Vec<u32>,  // one quotient per sample.
    remainders: Vec<u32>, // one remainder per sample.
}

impl Residual {
    pub(crate) fn from_parts(
        partition_order: u8,
        block_size: usize,
        rice_params: Vec<u8>,
        quotients: Vec<u32>,
        remainders: Vec<u32>,
    ) -> Self {
        Self {
            partition_order,
            block_size,
            rice_params,
            quotients,
            remainders,
        }
    }

    #[inline]
    pub(crate) const fn partition_order(&self) -> u8 {
        self.partition_order
    }

    #[inline]
    pub(crate) const fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub(crate) fn rice_params(&self) -> &[u8] {
        &self.rice_params
    }

    #[inline]
    pub(crate) fn quotients(&self) -> &[u32] {
        &self.quotients
    }

    #[inline]
    pub(crate) fn remainders(&self) -> &[u32] {
        &self.remainders
    }
}

/// `CONSTANT` subframe.
#[derive(Clone, Debug)]
pub struct Constant {
    block_size: usize,
    dc_offset: i32,
    wasted_bits: u8,
}

impl Constant {
    pub(crate) const fn from_parts(block_size: usize, dc_offset: i32, wasted_bits: u8) -> Self {
        Self {
            block_size,
            dc_offset,
            wasted_bits,
        }
    }

    #[inline]
    pub(crate) const fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub(crate) const fn dc_offset(&self) -> i32 {
        self.dc_offset
    }
}

/// `VERBATIM` subframe.
#[derive(Clone, Debug)]
pub struct Verbatim {
    samples: Vec<i32>,
    wasted_bits: u8,
}

impl Verbatim {
    pub(crate) const fn from_parts(samples: Vec<i32>, wasted_bits: u8) -> Self {
        Self {
            samples,
            wasted_bits,
        }
    }

    #[inline]
    pub(crate) fn samples(&self) -> &[i32] {
        &self.samples
    }
}

/// `SUBFRAME_FIXED`: fixed-coefficient linear prediction.
#[derive(Clone, Debug)]
pub struct FixedLpc {
    warm_up: heapless::Vec<i32, MAX_FIXED_ORDER>,
    residual: Residual,
    wasted_bits: u8,
}

impl FixedLpc {
    pub(crate) const fn from_parts(
        warm_up: heapless::Vec<i32, MAX_FIXED_ORDER>,
        residual: Residual,
        wasted_bits: u8,
    ) -> Self {
        Self {
            warm_up,
            residual,
            wasted_bits,
        }
    }

    #[inline]
    pub(crate) fn warm_up(&self) -> &[i32] {
        &self.warm_up
    }

    #[inline]
    pub(crate) const fn residual(&self) -> &Residual {
        &self.residual
    }
}

/// `SUBFRAME_LPC`: quantized linear prediction.
#[derive(Clone, Debug)]
pub struct Lpc {
    warm_up: Vec<i32>,
    coefs: Vec<i16>,
    shift: i8,
    residual: Residual,
    wasted_bits: u8,
}

impl Lpc {
    pub(crate) const fn from_parts(
        warm_up: Vec<i32>,
        coefs: Vec<i16>,
        shift: i8,
        residual: Residual,
        wasted_bits: u8,
    ) -> Self {
        Self {
            warm_up,
            coefs,
            shift,
            residual,
            wasted_bits,
        }
    }

    #[inline]
    pub(crate) fn warm_up(&self) -> &[i32] {
        &self.warm_up
    }

    #[inline]
    pub(crate) fn coefs(&self) -> &[i16] {
        &self.coefs
    }

    #[inline]
    pub(crate) const fn shift(&self) -> i8 {
        self.shift
    }

    #[inline]
    pub(crate) const fn residual(&self) -> &Residual {
        &self.residual
    }
}

/// `SUBFRAME` component.
#[derive(Clone, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum SubFrame {
    /// This variant contains a [`Constant`] sub-frame.
    Constant(Constant),
    /// This variant contains a [`Verbatim`] sub-frame.
    Verbatim(Verbatim),
    /// This variant contains a [`FixedLpc`] sub-frame.
    FixedLpc(FixedLpc),
    /// This variant contains an [`Lpc`] sub-frame.
    Lpc(Lpc),
}

impl SubFrame {
    #[inline]
    pub(crate) const fn wasted_bits(&self) -> u8 {
        match self {
            Self::Constant(c) => c.wasted_bits,
            Self::Verbatim(c) => c.wasted_bits,
            Self::FixedLpc(c) => c.wasted_bits,
            Self::Lpc(c) => c.wasted_bits,
        }
    }
}

impl From<Constant> for SubFrame {
    fn from(c: Constant) -> Self {
        Self::Constant(c)
    }
}

impl From<Verbatim> for SubFrame {
    fn from(c: Verbatim) -> Self {
        Self::Verbatim(c)
    }
}

impl From<FixedLpc> for SubFrame {
    fn from(c: FixedLpc) -> Self {
        Self::FixedLpc(c)
    }
}

impl From<Lpc> for SubFrame {
    fn from(c: Lpc) -> Self {
        Self::Lpc(c)
    }
}

/// A parsed frame: header plus one subframe per channel.
#[derive(Clone, Debug)]
pub struct Frame {
    header: FrameHeader,
    subframes: Vec<SubFrame>,
}

impl Frame {
    pub(crate) fn from_parts(header: FrameHeader, subframes: Vec<SubFrame>) -> Self {
        Self { header, subframes }
    }

    /// Returns a reference to the [`FrameHeader`] of this frame.
    #[inline]
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    /// Returns the [`SubFrame`] for the given channel.
    #[inline]
    pub fn subframe(&self, ch: usize) -> Option<&SubFrame> {
        self.subframes.get(ch)
    }

    /// Returns the number of [`SubFrame`]s in this `Frame`.
    #[inline]
    pub fn subframe_count(&self) -> usize {
        self.subframes.len()
    }

    #[inline]
    pub(crate) fn subframes(&self) -> &[SubFrame] {
        &self.subframes
    }

    /// Returns block size of this frame.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.header.block_size()
    }
}
