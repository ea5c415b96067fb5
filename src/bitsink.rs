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

//! Bit-based output used for assembling metadata blocks.

use std::ops::Shl;

use num_traits::ToBytes;

/// Alias trait for the bit-addressible integers.
pub trait PackedBits: ToBytes + Into<u64> + Shl<usize, Output = Self> + Copy {}

impl<T: ToBytes + Into<u64> + Shl<usize, Output = T> + Copy> PackedBits for T {}

/// Interface trait for bit-based output.
pub trait BitSink: Sized {
    /// Puts zeros until the length aligns to the byte boundaries.
    ///
    /// # Returns
    ///
    /// The number of zeros put.
    fn align_to_byte(&mut self) -> usize;

    /// Writes bytes after alignment, and returns padded bits.
    fn write_bytes_aligned(&mut self, bytes: &[u8]) -> usize {
        let ret = self.align_to_byte();
        for b in bytes {
            self.write_lsbs(*b, 8);
        }
        ret
    }

    /// Writes `n` LSBs to the sink.
    fn write_lsbs<T: PackedBits>(&mut self, val: T, n: usize);

    /// Writes `n` MSBs to the sink.
    fn write_msbs<T: PackedBits>(&mut self, val: T, n: usize);

    /// Writes all bits in `val: PackedBits`.
    fn write<T: PackedBits>(&mut self, val: T);

    /// Writes `val` in two's complement format.
    #[inline]
    fn write_twoc<T: Into<i64>>(&mut self, val: T, bits_per_sample: usize) {
        let val: i64 = val.into();
        let shifted = (val << (64 - bits_per_sample)) as u64;
        self.write_msbs(shifted, bits_per_sample);
    }
}

/// `Vec<u8>`-backed [`BitSink`].
pub struct ByteSink {
    bytes: Vec<u8>,
    bitlength: usize,
}

impl Default for ByteSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteSink {
    /// Creates new `ByteSink` instance with the default capacity.
    pub const fn new() -> Self {
        Self {
            bytes: Vec::new(),
            bitlength: 0usize,
        }
    }

    /// Creates new `ByteSink` instance with the specified capacity (in bits).
    pub fn with_capacity(capacity_in_bits: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity_in_bits / 8 + 1),
            bitlength: 0usize,
        }
    }

    /// Clears the sink, removing all values.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.bitlength = 0;
    }

    /// Returns the number of bits stored.
    pub const fn len(&self) -> usize {
        self.bitlength
    }

    /// Returns true if the sink is empty.
    pub const fn is_empty(&self) -> bool {
        self.bitlength == 0
    }

    /// Returns the content as a byte slice. The tail is zero-padded.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes `self` and returns the content as `Vec<u8>`.
    pub fn into_inner(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns the remaining number of bits in the last byte in `self.bytes`.
    #[inline]
    fn tail_len(&self) -> usize {
        let r = self.bitlength % 8;
        if r == 0 {
            0
        } else {
            8 - r
        }
    }

    /// Returns bits in a string for tests.
    #[cfg(test)]
    fn to_debug_bitstring(&self) -> String {
        let mut ret = String::new();
        for b in &self.bytes {
            ret.push_str(&format!("{b:08b}_"));
        }
        ret.pop();
        ret
    }

    /// Appends first `n` bits (from MSB) to the sink.
    #[inline]
    fn push_u64_msbs(&mut self, val: u64, n: usize) {
        let mut val: u64 = val;
        let mut n = n;
        let nbitlength = self.bitlength + n;
        let r = self.tail_len();

        if r != 0 {
            let b: u8 = ((val >> (64 - r)) & ((1 << r) - 1)) as u8;
            let tail = self.bytes.len() - 1;
            self.bytes[tail] |= b;
            val <<= r;
            n = n.saturating_sub(r);
        }
        while n >= 8 {
            let b: u8 = (val >> (64 - 8) & 0xFFu64) as u8;
            self.bytes.push(b);
            val <<= 8;
            n -= 8;
        }
        if n > 0 {
            let b: u8 = ((val >> (64 - n)) << (8 - n)) as u8;
            self.bytes.push(b);
        }
        self.bitlength = nbitlength;
    }
}

impl BitSink for ByteSink {
    #[inline]
    fn write<T: PackedBits>(&mut self, val: T) {
        let nbitlength = self.bitlength + 8 * std::mem::size_of::<T>();
        let tail = self.tail_len();
        if tail > 0 {
            self.write_msbs(val, tail);
        }
        let val = val << tail;
        let bytes: T::Bytes = val.to_be_bytes();
        self.bytes.extend_from_slice(bytes.as_ref());
        self.bitlength = nbitlength;
    }

    #[inline]
    fn align_to_byte(&mut self) -> usize {
        let r = self.tail_len();
        self.bitlength += r;
        r
    }

    #[inline]
    fn write_bytes_aligned(&mut self, bytes: &[u8]) -> usize {
        let ret = self.align_to_byte();
        self.bytes.extend_from_slice(bytes);
        self.bitlength += 8 * bytes.len();
        ret
    }

    #[inline]
    fn write_msbs<T: PackedBits>(&mut self, val: T, n: usize) {
        if n == 0 {
            return;
        }
        let initial_shift = 64 - (std::mem::size_of::<T>() * 8);
        let val: u64 = val.into();
        self.push_u64_msbs(val << initial_shift, n);
    }

    #[inline]
    fn write_lsbs<T: PackedBits>(&mut self, val: T, n: usize) {
        if n == 0 {
            return;
        }
        let val: u64 = val.into();
        self.push_u64_msbs(val << (64 - n), n);
    }
}
