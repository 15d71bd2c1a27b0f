// Copyright (c) 2013, 2014, 2015, 2016 Michael Woerister
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

//! Decomposition of a 64-bit hash value into a sequence of 5-bit digits, and
//! the sparse/compact index arithmetic used by the bitmap-compressed branch
//! nodes.

// The number of hash-value bits consumed per tree level.
pub(crate) const BITS_PER_LEVEL: usize = 5;
// Masks off the bits of the current digit.
pub(crate) const LEVEL_BIT_MASK: u64 = (1 << BITS_PER_LEVEL) - 1;
// The deepest level the tree can have; the last level uses whatever hash bits
// remain after the full 5-bit digits are consumed.
pub(crate) const MAX_DEPTH: usize = (64 + BITS_PER_LEVEL - 1) / BITS_PER_LEVEL;

/// A cursor over the 5-bit digits of a hash value, from least significant to
/// most significant. The original hash is preserved for whole-hash
/// comparisons while `shifted` tracks the remaining digits.
#[derive(Copy, Clone, Debug)]
pub(crate) struct ChunkedHash {
    hash: u64,
    shifted: u64,
}

impl ChunkedHash {
    pub fn new(hash: u64) -> ChunkedHash {
        ChunkedHash {
            hash,
            shifted: hash,
        }
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// The digit at the cursor's current level.
    pub fn chunk(&self) -> SparseIndex {
        SparseIndex::new((self.shifted & LEVEL_BIT_MASK) as usize)
    }

    pub fn advance(&mut self) {
        self.shifted >>= BITS_PER_LEVEL;
    }

    // Shifts past the hash width saturate to zero rather than wrapping.
    pub fn advance_by(&mut self, levels: usize) {
        self.shifted = self
            .shifted
            .checked_shr((BITS_PER_LEVEL * levels) as u32)
            .unwrap_or(0);
    }

    pub fn advanced_by(mut self, levels: usize) -> ChunkedHash {
        self.advance_by(levels);
        self
    }
}

/// A digit in `[0, 32)`, indexing the conceptual 32-slot sparse child array
/// of a branch node.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) struct SparseIndex(usize);

impl SparseIndex {
    pub fn new(value: usize) -> SparseIndex {
        debug_assert!(value < (1 << BITS_PER_LEVEL));
        SparseIndex(value)
    }

    pub fn value(self) -> usize {
        self.0
    }

    pub fn bit_position(self) -> u32 {
        1 << self.0
    }

    pub fn is_set_in(self, bitmap: u32) -> bool {
        bitmap & self.bit_position() != 0
    }

    /// The offset of this digit's slot within the packed child array
    /// described by `bitmap`.
    pub fn to_compact(self, bitmap: u32) -> CompactIndex {
        let low_mask = self.bit_position() - 1;
        CompactIndex(bit_count(bitmap & low_mask))
    }
}

/// An offset into the physical backing array of a sparse array.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) struct CompactIndex(usize);

impl CompactIndex {
    pub fn new(value: usize) -> CompactIndex {
        CompactIndex(value)
    }

    pub fn value(self) -> usize {
        self.0
    }
}

// count_ones lowers to a hardware popcount where the target has one.
#[inline]
pub(crate) fn bit_count(x: u32) -> usize {
    x.count_ones() as usize
}
