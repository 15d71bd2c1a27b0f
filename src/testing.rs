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

//! Shared helpers for the test modules: a hasher with predictable output so
//! tests can dictate the exact digit sequence of a hash, and a value type
//! that collides at the full hash width.

use std::hash::{Hash, Hasher};

use crate::HashTrie;

/// Passes integer values through as their own hash, so a test controls the
/// trie shape digit by digit.
#[derive(Default)]
pub struct IdentityHasher {
    state: u64,
}

impl Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for (i, &byte) in bytes.iter().take(8).enumerate() {
            self.state |= (byte as u64) << (8 * i);
        }
    }

    fn write_u32(&mut self, i: u32) {
        self.state = i as u64;
    }

    fn write_u64(&mut self, i: u64) {
        self.state = i;
    }

    fn write_usize(&mut self, i: usize) {
        self.state = i as u64;
    }
}

pub type IdentityHashTrie<T> = HashTrie<T, IdentityHasher>;

/// Distinct values whose hash covers only their `bucket`, so values sharing
/// a bucket collide at the full hash width.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct CollidingValue {
    bucket: u64,
    tag: u64,
}

impl CollidingValue {
    pub fn new(bucket: u64, tag: u64) -> CollidingValue {
        CollidingValue { bucket, tag }
    }
}

impl Hash for CollidingValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.bucket);
    }
}
