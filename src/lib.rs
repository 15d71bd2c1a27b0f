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

//! A persistent hash set based on a Hash Array Mapped Trie, following the
//! [Ideal Hash Trees](http://lampwww.epfl.ch/papers/idealhashtrees.pdf) paper
//! by Phil Bagwell. Sets are immutable values with structural sharing:
//! inserting produces a new set version in O(depth) allocations while every
//! previously obtained version stays valid, and cloning a set costs one
//! reference-count increment.
//!
//! On top of the plain [`HashTrie`] value, [`SharedHashTrie`] publishes one
//! trie version through a double-word atomic cell. Writers derive a new
//! version privately and install it with a single compare-exchange, either
//! directly through a [`Transaction`] or through the retrying
//! `update_with` combinator — optimistic concurrency without locks.
//!
//! The element type supplies hashing and equality through the standard
//! `Hash` and `Eq` traits; the hasher is a type parameter defaulting to the
//! standard library's `DefaultHasher`.

pub use crate::iter::Iter;
pub use crate::node::{BranchNode, LeafNode};
pub use crate::shared::{SharedHashTrie, Transaction};
pub use crate::trie::{HashTrie, Path};

#[cfg(debug_assertions)]
pub use crate::node::live_refs;

mod chunk;
mod iter;
mod node;
mod shared;
mod trie;

#[cfg(test)]
mod testing;
