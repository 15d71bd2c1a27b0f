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

//! Sharing a trie between threads. A [`SharedHashTrie`] keeps the root
//! descriptor in a single double-word atomic cell; writers build a new trie
//! version privately and publish it with one compare-exchange, retrying on
//! contention. A commit linearises at the successful swap: the release store
//! pairs with the acquire loads of readers, so a published descriptor's
//! nodes are fully visible to whoever observes it.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::Ordering;

use portable_atomic::AtomicU128;

use crate::node::{self, BranchNode};
use crate::trie::{HashTrie, RootDesc};

/// A trie handle that can be shared between threads. The handle owns one
/// reference to the currently published root; updates go through
/// [`start_transaction`](SharedHashTrie::start_transaction) or
/// [`update_with`](SharedHashTrie::update_with).
pub struct SharedHashTrie<T, H = DefaultHasher> {
    cell: AtomicU128,
    _marker: PhantomData<(*const T, fn() -> H)>,
}

unsafe impl<T: Send + Sync, H> Send for SharedHashTrie<T, H> {}
unsafe impl<T: Send + Sync, H> Sync for SharedHashTrie<T, H> {}

impl<T, H> SharedHashTrie<T, H> {
    /// Creates a handle publishing an empty trie.
    pub fn new() -> SharedHashTrie<T, H> {
        let root = BranchNode::<T>::create_empty();
        SharedHashTrie {
            cell: AtomicU128::new(RootDesc::<T>::new(root.into_raw(), 0).pack()),
            _marker: PhantomData,
        }
    }

    /// Creates a handle publishing a snapshot of `trie`. Later mutations of
    /// `trie` are not visible through the handle.
    pub fn from_trie(trie: &HashTrie<T, H>) -> SharedHashTrie<T, H> {
        let desc = trie.descriptor();
        unsafe {
            node::addref(desc.root);
        }
        SharedHashTrie {
            cell: AtomicU128::new(desc.pack()),
            _marker: PhantomData,
        }
    }

    pub(crate) fn descriptor(&self) -> RootDesc<T> {
        RootDesc::unpack(self.cell.load(Ordering::Acquire))
    }

    /// A trie for the currently published version. The returned value is an
    /// ordinary [`HashTrie`]; mutating it does not affect the handle.
    pub fn get(&self) -> HashTrie<T, H> {
        unsafe { HashTrie::from_descriptor(self.descriptor()) }
    }

    /// Starts a transaction based on the currently published version.
    pub fn start_transaction(&self) -> Transaction<'_, T, H> {
        Transaction::new(self)
    }

    /// Runs `update` against the published version and commits the result,
    /// retrying until a commit succeeds or `update` leaves the trie
    /// unchanged. See [`Transaction::update_with`] for the constraints on
    /// `update`.
    pub fn update_with<F>(&self, update: F)
    where
        F: Fn(&mut HashTrie<T, H>),
    {
        self.start_transaction().update_with(update);
    }

    /// Whether the descriptor cell is a true lock-free atomic on this
    /// target.
    pub fn is_lock_free(&self) -> bool {
        AtomicU128::is_lock_free()
    }

    // The publication primitive. Swings the cell from `expected` to
    // `proposed`; on success the unpublished root in `expected` gives up the
    // cell's reference and the newly published root in `proposed` gains one.
    // On failure `expected` is overwritten with the current cell value and
    // no reference counts change.
    pub(crate) fn reset(&self, expected: &mut RootDesc<T>, proposed: RootDesc<T>) -> bool {
        match self.cell.compare_exchange(
            expected.pack(),
            proposed.pack(),
            Ordering::Release,
            Ordering::Relaxed,
        ) {
            Ok(_) => {
                unsafe {
                    node::release::<T>(expected.root);
                    node::addref(proposed.root);
                }
                true
            }
            Err(current) => {
                *expected = RootDesc::unpack(current);
                false
            }
        }
    }
}

impl<T, H> Drop for SharedHashTrie<T, H> {
    fn drop(&mut self) {
        let desc = RootDesc::<T>::unpack(self.cell.load(Ordering::Acquire));
        unsafe {
            node::release::<T>(desc.root);
        }
    }
}

impl<T, H> Default for SharedHashTrie<T, H> {
    fn default() -> SharedHashTrie<T, H> {
        SharedHashTrie::new()
    }
}

impl<T, H> fmt::Debug for SharedHashTrie<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedHashTrie")
            .field("len", &self.descriptor().size)
            .finish_non_exhaustive()
    }
}

//=-------------------------------------------------------------------------------------------------
// Transaction
//=-------------------------------------------------------------------------------------------------

/// An optimistic transaction: a snapshot of the published descriptor plus
/// the machinery to commit a derived trie with a single compare-exchange.
/// The transaction keeps its base version alive for its own lifetime.
pub struct Transaction<'a, T, H = DefaultHasher> {
    base: RootDesc<T>,
    shared: &'a SharedHashTrie<T, H>,
}

impl<'a, T, H> Transaction<'a, T, H> {
    fn new(shared: &'a SharedHashTrie<T, H>) -> Transaction<'a, T, H> {
        let base = shared.descriptor();
        unsafe {
            node::addref(base.root);
        }
        Transaction { base, shared }
    }

    /// A trie for the transaction's base version.
    pub fn get(&self) -> HashTrie<T, H> {
        unsafe { HashTrie::from_descriptor(self.base) }
    }

    /// Attempts to publish `trie` over the base version. Returns `false` if
    /// another commit got there first; the transaction is then rebased onto
    /// the published version, so a subsequent [`get`](Transaction::get)
    /// observes the winner's trie.
    pub fn try_commit(&mut self, trie: &HashTrie<T, H>) -> bool {
        let mut expected = self.base;
        if self.shared.reset(&mut expected, trie.descriptor()) {
            true
        } else {
            self.rebase();
            false
        }
    }

    // Re-points the transaction's base reference at the currently published
    // descriptor.
    fn rebase(&mut self) {
        let current = self.shared.descriptor();
        if current.root != self.base.root {
            unsafe {
                node::addref(current.root);
                node::release::<T>(self.base.root);
            }
        }
        self.base = current;
    }

    /// Runs `update` on a working copy of the base version and commits the
    /// result, rebasing and retrying after each lost race until a commit
    /// succeeds or `update` leaves the working copy's root unchanged.
    ///
    /// `update` may run several times, each time against a fresh copy of the
    /// then-current base, and may observe intermediate states that are later
    /// superseded. It must therefore be a pure function of the trie it is
    /// given, free of side effects that survive a retry.
    pub fn update_with<F>(&mut self, update: F)
    where
        F: Fn(&mut HashTrie<T, H>),
    {
        loop {
            let mut working = self.get();
            update(&mut working);

            // If we didn't change anything, don't publish anything
            if working.root_ptr() == self.base.root {
                break;
            }
            if self.try_commit(&working) {
                break;
            }
        }
    }
}

impl<'a, T, H> Drop for Transaction<'a, T, H> {
    fn drop(&mut self) {
        unsafe {
            node::release::<T>(self.base.root);
        }
    }
}
