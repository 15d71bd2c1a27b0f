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

//! The persistent set itself: path descent, the insertion algorithm, and the
//! [`HashTrie`] façade that owns a root descriptor.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;

use static_assertions::const_assert_eq;

use crate::chunk::{ChunkedHash, SparseIndex, MAX_DEPTH};
use crate::iter::Iter;
use crate::node::{self, BranchNode, LeafNode, NodeHeader, NodeRef, NodeView};

pub(crate) fn hash_of<T: Hash, H: Hasher + Default>(value: &T) -> u64 {
    let mut hasher: H = Default::default();
    value.hash(&mut hasher);
    hasher.finish()
}

//=-------------------------------------------------------------------------------------------------
// Path
//=-------------------------------------------------------------------------------------------------

/// The descent from a root for one hash value: the `(branch, digit)` pairs
/// passed through, the deepest branch reached, and the leaf found at the
/// final slot, if any. A path borrows the trie it was produced from and
/// never touches reference counts.
pub struct Path<'a, T> {
    branches: [Option<&'a BranchNode<T>>; MAX_DEPTH],
    chunks: [SparseIndex; MAX_DEPTH],
    depth: usize,
    last_branch: &'a BranchNode<T>,
    cursor: ChunkedHash,
    leaf: Option<&'a LeafNode<T>>,
}

impl<'a, T> Path<'a, T> {
    pub(crate) fn descend(root: &'a BranchNode<T>, hash: u64) -> Path<'a, T> {
        let mut branches = [None; MAX_DEPTH];
        let mut chunks = [SparseIndex::new(0); MAX_DEPTH];
        let mut depth = 0;
        let mut cursor = ChunkedHash::new(hash);
        let mut last_branch = root;

        loop {
            let chunk = cursor.chunk();
            match last_branch.get(chunk).map(|child| child.view()) {
                Some(NodeView::Branch(branch)) => {
                    debug_assert!(depth < MAX_DEPTH);
                    branches[depth] = Some(last_branch);
                    chunks[depth] = chunk;
                    depth += 1;
                    last_branch = branch;
                    cursor.advance();
                }
                Some(NodeView::Leaf(leaf)) => {
                    return Path {
                        branches,
                        chunks,
                        depth,
                        last_branch,
                        cursor,
                        leaf: Some(leaf),
                    };
                }
                None => {
                    return Path {
                        branches,
                        chunks,
                        depth,
                        last_branch,
                        cursor,
                        leaf: None,
                    };
                }
            }
        }
    }

    /// The leaf the descent ended on, or `None` if it ended at an empty
    /// slot. A non-empty leaf does not by itself mean the sought value is
    /// present; check [`LeafNode::find`] or [`Path::contains`].
    pub fn leaf(&self) -> Option<&'a LeafNode<T>> {
        self.leaf
    }

    /// Whether the path's leaf holds an element equal to `value`.
    pub fn contains(&self, value: &T) -> bool
    where
        T: Eq,
    {
        self.leaf.map_or(false, |leaf| leaf.find(value).is_some())
    }

    // The number of (branch, digit) pairs recorded above `last_branch`.
    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn last_branch(&self) -> &'a BranchNode<T> {
        self.last_branch
    }

    pub(crate) fn whole_hash(&self) -> u64 {
        self.cursor.hash()
    }

    pub(crate) fn hash_chunk(&self) -> SparseIndex {
        self.cursor.chunk()
    }

    pub(crate) fn cursor(&self) -> ChunkedHash {
        self.cursor
    }

    // Rebuilds the spine above `last_branch`: `new_branch` replaces
    // `last_branch`, then each recorded parent is rewritten bottom-up. The
    // result is the new root.
    pub(crate) fn rewrite(&self, new_branch: NodeRef<T>) -> NodeRef<T> {
        let mut current = new_branch;
        for level in (0..self.depth).rev() {
            let parent = match self.branches[level] {
                Some(branch) => branch,
                None => unreachable!(),
            };
            current = parent.with_replaced(self.chunks[level], current);
        }
        current
    }
}

//=-------------------------------------------------------------------------------------------------
// Insertion
//=-------------------------------------------------------------------------------------------------

fn add_value_at_empty_slot<T>(path: &Path<'_, T>, new_leaf: NodeRef<T>) -> NodeRef<T> {
    let new_branch = path.last_branch().with_inserted(path.hash_chunk(), new_leaf);
    path.rewrite(new_branch)
}

// Builds the chain of single-child branches covering the digits the two
// hashes still share, ending in a two-leaf branch at the first divergence.
// The existing leaf is re-parented into the new subtree, so it gains a
// reference here.
fn extend<T>(
    existing_hash: ChunkedHash,
    existing_leaf: &LeafNode<T>,
    new_hash: ChunkedHash,
    new_leaf: NodeRef<T>,
) -> NodeRef<T> {
    if existing_hash.chunk() == new_hash.chunk() {
        let child = extend(
            existing_hash.advanced_by(1),
            existing_leaf,
            new_hash.advanced_by(1),
            new_leaf,
        );
        BranchNode::create_single(new_hash.chunk(), child)
    } else {
        BranchNode::create_pair(
            existing_hash.chunk(),
            existing_leaf.to_ref(),
            new_hash.chunk(),
            new_leaf,
        )
    }
}

fn add_value_at_leaf<T: Eq + Clone>(
    path: &Path<'_, T>,
    existing_leaf: &LeafNode<T>,
    value: T,
) -> Option<NodeRef<T>> {
    // If the value already exists we're done
    if existing_leaf.find(&value).is_some() {
        return None;
    }

    // Same full hash: the new value joins the leaf's collision array
    if existing_leaf.hash() == path.whole_hash() {
        let new_leaf = existing_leaf.with_appended_value(value);
        let new_branch = path.last_branch().with_replaced(path.hash_chunk(), new_leaf);
        return Some(path.rewrite(new_branch));
    }

    // Different hash: add branches down to the point where the two diverge
    let existing_hash = ChunkedHash::new(existing_leaf.hash()).advanced_by(path.depth());
    let new_leaf = LeafNode::create(value, path.whole_hash());
    let subtree = extend(
        existing_hash.advanced_by(1),
        existing_leaf,
        path.cursor().advanced_by(1),
        new_leaf,
    );
    let new_branch = path.last_branch().with_replaced(path.hash_chunk(), subtree);
    Some(path.rewrite(new_branch))
}

// Returns the root of the new trie version, or None if `value` was already
// present and no new version is needed.
fn inserted<T, H>(root: &BranchNode<T>, value: T) -> Option<NodeRef<T>>
where
    T: Eq + Hash + Clone,
    H: Hasher + Default,
{
    let path = Path::descend(root, hash_of::<T, H>(&value));
    match path.leaf() {
        Some(existing_leaf) => add_value_at_leaf(&path, existing_leaf, value),
        None => {
            let new_leaf = LeafNode::create(value, path.whole_hash());
            Some(add_value_at_empty_slot(&path, new_leaf))
        }
    }
}

//=-------------------------------------------------------------------------------------------------
// Root descriptor
//=-------------------------------------------------------------------------------------------------

// Identifies one trie version: the root branch plus the element count. Two
// machine words, so the shared handle can publish it with a single
// compare-exchange. Plain data; holding a RootDesc does not by itself own a
// reference to the root.
pub(crate) struct RootDesc<T> {
    pub(crate) root: *const NodeHeader,
    pub(crate) size: usize,
    _marker: PhantomData<*const T>,
}

const_assert_eq!(mem::size_of::<RootDesc<()>>(), 16);

impl<T> RootDesc<T> {
    pub(crate) fn new(root: *const NodeHeader, size: usize) -> RootDesc<T> {
        RootDesc {
            root,
            size,
            _marker: PhantomData,
        }
    }

    pub(crate) fn pack(self) -> u128 {
        ((self.size as u128) << 64) | (self.root as usize as u128)
    }

    pub(crate) fn unpack(bits: u128) -> RootDesc<T> {
        RootDesc::new((bits as u64) as usize as *const NodeHeader, (bits >> 64) as usize)
    }
}

impl<T> Clone for RootDesc<T> {
    fn clone(&self) -> RootDesc<T> {
        *self
    }
}

impl<T> Copy for RootDesc<T> {}

//=-------------------------------------------------------------------------------------------------
// HashTrie
//=-------------------------------------------------------------------------------------------------

/// A persistent hash set. Cloning is O(1) and shares structure; `insert`
/// replaces this handle's root with a new version and leaves every
/// previously cloned handle untouched.
///
/// A single `HashTrie` is a plain value and must not be mutated from several
/// threads; share updates through
/// [`SharedHashTrie`](crate::SharedHashTrie) instead.
pub struct HashTrie<T, H = DefaultHasher> {
    root: NodeRef<T>,
    size: usize,
    _hasher: PhantomData<H>,
}

impl<T, H> HashTrie<T, H> {
    /// Creates an empty set.
    pub fn new() -> HashTrie<T, H> {
        HashTrie {
            root: BranchNode::create_empty(),
            size: 0,
            _hasher: PhantomData,
        }
    }

    /// The number of elements in the set.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Iterates over the elements in unspecified order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self.root_branch(), self.size)
    }

    pub(crate) fn root_branch(&self) -> &BranchNode<T> {
        self.root.expect_branch()
    }

    pub(crate) fn root_ptr(&self) -> *const NodeHeader {
        self.root.as_ptr()
    }

    pub(crate) fn descriptor(&self) -> RootDesc<T> {
        RootDesc::new(self.root.as_ptr(), self.size)
    }

    // Materialises a trie for `desc`, taking its own reference on the root.
    // The caller must guarantee the root outlives the call, e.g. by holding
    // a reference of its own.
    pub(crate) unsafe fn from_descriptor(desc: RootDesc<T>) -> HashTrie<T, H> {
        node::addref(desc.root);
        HashTrie {
            root: NodeRef::from_raw(desc.root),
            size: desc.size,
            _hasher: PhantomData,
        }
    }
}

impl<T, H> HashTrie<T, H>
where
    T: Eq + Hash,
    H: Hasher + Default,
{
    /// Descends the trie for `value`'s hash and returns the resulting path.
    pub fn find(&self, value: &T) -> Path<'_, T> {
        Path::descend(self.root_branch(), hash_of::<T, H>(value))
    }

    pub fn contains(&self, value: &T) -> bool {
        self.find(value).contains(value)
    }
}

impl<T, H> HashTrie<T, H>
where
    T: Eq + Hash + Clone,
    H: Hasher + Default,
{
    /// Inserts `value`, replacing this handle's root with the new trie
    /// version. Returns `true` if the set grew, `false` if the value was
    /// already present.
    pub fn insert(&mut self, value: T) -> bool {
        match inserted::<T, H>(self.root_branch(), value) {
            Some(new_root) => {
                // the assignment releases the old root
                self.root = new_root;
                self.size += 1;
                true
            }
            None => false,
        }
    }
}

impl<T, H> Clone for HashTrie<T, H> {
    fn clone(&self) -> HashTrie<T, H> {
        HashTrie {
            root: self.root.clone(),
            size: self.size,
            _hasher: PhantomData,
        }
    }
}

impl<T, H> Default for HashTrie<T, H> {
    fn default() -> HashTrie<T, H> {
        HashTrie::new()
    }
}

impl<T, H> fmt::Debug for HashTrie<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashTrie")
            .field("len", &self.size)
            .finish_non_exhaustive()
    }
}

impl<T, H> PartialEq for HashTrie<T, H>
where
    T: Eq + Hash,
    H: Hasher + Default,
{
    fn eq(&self, other: &HashTrie<T, H>) -> bool {
        self.len() == other.len() && self.iter().all(|value| other.contains(value))
    }
}

impl<T, H> Eq for HashTrie<T, H>
where
    T: Eq + Hash,
    H: Hasher + Default,
{
}

impl<T, H> Extend<T> for HashTrie<T, H>
where
    T: Eq + Hash + Clone,
    H: Hasher + Default,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T, H> FromIterator<T> for HashTrie<T, H>
where
    T: Eq + Hash + Clone,
    H: Hasher + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> HashTrie<T, H> {
        let mut trie = HashTrie::new();
        trie.extend(iter);
        trie
    }
}

impl<'a, T, H> IntoIterator for &'a HashTrie<T, H> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::seq::SliceRandom;
    use rand::Rng;

    use super::HashTrie;
    use crate::node::NodeView;
    use crate::testing::{CollidingValue, IdentityHashTrie, IdentityHasher};

    #[test]
    fn test_empty_trie() {
        let trie: HashTrie<u64> = HashTrie::new();
        assert_eq!(trie.len(), 0);
        assert!(trie.is_empty());
        assert!(trie.find(&17).leaf().is_none());
        assert!(!trie.contains(&17));
    }

    #[test]
    fn test_simple_insert() {
        let mut trie: HashTrie<u64> = HashTrie::new();
        assert!(trie.insert(42));
        assert_eq!(trie.len(), 1);
        assert!(!trie.is_empty());
        assert!(trie.contains(&42));
        assert!(!trie.contains(&43));
    }

    #[test]
    fn test_redundant_insert() {
        let mut trie: HashTrie<u64> = HashTrie::new();
        assert!(trie.insert(42));
        assert!(!trie.insert(42));
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_insert_ascending() {
        let mut trie: HashTrie<u64> = HashTrie::new();
        for x in 0..1000 {
            assert_eq!(trie.len(), x as usize);
            trie.insert(x);
            assert!(trie.contains(&x));
        }
    }

    #[test]
    fn test_insert_descending() {
        let mut trie: HashTrie<u64> = HashTrie::new();
        for x in 0..1000u64 {
            let value = 999 - x;
            assert_eq!(trie.len(), x as usize);
            trie.insert(value);
            assert!(trie.contains(&value));
        }
    }

    #[test]
    fn test_versions_are_independent() {
        let trie00: HashTrie<u64> = HashTrie::new();
        let mut trie01 = trie00.clone();
        trie01.insert(1);
        let mut trie10 = trie00.clone();
        trie10.insert(2);
        let mut trie11 = trie01.clone();
        trie11.insert(2);

        assert!(!trie00.contains(&1));
        assert!(!trie00.contains(&2));

        assert!(trie01.contains(&1));
        assert!(!trie01.contains(&2));

        assert!(!trie10.contains(&1));
        assert!(trie10.contains(&2));

        assert!(trie11.contains(&1));
        assert!(trie11.contains(&2));

        assert_eq!(trie00.len(), 0);
        assert_eq!(trie01.len(), 1);
        assert_eq!(trie10.len(), 1);
        assert_eq!(trie11.len(), 2);
    }

    #[test]
    fn test_predecessor_unchanged_by_derived_inserts() {
        let mut base: HashTrie<u64> = HashTrie::new();
        for x in 0..100 {
            base.insert(x);
        }
        let before: HashSet<u64> = base.iter().copied().collect();

        let mut derived = base.clone();
        for x in 100..200 {
            derived.insert(x);
        }

        let after: HashSet<u64> = base.iter().copied().collect();
        assert_eq!(before, after);
        assert_eq!(base.len(), 100);
        assert_eq!(derived.len(), 200);
    }

    #[test]
    fn test_collision_leaf() {
        // Values that agree on the full hash but are unequal end up sharing
        // one leaf.
        let mut trie: HashTrie<CollidingValue, IdentityHasher> = HashTrie::new();
        assert!(trie.insert(CollidingValue::new(1, 1)));
        assert!(trie.insert(CollidingValue::new(1, 2)));
        assert!(trie.insert(CollidingValue::new(1, 3)));
        assert!(!trie.insert(CollidingValue::new(1, 2)));
        assert_eq!(trie.len(), 3);

        let probe = CollidingValue::new(1, 2);
        let path = trie.find(&probe);
        let leaf = path.leaf().unwrap();
        assert_eq!(leaf.len(), 3);
        assert_eq!(leaf.hash(), 1);
        assert!(path.contains(&probe));
        assert!(!path.contains(&CollidingValue::new(1, 4)));
    }

    #[test]
    fn test_hash_pattern_shape() {
        // The two hashes share their first two digits and diverge at the
        // third, so the divergence point sits below two stacked single-child
        // branches.
        let mut trie: IdentityHashTrie<u64> = HashTrie::new();
        trie.insert(0b01000_00010_00001);
        trie.insert(0b00100_00010_00001);
        assert_eq!(trie.len(), 2);

        let root = trie.root_branch();
        assert_eq!(root.child_count(), 1);

        let level1 = match root.children()[0].view() {
            NodeView::Branch(branch) => branch,
            NodeView::Leaf(_) => panic!("expected a branch below the root"),
        };
        assert_eq!(level1.child_count(), 1);

        let level2 = match level1.children()[0].view() {
            NodeView::Branch(branch) => branch,
            NodeView::Leaf(_) => panic!("expected a branch at the shared digit"),
        };
        assert_eq!(level2.child_count(), 2);
        for child in level2.children() {
            match child.view() {
                NodeView::Leaf(leaf) => assert_eq!(leaf.len(), 1),
                NodeView::Branch(_) => panic!("expected two leaves at the divergence level"),
            }
        }

        assert!(trie.contains(&0b01000_00010_00001));
        assert!(trie.contains(&0b00100_00010_00001));
        assert!(!trie.contains(&0b11111_00010_00001));
    }

    #[test]
    fn test_non_copy_elements() {
        let mut trie: HashTrie<String> = HashTrie::new();
        for word in ["alpha", "beta", "gamma", "delta"] {
            assert!(trie.insert(word.to_string()));
        }
        assert!(!trie.insert("beta".to_string()));
        assert_eq!(trie.len(), 4);
        assert!(trie.contains(&"gamma".to_string()));

        let collected: HashSet<&str> = trie.iter().map(String::as_str).collect();
        assert_eq!(collected.len(), 4);
        assert!(collected.contains("delta"));
    }

    #[test]
    fn test_size_matches_reachable_leaves() {
        let mut trie: HashTrie<u64> = HashTrie::new();
        for x in 0..500 {
            trie.insert(x * 31);
        }
        assert_eq!(trie.len(), trie.iter().count());
    }

    #[test]
    fn test_commutative_inserts() {
        let mut rng = rand::thread_rng();
        let mut values: Vec<u64> = (0..512).map(|_| rng.gen()).collect();
        values.sort_unstable();
        values.dedup();

        let reference: HashTrie<u64> = values.iter().copied().collect();

        for _ in 0..10 {
            values.shuffle(&mut rng);
            let shuffled: HashTrie<u64> = values.iter().copied().collect();
            assert!(reference == shuffled);
        }
    }

    #[test]
    fn test_eq_detects_missing_element() {
        let reference: HashTrie<u64> = (0..100).collect();
        let smaller: HashTrie<u64> = (0..99).collect();
        let shifted: HashTrie<u64> = (1..101).collect();
        assert!(reference != smaller);
        assert!(reference != shifted);
        assert!(reference == reference.clone());
    }

    #[test]
    fn test_random_inserts_against_std_hashset() {
        let mut rng = rand::thread_rng();
        let mut reference: HashSet<u16> = HashSet::new();
        let mut trie: HashTrie<u16> = HashTrie::new();

        for _ in 0..100_000 {
            let value: u16 = rng.gen();
            let newly_inserted = reference.insert(value);
            assert_eq!(trie.insert(value), newly_inserted);
            assert_eq!(trie.len(), reference.len());
            assert!(trie.contains(&value));
        }

        for value in 0..=u16::MAX {
            assert_eq!(trie.contains(&value), reference.contains(&value));
        }
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_insert_and_drop_are_ref_balanced() {
        use crate::node::live_refs;

        let baseline = live_refs();
        {
            let mut trie: HashTrie<u64> = HashTrie::new();
            trie.insert(42);
            trie.insert(42);
            trie.insert(7);
            let clone = trie.clone();
            drop(trie);
            assert_eq!(clone.len(), 2);
        }
        assert_eq!(live_refs(), baseline);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_hash_pattern_refs_return_to_baseline() {
        use crate::node::live_refs;

        let baseline = live_refs();
        {
            let mut trie: IdentityHashTrie<u64> = HashTrie::new();
            trie.insert(0b01000_00010_00001);
            trie.insert(0b00100_00010_00001);
        }
        assert_eq!(live_refs(), baseline);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_many_versions_are_ref_balanced() {
        use crate::node::live_refs;

        let baseline = live_refs();
        {
            let mut versions: Vec<HashTrie<u64>> = Vec::new();
            let mut trie: HashTrie<u64> = HashTrie::new();
            for x in 0..200 {
                trie.insert(x);
                versions.push(trie.clone());
            }
            versions.truncate(50);
            assert_eq!(versions.last().unwrap().len(), 50);
        }
        assert_eq!(live_refs(), baseline);
    }
}
