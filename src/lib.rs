//! # art-rs
//!
//! An ordered in-memory map from byte-string keys to values, backed by an
//! Adaptive Radix Tree (ART).
//!
//! Based on "The Adaptive Radix Tree: ARTful Indexing for Main-Memory
//! Databases" (ICDE 2013, Leis, Kemper and Neumann). Inner nodes adapt
//! their layout to their fan-out (4, 16, 48 or 256 children), single-key
//! subtrees stay collapsed into a leaf until a second key forces a branch,
//! and shared key bytes are stored once per node as a compressed path.
//! Point operations cost O(key length) regardless of how many entries the
//! tree holds.
//!
//! ## Example
//!
//! ```rust
//! use art_rs::ArtTree;
//!
//! let mut tree: ArtTree<u64> = ArtTree::new();
//! tree.insert(b"hello", 1);
//! tree.insert(b"world", 2);
//!
//! assert_eq!(tree.search(b"hello"), Some(&1));
//! assert_eq!(tree.search(b"world"), Some(&2));
//! assert_eq!(tree.search(b"missing"), None);
//! assert_eq!(tree.size(), 2);
//! ```
//!
//! ## Key discipline
//!
//! Before any traversal a key that contains no zero byte gets a single zero
//! byte appended. This keeps the stored key set prefix-free (no stored key
//! is a strict prefix of another), so navigation can consume one byte per
//! level without end-of-key special cases. Keys are copied into the tree;
//! mutating the caller's buffer afterwards does not affect stored entries.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

use std::borrow::Cow;

// ============================================================================
// Configuration
// ============================================================================

/// Compressed path bytes stored inline at each inner node. A path longer
/// than this is truncated in storage and recovered from the smallest leaf
/// below the node (pessimistic path compression).
const MAX_PREFIX_LEN: usize = 10;

// Fan-out bands per inner layout. A node whose child count rises above its
// band grows to the next layout; one that falls below shrinks.
const NODE4_MIN: usize = 2;
const NODE4_MAX: usize = 4;
const NODE16_MIN: usize = 5;
const NODE16_MAX: usize = 16;
const NODE48_MIN: usize = 17;
const NODE48_MAX: usize = 48;
const NODE256_MIN: usize = 49;
const NODE256_MAX: usize = 256;

// ============================================================================
// Key normalization
// ============================================================================

/// Returns the key with a zero byte appended unless it already contains one.
fn ensure_null_terminated(key: &[u8]) -> Cow<'_, [u8]> {
    if key.contains(&0) {
        Cow::Borrowed(key)
    } else {
        let mut owned = Vec::with_capacity(key.len() + 1);
        owned.extend_from_slice(key);
        owned.push(0);
        Cow::Owned(owned)
    }
}

/// Number of consecutive equal bytes of `a` and `b` starting at `depth`,
/// bounded by the shorter remaining length.
fn longest_common_prefix(a: &[u8], b: &[u8], depth: usize) -> usize {
    a[depth..]
        .iter()
        .zip(b[depth..].iter())
        .take_while(|(x, y)| x == y)
        .count()
}

// ============================================================================
// Visitor surface
// ============================================================================

/// The layout of a node handed to an [`ArtTree::each`] visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A leaf holding one key/value pair.
    Leaf,
    /// Inner node with up to 4 children.
    Node4,
    /// Inner node with up to 16 children.
    Node16,
    /// Inner node with up to 48 children.
    Node48,
    /// Inner node with up to 256 children.
    Node256,
}

/// Borrowed view of a single node, passed to [`ArtTree::each`] visitors.
pub struct NodeRef<'a, V> {
    node: &'a Node<V>,
}

impl<'a, V> NodeRef<'a, V> {
    /// The layout of this node.
    pub fn kind(&self) -> NodeKind {
        self.node.kind()
    }

    /// The stored (normalized) key, for leaves. `None` for inner nodes.
    pub fn key(&self) -> Option<&'a [u8]> {
        match self.node {
            Node::Leaf { key, .. } => Some(key.as_slice()),
            _ => None,
        }
    }

    /// The stored value, for leaves. `None` for inner nodes.
    pub fn value(&self) -> Option<&'a V> {
        match self.node {
            Node::Leaf { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Per-layout node counts for one tree, gathered by walking it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of leaves (equals the number of stored entries).
    pub leaf_count: usize,
    /// Number of inner nodes with the 4-child layout.
    pub node4_count: usize,
    /// Number of inner nodes with the 16-child layout.
    pub node16_count: usize,
    /// Number of inner nodes with the 48-child layout.
    pub node48_count: usize,
    /// Number of inner nodes with the 256-child layout.
    pub node256_count: usize,
}

// ============================================================================
// Node header
// ============================================================================

/// Metadata shared by every inner layout: live child count and the
/// compressed path leading to the node.
///
/// `prefix_len` is the logical path length and may exceed `MAX_PREFIX_LEN`;
/// only the first `MAX_PREFIX_LEN` bytes are stored in `prefix`. Bytes past
/// the cap are recovered from the minimum leaf.
#[derive(Clone, Copy)]
struct Header {
    size: u16,
    prefix_len: usize,
    prefix: [u8; MAX_PREFIX_LEN],
}

impl Header {
    fn new() -> Self {
        Self {
            size: 0,
            prefix_len: 0,
            prefix: [0; MAX_PREFIX_LEN],
        }
    }
}

// ============================================================================
// Node representation
// ============================================================================

/// A tree node: a leaf or one of the four adaptive inner layouts.
///
/// Node4 and Node16 keep `keys` and `children` parallel and sorted by key
/// byte at indices `[0, size)`. Node48 maps a key byte through a 256-entry
/// index holding 1-based slots into its child array (0 means absent);
/// children are packed into the first free slot, so holes can appear after
/// removals. Node256 is directly indexed by key byte.
enum Node<V> {
    Leaf {
        key: Vec<u8>,
        value: V,
    },
    Node4 {
        header: Header,
        keys: [u8; NODE4_MAX],
        children: [Option<Box<Node<V>>>; NODE4_MAX],
    },
    Node16 {
        header: Header,
        keys: [u8; NODE16_MAX],
        children: [Option<Box<Node<V>>>; NODE16_MAX],
    },
    Node48 {
        header: Header,
        index: Box<[u8; 256]>,
        children: Box<[Option<Box<Node<V>>>; NODE48_MAX]>,
    },
    Node256 {
        header: Header,
        children: Box<[Option<Box<Node<V>>>; NODE256_MAX]>,
    },
}

impl<V> Node<V> {
    fn new_leaf(key: &[u8], value: V) -> Self {
        Node::Leaf {
            key: key.to_vec(),
            value,
        }
    }

    fn new_node4() -> Self {
        Node::Node4 {
            header: Header::new(),
            keys: [0; NODE4_MAX],
            children: std::array::from_fn(|_| None),
        }
    }

    fn kind(&self) -> NodeKind {
        match self {
            Node::Leaf { .. } => NodeKind::Leaf,
            Node::Node4 { .. } => NodeKind::Node4,
            Node::Node16 { .. } => NodeKind::Node16,
            Node::Node48 { .. } => NodeKind::Node48,
            Node::Node256 { .. } => NodeKind::Node256,
        }
    }

    fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// Whether this is a leaf storing exactly `key`.
    fn leaf_matches(&self, key: &[u8]) -> bool {
        matches!(self, Node::Leaf { key: stored, .. } if stored.as_slice() == key)
    }

    /// Key of this leaf. Inner nodes never reach this.
    fn leaf_key(&self) -> &[u8] {
        match self {
            Node::Leaf { key, .. } => key,
            _ => panic!("leaf_key on an inner node"),
        }
    }

    fn header(&self) -> &Header {
        match self {
            Node::Node4 { header, .. }
            | Node::Node16 { header, .. }
            | Node::Node48 { header, .. }
            | Node::Node256 { header, .. } => header,
            Node::Leaf { .. } => panic!("header on a leaf node"),
        }
    }

    fn header_mut(&mut self) -> &mut Header {
        match self {
            Node::Node4 { header, .. }
            | Node::Node16 { header, .. }
            | Node::Node48 { header, .. }
            | Node::Node256 { header, .. } => header,
            Node::Leaf { .. } => panic!("header on a leaf node"),
        }
    }

    fn min_size(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Node4 { .. } => NODE4_MIN,
            Node::Node16 { .. } => NODE16_MIN,
            Node::Node48 { .. } => NODE48_MIN,
            Node::Node256 { .. } => NODE256_MIN,
        }
    }

    fn max_size(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Node4 { .. } => NODE4_MAX,
            Node::Node16 { .. } => NODE16_MAX,
            Node::Node48 { .. } => NODE48_MAX,
            Node::Node256 { .. } => NODE256_MAX,
        }
    }

    fn is_full(&self) -> bool {
        self.header().size as usize == self.max_size()
    }

    // ------------------------------------------------------------------------
    // Child lookup
    // ------------------------------------------------------------------------

    /// The child selected by key byte `b`, if present.
    fn find_child(&self, b: u8) -> Option<&Node<V>> {
        match self {
            Node::Leaf { .. } => None,
            Node::Node4 {
                header,
                keys,
                children,
            } => {
                let size = header.size as usize;
                keys[..size]
                    .iter()
                    .position(|&k| k == b)
                    .and_then(|i| children[i].as_deref())
            }
            Node::Node16 {
                header,
                keys,
                children,
            } => {
                let size = header.size as usize;
                keys[..size]
                    .binary_search(&b)
                    .ok()
                    .and_then(|i| children[i].as_deref())
            }
            Node::Node48 {
                index, children, ..
            } => match index[b as usize] {
                0 => None,
                slot => children[slot as usize - 1].as_deref(),
            },
            Node::Node256 { children, .. } => children[b as usize].as_deref(),
        }
    }

    /// Mutable slot of the child selected by key byte `b`, if present.
    fn child_slot_mut(&mut self, b: u8) -> Option<&mut Option<Box<Node<V>>>> {
        match self {
            Node::Leaf { .. } => None,
            Node::Node4 {
                header,
                keys,
                children,
            } => {
                let size = header.size as usize;
                keys[..size]
                    .iter()
                    .position(|&k| k == b)
                    .map(|i| &mut children[i])
            }
            Node::Node16 {
                header,
                keys,
                children,
            } => {
                let size = header.size as usize;
                keys[..size]
                    .binary_search(&b)
                    .ok()
                    .map(|i| &mut children[i])
            }
            Node::Node48 {
                index, children, ..
            } => match index[b as usize] {
                0 => None,
                slot => Some(&mut children[slot as usize - 1]),
            },
            Node::Node256 { children, .. } => {
                if children[b as usize].is_some() {
                    Some(&mut children[b as usize])
                } else {
                    None
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Child insertion and removal
    // ------------------------------------------------------------------------

    /// Inserts `child` under key byte `b`, growing to the next layout first
    /// if this node is full. `b` must not already be present.
    fn add_child(&mut self, b: u8, child: Box<Node<V>>) {
        if self.is_full() {
            self.grow();
        }
        match self {
            Node::Node4 {
                header,
                keys,
                children,
            } => {
                let size = header.size as usize;
                let idx = keys[..size].iter().position(|&k| k >= b).unwrap_or(size);
                for i in (idx..size).rev() {
                    keys[i + 1] = keys[i];
                    children[i + 1] = children[i].take();
                }
                keys[idx] = b;
                children[idx] = Some(child);
                header.size += 1;
            }
            Node::Node16 {
                header,
                keys,
                children,
            } => {
                let size = header.size as usize;
                let idx = keys[..size].partition_point(|&k| k < b);
                for i in (idx..size).rev() {
                    keys[i + 1] = keys[i];
                    children[i + 1] = children[i].take();
                }
                keys[idx] = b;
                children[idx] = Some(child);
                header.size += 1;
            }
            Node::Node48 {
                header,
                index,
                children,
            } => {
                let slot = children
                    .iter()
                    .position(|c| c.is_none())
                    .expect("a non-full Node48 has a free slot");
                children[slot] = Some(child);
                index[b as usize] = slot as u8 + 1;
                header.size += 1;
            }
            Node::Node256 { header, children } => {
                children[b as usize] = Some(child);
                header.size += 1;
            }
            Node::Leaf { .. } => panic!("add_child on a leaf node"),
        }
    }

    /// Removes the child under key byte `b`, shrinking to the next smaller
    /// layout if the child count falls below this layout's band.
    fn remove_child(&mut self, b: u8) {
        match self {
            Node::Node4 {
                header,
                keys,
                children,
            } => {
                let size = header.size as usize;
                if let Some(idx) = keys[..size].iter().position(|&k| k == b) {
                    for i in idx..size - 1 {
                        keys[i] = keys[i + 1];
                        children[i] = children[i + 1].take();
                    }
                    keys[size - 1] = 0;
                    children[size - 1] = None;
                    header.size -= 1;
                }
            }
            Node::Node16 {
                header,
                keys,
                children,
            } => {
                let size = header.size as usize;
                if let Ok(idx) = keys[..size].binary_search(&b) {
                    for i in idx..size - 1 {
                        keys[i] = keys[i + 1];
                        children[i] = children[i + 1].take();
                    }
                    keys[size - 1] = 0;
                    children[size - 1] = None;
                    header.size -= 1;
                }
            }
            Node::Node48 {
                header,
                index,
                children,
            } => {
                let slot = index[b as usize] as usize;
                if slot != 0 {
                    children[slot - 1] = None;
                    index[b as usize] = 0;
                    header.size -= 1;
                }
            }
            Node::Node256 { header, children } => {
                if children[b as usize].take().is_some() {
                    header.size -= 1;
                }
            }
            Node::Leaf { .. } => panic!("remove_child on a leaf node"),
        }
        if (self.header().size as usize) < self.min_size() {
            self.shrink();
        }
    }

    // ------------------------------------------------------------------------
    // Layout transitions
    // ------------------------------------------------------------------------

    /// Replaces this node with the next larger layout, transplanting the
    /// header and all children.
    fn grow(&mut self) {
        match self {
            Node::Node4 {
                header,
                keys,
                children,
            } => {
                let mut new_keys = [0u8; NODE16_MAX];
                new_keys[..NODE4_MAX].copy_from_slice(keys);
                let mut new_children: [Option<Box<Node<V>>>; NODE16_MAX] =
                    std::array::from_fn(|_| None);
                for (dst, src) in new_children.iter_mut().zip(children.iter_mut()) {
                    *dst = src.take();
                }
                *self = Node::Node16 {
                    header: *header,
                    keys: new_keys,
                    children: new_children,
                };
            }
            Node::Node16 {
                header,
                keys,
                children,
            } => {
                let mut index = Box::new([0u8; 256]);
                let mut new_children: Box<[Option<Box<Node<V>>>; NODE48_MAX]> =
                    Box::new(std::array::from_fn(|_| None));
                for i in 0..header.size as usize {
                    index[keys[i] as usize] = i as u8 + 1;
                    new_children[i] = children[i].take();
                }
                *self = Node::Node48 {
                    header: *header,
                    index,
                    children: new_children,
                };
            }
            Node::Node48 {
                header,
                index,
                children,
            } => {
                let mut new_children: Box<[Option<Box<Node<V>>>; NODE256_MAX]> =
                    Box::new(std::array::from_fn(|_| None));
                for b in 0..256 {
                    let slot = index[b] as usize;
                    if slot != 0 {
                        new_children[b] = children[slot - 1].take();
                    }
                }
                *self = Node::Node256 {
                    header: *header,
                    children: new_children,
                };
            }
            // Node256 cannot grow; leaves have no children.
            _ => {}
        }
    }

    /// Replaces this node with the next smaller layout. A Node4 collapses
    /// into its single remaining child, folding its compressed path (and the
    /// child's key byte) into the child.
    fn shrink(&mut self) {
        match self {
            Node::Node4 {
                header,
                keys,
                children,
            } => {
                let mut child = children[0].take().expect("shrinking Node4 has a child");
                if !child.is_leaf() {
                    let mut merged = [0u8; MAX_PREFIX_LEN];
                    let mut merged_len = header.prefix_len.min(MAX_PREFIX_LEN);
                    merged[..merged_len].copy_from_slice(&header.prefix[..merged_len]);
                    if merged_len < MAX_PREFIX_LEN {
                        merged[merged_len] = keys[0];
                        merged_len += 1;
                    }
                    let child_header = child.header_mut();
                    if merged_len < MAX_PREFIX_LEN {
                        let take = child_header.prefix_len.min(MAX_PREFIX_LEN - merged_len);
                        let child_prefix = child_header.prefix;
                        merged[merged_len..merged_len + take]
                            .copy_from_slice(&child_prefix[..take]);
                        merged_len += take;
                    }
                    child_header.prefix[..merged_len].copy_from_slice(&merged[..merged_len]);
                    child_header.prefix_len += header.prefix_len + 1;
                }
                *self = *child;
            }
            Node::Node16 {
                header,
                keys,
                children,
            } => {
                let size = header.size as usize;
                let mut new_keys = [0u8; NODE4_MAX];
                new_keys[..size].copy_from_slice(&keys[..size]);
                let mut new_children: [Option<Box<Node<V>>>; NODE4_MAX] =
                    std::array::from_fn(|_| None);
                for (dst, src) in new_children.iter_mut().zip(children[..size].iter_mut()) {
                    *dst = src.take();
                }
                *self = Node::Node4 {
                    header: *header,
                    keys: new_keys,
                    children: new_children,
                };
            }
            Node::Node48 {
                header,
                index,
                children,
            } => {
                let mut new_keys = [0u8; NODE16_MAX];
                let mut new_children: [Option<Box<Node<V>>>; NODE16_MAX] =
                    std::array::from_fn(|_| None);
                let mut n = 0;
                for b in 0..256 {
                    let slot = index[b] as usize;
                    if slot != 0 {
                        if let Some(child) = children[slot - 1].take() {
                            new_keys[n] = b as u8;
                            new_children[n] = Some(child);
                            n += 1;
                        }
                    }
                }
                let mut new_header = *header;
                new_header.size = n as u16;
                *self = Node::Node16 {
                    header: new_header,
                    keys: new_keys,
                    children: new_children,
                };
            }
            Node::Node256 { header, children } => {
                let mut index = Box::new([0u8; 256]);
                let mut new_children: Box<[Option<Box<Node<V>>>; NODE48_MAX]> =
                    Box::new(std::array::from_fn(|_| None));
                let mut n = 0;
                for b in 0..256 {
                    if let Some(child) = children[b].take() {
                        new_children[n] = Some(child);
                        index[b] = n as u8 + 1;
                        n += 1;
                    }
                }
                let mut new_header = *header;
                new_header.size = n as u16;
                *self = Node::Node48 {
                    header: new_header,
                    index,
                    children: new_children,
                };
            }
            Node::Leaf { .. } => {}
        }
    }

    // ------------------------------------------------------------------------
    // Compressed path comparison
    // ------------------------------------------------------------------------

    /// Index in `[0, prefix_len]` of the first byte where `key` (from
    /// `depth`) departs from this node's compressed path; `prefix_len` on a
    /// full match. Positions past the stored cap are compared against the
    /// minimum leaf below this node. Key exhaustion counts as a mismatch at
    /// that position.
    fn prefix_mismatch(&self, key: &[u8], depth: usize) -> usize {
        let header = self.header();
        let stored = header.prefix_len.min(MAX_PREFIX_LEN);
        let mut i = 0;
        while i < stored {
            match key.get(depth + i) {
                Some(&b) if b == header.prefix[i] => i += 1,
                _ => return i,
            }
        }
        if header.prefix_len > MAX_PREFIX_LEN {
            let min_key = self.minimum_key();
            while i < header.prefix_len {
                match (key.get(depth + i), min_key.get(depth + i)) {
                    (Some(a), Some(b)) if a == b => i += 1,
                    _ => return i,
                }
            }
        }
        i
    }

    // ------------------------------------------------------------------------
    // Minimum and maximum descendants
    // ------------------------------------------------------------------------

    /// The leaf reached by always following the smallest present key byte.
    fn minimum(&self) -> Option<&Node<V>> {
        match self {
            Node::Leaf { .. } => Some(self),
            Node::Node4 { children, .. } => children[0].as_deref()?.minimum(),
            Node::Node16 { children, .. } => children[0].as_deref()?.minimum(),
            Node::Node48 {
                index, children, ..
            } => index
                .iter()
                .find(|&&slot| slot != 0)
                .and_then(|&slot| children[slot as usize - 1].as_deref())?
                .minimum(),
            Node::Node256 { children, .. } => {
                children.iter().find_map(|c| c.as_deref())?.minimum()
            }
        }
    }

    /// The leaf reached by always following the largest present key byte.
    fn maximum(&self) -> Option<&Node<V>> {
        match self {
            Node::Leaf { .. } => Some(self),
            Node::Node4 {
                header, children, ..
            } => {
                let size = header.size as usize;
                children[..size].last()?.as_deref()?.maximum()
            }
            Node::Node16 {
                header, children, ..
            } => {
                let size = header.size as usize;
                children[..size].last()?.as_deref()?.maximum()
            }
            Node::Node48 {
                index, children, ..
            } => index
                .iter()
                .rfind(|&&slot| slot != 0)
                .and_then(|&slot| children[slot as usize - 1].as_deref())?
                .maximum(),
            Node::Node256 { children, .. } => {
                children.iter().rev().find_map(|c| c.as_deref())?.maximum()
            }
        }
    }

    /// Key of the smallest leaf below this node. Empty only if the node has
    /// no children, which live trees never exhibit.
    fn minimum_key(&self) -> &[u8] {
        match self.minimum() {
            Some(Node::Leaf { key, .. }) => key,
            _ => &[],
        }
    }
}

// ============================================================================
// Tree
// ============================================================================

/// An ordered map from byte-string keys to values of type `V`.
///
/// All operations take O(key length) time, independent of the number of
/// stored entries. The structure is single-threaded: callers serialize
/// mutation through `&mut self` and there is no internal synchronization.
///
/// Duplicate policy: inserting a key that is already present leaves the
/// tree unchanged and drops the incoming value (see [`ArtTree::insert`]).
pub struct ArtTree<V> {
    root: Option<Box<Node<V>>>,
    size: usize,
}

impl<V> ArtTree<V> {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self {
            root: None,
            size: 0,
        }
    }

    /// Number of stored key/value pairs.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Inserts `value` under `key`.
    ///
    /// If `key` is already present the tree is left unchanged and `value`
    /// is dropped; the stored value is not overwritten.
    pub fn insert(&mut self, key: &[u8], value: V) {
        let normalized = ensure_null_terminated(key);
        if Self::insert_rec(&mut self.root, &normalized, value, 0) {
            self.size += 1;
        }
    }

    /// Returns the value stored under `key`, or `None` if absent.
    pub fn search(&self, key: &[u8]) -> Option<&V> {
        let normalized = ensure_null_terminated(key);
        let key = normalized.as_ref();
        let mut current = self.root.as_deref();
        let mut depth = 0;
        while let Some(node) = current {
            if let Node::Leaf {
                key: stored, value, ..
            } = node
            {
                return if stored.as_slice() == key {
                    Some(value)
                } else {
                    None
                };
            }
            let prefix_len = node.header().prefix_len;
            if node.prefix_mismatch(key, depth) != prefix_len {
                return None;
            }
            depth += prefix_len;
            let b = key.get(depth).copied().unwrap_or(0);
            current = node.find_child(b);
            depth += 1;
        }
        None
    }

    /// Removes the entry stored under `key`. Returns true iff one existed.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        let normalized = ensure_null_terminated(key);
        let removed = Self::remove_rec(&mut self.root, &normalized, 0);
        if removed {
            self.size -= 1;
        }
        removed
    }

    /// The lexicographically smallest entry, as (stored key, value).
    pub fn minimum(&self) -> Option<(&[u8], &V)> {
        match self.root.as_deref()?.minimum()? {
            Node::Leaf { key, value } => Some((key.as_slice(), value)),
            _ => None,
        }
    }

    /// The lexicographically largest entry, as (stored key, value).
    pub fn maximum(&self) -> Option<(&[u8], &V)> {
        match self.root.as_deref()?.maximum()? {
            Node::Leaf { key, value } => Some((key.as_slice(), value)),
            _ => None,
        }
    }

    /// Preorder traversal: visits every node once, each node before its
    /// children and children in ascending key-byte order. Leaves are
    /// therefore visited in ascending stored-key order.
    pub fn each<F>(&self, mut visit: F)
    where
        F: FnMut(NodeRef<'_, V>),
    {
        if let Some(root) = self.root.as_deref() {
            Self::each_rec(root, &mut visit);
        }
    }

    /// Counts nodes per layout by walking the tree.
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        self.each(|node| match node.kind() {
            NodeKind::Leaf => stats.leaf_count += 1,
            NodeKind::Node4 => stats.node4_count += 1,
            NodeKind::Node16 => stats.node16_count += 1,
            NodeKind::Node48 => stats.node48_count += 1,
            NodeKind::Node256 => stats.node256_count += 1,
        });
        stats
    }

    // ------------------------------------------------------------------------
    // Recursive helpers
    // ------------------------------------------------------------------------

    /// Inserts into the subtree rooted at `slot`. Returns true iff a new
    /// leaf was linked (false on a duplicate key).
    fn insert_rec(slot: &mut Option<Box<Node<V>>>, key: &[u8], value: V, depth: usize) -> bool {
        // An empty slot takes the new leaf directly (lazy expansion).
        if slot.is_none() {
            *slot = Some(Box::new(Node::new_leaf(key, value)));
            return true;
        }

        // A leaf in the way is replaced by a Node4 branching where the two
        // keys first differ, holding the old leaf and the new one.
        if matches!(slot.as_deref(), Some(Node::Leaf { .. })) {
            if slot.as_deref().map_or(false, |n| n.leaf_matches(key)) {
                return false;
            }
            let existing = slot.take().expect("occupied slot");
            let lcp = longest_common_prefix(existing.leaf_key(), key, depth);
            let mut branch = Node::new_node4();
            {
                let header = branch.header_mut();
                header.prefix_len = lcp;
                let stored = lcp.min(MAX_PREFIX_LEN);
                header.prefix[..stored].copy_from_slice(&key[depth..depth + stored]);
            }
            let existing_byte = existing.leaf_key()[depth + lcp];
            branch.add_child(existing_byte, existing);
            branch.add_child(key[depth + lcp], Box::new(Node::new_leaf(key, value)));
            *slot = Some(Box::new(branch));
            return true;
        }

        let prefix_len = slot.as_deref().expect("occupied slot").header().prefix_len;
        if prefix_len != 0 {
            let mismatch = slot
                .as_deref()
                .expect("occupied slot")
                .prefix_mismatch(key, depth);

            // The key departs inside the compressed path: a new Node4 takes
            // over the matching head of the path, with the current node
            // (path shortened past the split byte) and the new leaf below.
            if mismatch != prefix_len {
                let mut existing = slot.take().expect("occupied slot");
                let mut branch = Node::new_node4();
                {
                    let stored = mismatch.min(MAX_PREFIX_LEN);
                    let old_prefix = existing.header().prefix;
                    let header = branch.header_mut();
                    header.prefix_len = mismatch;
                    header.prefix[..stored].copy_from_slice(&old_prefix[..stored]);
                }
                if prefix_len <= MAX_PREFIX_LEN {
                    let header = existing.header_mut();
                    let split_byte = header.prefix[mismatch];
                    header.prefix_len = prefix_len - (mismatch + 1);
                    header.prefix.copy_within(mismatch + 1.., 0);
                    branch.add_child(split_byte, existing);
                } else {
                    // The split byte and the refill bytes sit past the
                    // stored cap; recover them from the minimum leaf before
                    // rewriting the header.
                    let new_len = prefix_len - (mismatch + 1);
                    let stored = new_len.min(MAX_PREFIX_LEN);
                    let mut refill = [0u8; MAX_PREFIX_LEN];
                    let split_byte;
                    {
                        let min_key = existing.minimum_key();
                        split_byte = min_key[depth + mismatch];
                        refill[..stored].copy_from_slice(
                            &min_key[depth + mismatch + 1..depth + mismatch + 1 + stored],
                        );
                    }
                    let header = existing.header_mut();
                    header.prefix_len = new_len;
                    header.prefix[..stored].copy_from_slice(&refill[..stored]);
                    branch.add_child(split_byte, existing);
                }
                branch.add_child(key[depth + mismatch], Box::new(Node::new_leaf(key, value)));
                *slot = Some(Box::new(branch));
                return true;
            }
        }
        let depth = depth + prefix_len;

        // Descend into the child for the next key byte, or attach the new
        // leaf here (growing the node if its layout is full).
        let node = slot.as_deref_mut().expect("occupied slot");
        let b = key[depth];
        if node.find_child(b).is_some() {
            let child_slot = node.child_slot_mut(b).expect("present child");
            Self::insert_rec(child_slot, key, value, depth + 1)
        } else {
            node.add_child(b, Box::new(Node::new_leaf(key, value)));
            true
        }
    }

    /// Removes `key` from the subtree rooted at `slot`. Returns true iff a
    /// leaf was unlinked.
    fn remove_rec(slot: &mut Option<Box<Node<V>>>, key: &[u8], depth: usize) -> bool {
        match slot.as_deref() {
            None => return false,
            Some(node) if node.is_leaf() => {
                if node.leaf_matches(key) {
                    *slot = None;
                    return true;
                }
                return false;
            }
            Some(_) => {}
        }

        let node = slot.as_deref_mut().expect("occupied slot");
        let prefix_len = node.header().prefix_len;
        let mut depth = depth;
        if prefix_len != 0 {
            if node.prefix_mismatch(key, depth) != prefix_len {
                return false;
            }
            depth += prefix_len;
        }

        let b = key.get(depth).copied().unwrap_or(0);
        let child_is_match = matches!(node.find_child(b), Some(child) if child.leaf_matches(key));
        if child_is_match {
            // Removal may shrink this node, collapsing a Node4 into its
            // last child with the compressed paths folded together.
            node.remove_child(b);
            return true;
        }
        match node.child_slot_mut(b) {
            Some(child_slot) => Self::remove_rec(child_slot, key, depth + 1),
            None => false,
        }
    }

    fn each_rec<F>(node: &Node<V>, visit: &mut F)
    where
        F: FnMut(NodeRef<'_, V>),
    {
        visit(NodeRef { node });
        match node {
            Node::Leaf { .. } => {}
            Node::Node4 {
                header, children, ..
            } => {
                let size = header.size as usize;
                for child in children[..size].iter().flatten() {
                    Self::each_rec(child, visit);
                }
            }
            Node::Node16 {
                header, children, ..
            } => {
                let size = header.size as usize;
                for child in children[..size].iter().flatten() {
                    Self::each_rec(child, visit);
                }
            }
            Node::Node48 {
                index, children, ..
            } => {
                for slot in index.iter() {
                    if *slot != 0 {
                        if let Some(child) = children[*slot as usize - 1].as_deref() {
                            Self::each_rec(child, visit);
                        }
                    }
                }
            }
            Node::Node256 { children, .. } => {
                for child in children.iter().flatten() {
                    Self::each_rec(child, visit);
                }
            }
        }
    }
}

impl<V> Default for ArtTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Test support
// ============================================================================

#[cfg(test)]
impl<V> ArtTree<V> {
    /// Walks the whole tree asserting its structural invariants: fan-out
    /// bands, sorted Node4/Node16 keys, Node48 index/packing agreement,
    /// stored-prefix agreement with the minimum leaf, and that every leaf
    /// key extends the byte path leading to it (lazy expansion leaves the
    /// unnavigated tail, at least the sentinel, only in the leaf).
    pub(crate) fn check_invariants(&self) {
        let mut leaves = 0;
        if let Some(root) = self.root.as_deref() {
            let mut path = Vec::new();
            Self::check_node(root, &mut path, &mut leaves);
        }
        assert_eq!(leaves, self.size, "leaf count must match tree size");
    }

    fn check_node(node: &Node<V>, path: &mut Vec<u8>, leaves: &mut usize) {
        if let Node::Leaf { key, .. } = node {
            *leaves += 1;
            assert!(
                key.starts_with(path),
                "leaf key {:?} must extend its byte path {:?}",
                key,
                path
            );
            return;
        }

        let header = node.header();
        let size = header.size as usize;
        assert!(size >= node.min_size(), "inner node below its fan-out band");
        assert!(size <= node.max_size(), "inner node above its fan-out band");
        assert!(size >= 2, "inner nodes hold at least two children");

        // The compressed path must agree with the minimum leaf, including
        // the stored bytes when the path exceeds the cap.
        let min_key = node.minimum_key().to_vec();
        let stored = header.prefix_len.min(MAX_PREFIX_LEN);
        assert_eq!(
            &header.prefix[..stored],
            &min_key[path.len()..path.len() + stored],
            "stored prefix must match the minimum leaf"
        );
        let depth = path.len();
        path.extend_from_slice(&min_key[depth..depth + header.prefix_len]);

        match node {
            Node::Node4 { keys, children, .. } => {
                assert!(
                    keys[..size].windows(2).all(|w| w[0] < w[1]),
                    "Node4 keys must be strictly ascending"
                );
                assert!(children[..size].iter().all(|c| c.is_some()));
                assert!(children[size..].iter().all(|c| c.is_none()));
                for (i, child) in children[..size].iter().flatten().enumerate() {
                    path.push(keys[i]);
                    Self::check_node(child, path, leaves);
                    path.pop();
                }
            }
            Node::Node16 { keys, children, .. } => {
                assert!(
                    keys[..size].windows(2).all(|w| w[0] < w[1]),
                    "Node16 keys must be strictly ascending"
                );
                assert!(children[..size].iter().all(|c| c.is_some()));
                assert!(children[size..].iter().all(|c| c.is_none()));
                for (i, child) in children[..size].iter().flatten().enumerate() {
                    path.push(keys[i]);
                    Self::check_node(child, path, leaves);
                    path.pop();
                }
            }
            Node::Node48 {
                index, children, ..
            } => {
                let mut seen = [false; NODE48_MAX];
                let mut occupied = 0;
                for b in 0..256 {
                    let slot = index[b] as usize;
                    if slot != 0 {
                        assert!(!seen[slot - 1], "Node48 slots must not alias");
                        seen[slot - 1] = true;
                        occupied += 1;
                        let child = children[slot - 1]
                            .as_deref()
                            .expect("Node48 index points at an occupied slot");
                        path.push(b as u8);
                        Self::check_node(child, path, leaves);
                        path.pop();
                    }
                }
                assert_eq!(occupied, size, "Node48 index entries must match size");
                assert_eq!(
                    children.iter().filter(|c| c.is_some()).count(),
                    size,
                    "Node48 packing must match size"
                );
            }
            Node::Node256 { children, .. } => {
                assert_eq!(children.iter().filter(|c| c.is_some()).count(), size);
                for (b, child) in children.iter().enumerate() {
                    if let Some(child) = child.as_deref() {
                        path.push(b as u8);
                        Self::check_node(child, path, leaves);
                        path.pop();
                    }
                }
            }
            Node::Leaf { .. } => unreachable!(),
        }

        path.truncate(depth);
    }
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod proptests;
