//! Hash-array-mapped trie with copy-on-write path copying.
//!
//! Invariants:
//! - A mutating operation allocates only the nodes on the path from the root
//!   to the changed leaf; every sibling subtree is shared via `Rc`.
//! - Leaf entries keep the original key so equal hashes of distinct keys are
//!   resolved exactly; full-hash collisions live in a dedicated collision
//!   node holding a linear entry list.
//! - An index node promotes to a dense array node once more than half of its
//!   32 slots are occupied; an array node demotes back once its live-child
//!   count drops to a quarter.

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::rc::Rc;

const BITS: u32 = 5;
const BRANCH: usize = 1 << BITS;
const MASK: u32 = (BRANCH as u32) - 1;
const PROMOTE_AT: usize = BRANCH / 2;
const DEMOTE_AT: usize = BRANCH / 4;

fn hash_of<K: Hash>(key: &K) -> u32 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    let wide = hasher.finish();
    (wide ^ (wide >> 32)) as u32
}

fn frag(hash: u32, shift: u32) -> usize {
    ((hash >> shift) & MASK) as usize
}

fn bitpos(hash: u32, shift: u32) -> u32 {
    1 << frag(hash, shift)
}

/// Position of `bit` within the compacted child list of an index node.
fn compact_index(bitmap: u32, bit: u32) -> usize {
    (bitmap & (bit - 1)).count_ones() as usize
}

#[derive(Clone)]
enum Entry<K, V> {
    Leaf { hash: u32, key: K, value: V },
    Node(Rc<Node<K, V>>),
}

#[derive(Clone)]
enum Node<K, V> {
    /// Bitmap plus compacted list of present children.
    Index {
        bitmap: u32,
        children: Vec<Entry<K, V>>,
    },
    /// Dense 32-slot node; pays off once an index node is mostly full.
    Array {
        len: usize,
        children: Box<[Option<Entry<K, V>>; BRANCH]>,
    },
    /// Linear list of entries whose keys share one full 32-bit hash.
    Collision { hash: u32, entries: Vec<(K, V)> },
}

/// Immutable hash map. See the crate docs for the sharing contract.
pub struct Map<K, V> {
    root: Option<Entry<K, V>>,
    len: usize,
}

impl<K, V> Map<K, V> {
    pub fn new() -> Self {
        Self { root: None, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut stack = Vec::new();
        if let Some(root) = &self.root {
            stack.push(Cursor::Entry(root));
        }
        Iter { stack }
    }
}

impl<K, V> Map<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn get(&self, key: &K) -> Option<&V> {
        let hash = hash_of(key);
        let mut entry = self.root.as_ref()?;
        let mut shift = 0;
        loop {
            match entry {
                Entry::Leaf {
                    hash: leaf_hash,
                    key: leaf_key,
                    value,
                } => {
                    return (*leaf_hash == hash && leaf_key == key).then_some(value);
                }
                Entry::Node(node) => match node.as_ref() {
                    Node::Index { bitmap, children } => {
                        let bit = bitpos(hash, shift);
                        if bitmap & bit == 0 {
                            return None;
                        }
                        entry = &children[compact_index(*bitmap, bit)];
                        shift += BITS;
                    }
                    Node::Array { children, .. } => match &children[frag(hash, shift)] {
                        Some(child) => {
                            entry = child;
                            shift += BITS;
                        }
                        None => return None,
                    },
                    Node::Collision {
                        hash: node_hash,
                        entries,
                    } => {
                        if *node_hash != hash {
                            return None;
                        }
                        return entries.iter().find(|(k, _)| k == key).map(|(_, v)| v);
                    }
                },
            }
        }
    }

    pub fn has(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Returns a new map with `key` bound to `value`. The receiver is untouched.
    pub fn set(&self, key: K, value: V) -> Self {
        let hash = hash_of(&key);
        match &self.root {
            None => Self {
                root: Some(Entry::Leaf { hash, key, value }),
                len: 1,
            },
            Some(root) => {
                let (root, added) = set_entry(root, 0, hash, key, value);
                Self {
                    root: Some(root),
                    len: self.len + usize::from(added),
                }
            }
        }
    }

    /// Returns a new map without `key`. Absent keys return an unchanged copy.
    pub fn delete(&self, key: &K) -> Self {
        let hash = hash_of(key);
        let Some(root) = &self.root else {
            return self.clone();
        };
        match delete_entry(root, 0, hash, key) {
            Removal::NotFound => self.clone(),
            Removal::Gone => Self { root: None, len: self.len - 1 },
            Removal::Replaced(root) => Self {
                root: Some(root),
                len: self.len - 1,
            },
        }
    }

    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        for (key, value) in self.iter() {
            f(key, value);
        }
    }
}

fn set_entry<K, V>(entry: &Entry<K, V>, shift: u32, hash: u32, key: K, value: V) -> (Entry<K, V>, bool)
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    match entry {
        Entry::Leaf {
            hash: leaf_hash,
            key: leaf_key,
            value: leaf_value,
        } => {
            if *leaf_hash == hash && *leaf_key == key {
                (Entry::Leaf { hash, key, value }, false)
            } else if *leaf_hash == hash {
                let entries = vec![(leaf_key.clone(), leaf_value.clone()), (key, value)];
                (Entry::Node(Rc::new(Node::Collision { hash, entries })), true)
            } else {
                let node = merge_leaves(
                    shift,
                    *leaf_hash,
                    leaf_key.clone(),
                    leaf_value.clone(),
                    hash,
                    key,
                    value,
                );
                (Entry::Node(Rc::new(node)), true)
            }
        }
        Entry::Node(node) => {
            let (node, added) = set_node(node, shift, hash, key, value);
            (Entry::Node(Rc::new(node)), added)
        }
    }
}

fn set_node<K, V>(node: &Node<K, V>, shift: u32, hash: u32, key: K, value: V) -> (Node<K, V>, bool)
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    match node {
        Node::Index { bitmap, children } => {
            let bit = bitpos(hash, shift);
            let idx = compact_index(*bitmap, bit);
            if bitmap & bit != 0 {
                let (child, added) = set_entry(&children[idx], shift + BITS, hash, key, value);
                let mut children = children.clone();
                children[idx] = child;
                (
                    Node::Index {
                        bitmap: *bitmap,
                        children,
                    },
                    added,
                )
            } else {
                let mut children = children.clone();
                children.insert(idx, Entry::Leaf { hash, key, value });
                let bitmap = bitmap | bit;
                if children.len() > PROMOTE_AT {
                    (promote(bitmap, children), true)
                } else {
                    (Node::Index { bitmap, children }, true)
                }
            }
        }
        Node::Array { len, children } => {
            let slot = frag(hash, shift);
            match &children[slot] {
                None => {
                    let mut children = children.clone();
                    children[slot] = Some(Entry::Leaf { hash, key, value });
                    (
                        Node::Array {
                            len: len + 1,
                            children,
                        },
                        true,
                    )
                }
                Some(child) => {
                    let (child, added) = set_entry(child, shift + BITS, hash, key, value);
                    let mut children = children.clone();
                    children[slot] = Some(child);
                    (
                        Node::Array {
                            len: *len,
                            children,
                        },
                        added,
                    )
                }
            }
        }
        Node::Collision {
            hash: node_hash,
            entries,
        } => {
            if hash == *node_hash {
                let mut entries = entries.clone();
                match entries.iter_mut().find(|(k, _)| *k == key) {
                    Some(pair) => {
                        pair.1 = value;
                        (Node::Collision { hash, entries }, false)
                    }
                    None => {
                        entries.push((key, value));
                        (Node::Collision { hash, entries }, true)
                    }
                }
            } else {
                // The new key branches off at this level: wrap the collision
                // node in an index node and insert into that.
                let wrapped = Node::Index {
                    bitmap: bitpos(*node_hash, shift),
                    children: vec![Entry::Node(Rc::new(node.clone()))],
                };
                set_node(&wrapped, shift, hash, key, value)
            }
        }
    }
}

/// Builds the smallest subtree separating two leaves with distinct hashes.
fn merge_leaves<K, V>(
    shift: u32,
    first_hash: u32,
    first_key: K,
    first_value: V,
    second_hash: u32,
    second_key: K,
    second_value: V,
) -> Node<K, V> {
    let first_frag = frag(first_hash, shift);
    let second_frag = frag(second_hash, shift);
    if first_frag == second_frag {
        let inner = merge_leaves(
            shift + BITS,
            first_hash,
            first_key,
            first_value,
            second_hash,
            second_key,
            second_value,
        );
        Node::Index {
            bitmap: 1 << first_frag,
            children: vec![Entry::Node(Rc::new(inner))],
        }
    } else {
        let first = Entry::Leaf {
            hash: first_hash,
            key: first_key,
            value: first_value,
        };
        let second = Entry::Leaf {
            hash: second_hash,
            key: second_key,
            value: second_value,
        };
        let bitmap = (1 << first_frag) | (1 << second_frag);
        let children = if first_frag < second_frag {
            vec![first, second]
        } else {
            vec![second, first]
        };
        Node::Index { bitmap, children }
    }
}

fn promote<K, V>(bitmap: u32, children: Vec<Entry<K, V>>) -> Node<K, V> {
    let mut slots: [Option<Entry<K, V>>; BRANCH] = std::array::from_fn(|_| None);
    let len = children.len();
    let mut compact = children.into_iter();
    for (slot, out) in slots.iter_mut().enumerate() {
        if bitmap & (1 << slot) != 0 {
            *out = compact.next();
        }
    }
    Node::Array {
        len,
        children: Box::new(slots),
    }
}

fn demote<K, V>(children: &[Option<Entry<K, V>>; BRANCH], removed_slot: usize) -> Node<K, V>
where
    K: Clone,
    V: Clone,
{
    let mut bitmap = 0u32;
    let mut compact = Vec::new();
    for (slot, child) in children.iter().enumerate() {
        if slot == removed_slot {
            continue;
        }
        if let Some(child) = child {
            bitmap |= 1 << slot;
            compact.push(child.clone());
        }
    }
    Node::Index {
        bitmap,
        children: compact,
    }
}

enum Removal<K, V> {
    NotFound,
    Gone,
    Replaced(Entry<K, V>),
}

fn delete_entry<K, V>(entry: &Entry<K, V>, shift: u32, hash: u32, key: &K) -> Removal<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    match entry {
        Entry::Leaf {
            hash: leaf_hash,
            key: leaf_key,
            ..
        } => {
            if *leaf_hash == hash && leaf_key == key {
                Removal::Gone
            } else {
                Removal::NotFound
            }
        }
        Entry::Node(node) => delete_node(node, shift, hash, key),
    }
}

fn delete_node<K, V>(node: &Node<K, V>, shift: u32, hash: u32, key: &K) -> Removal<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    match node {
        Node::Index { bitmap, children } => {
            let bit = bitpos(hash, shift);
            if bitmap & bit == 0 {
                return Removal::NotFound;
            }
            let idx = compact_index(*bitmap, bit);
            match delete_entry(&children[idx], shift + BITS, hash, key) {
                Removal::NotFound => Removal::NotFound,
                Removal::Gone => {
                    if children.len() == 1 {
                        return Removal::Gone;
                    }
                    let mut children = children.clone();
                    children.remove(idx);
                    collapse_index(bitmap & !bit, children)
                }
                Removal::Replaced(child) => {
                    let mut children = children.clone();
                    children[idx] = child;
                    collapse_index(*bitmap, children)
                }
            }
        }
        Node::Array { len, children } => {
            let slot = frag(hash, shift);
            let Some(child) = &children[slot] else {
                return Removal::NotFound;
            };
            match delete_entry(child, shift + BITS, hash, key) {
                Removal::NotFound => Removal::NotFound,
                Removal::Gone => {
                    let remaining = len - 1;
                    if remaining <= DEMOTE_AT {
                        Removal::Replaced(Entry::Node(Rc::new(demote(children, slot))))
                    } else {
                        let mut children = children.clone();
                        children[slot] = None;
                        Removal::Replaced(Entry::Node(Rc::new(Node::Array {
                            len: remaining,
                            children,
                        })))
                    }
                }
                Removal::Replaced(child) => {
                    let mut children = children.clone();
                    children[slot] = Some(child);
                    Removal::Replaced(Entry::Node(Rc::new(Node::Array {
                        len: *len,
                        children,
                    })))
                }
            }
        }
        Node::Collision {
            hash: node_hash,
            entries,
        } => {
            if hash != *node_hash {
                return Removal::NotFound;
            }
            let Some(pos) = entries.iter().position(|(k, _)| k == key) else {
                return Removal::NotFound;
            };
            if entries.len() == 2 {
                let (key, value) = entries[1 - pos].clone();
                Removal::Replaced(Entry::Leaf { hash, key, value })
            } else {
                let mut entries = entries.clone();
                entries.remove(pos);
                Removal::Replaced(Entry::Node(Rc::new(Node::Collision { hash, entries })))
            }
        }
    }
}

/// A lone leaf needs no index node above it; lift it one level up.
fn collapse_index<K, V>(bitmap: u32, mut children: Vec<Entry<K, V>>) -> Removal<K, V> {
    if children.len() == 1 && matches!(children.first(), Some(Entry::Leaf { .. })) {
        if let Some(leaf) = children.pop() {
            return Removal::Replaced(leaf);
        }
    }
    Removal::Replaced(Entry::Node(Rc::new(Node::Index { bitmap, children })))
}

impl<K: Clone, V: Clone> Clone for Map<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            len: self.len,
        }
    }
}

impl<K, V> Default for Map<K, V> {
    fn default() -> Self {
        Self { root: None, len: 0 }
    }
}

impl<K, V> PartialEq for Map<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + PartialEq,
{
    /// Content equality: same entries, regardless of internal node shape or
    /// insertion history.
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V> Eq for Map<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + Eq,
{
}

impl<K, V> fmt::Debug for Map<K, V>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Map<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |map, (key, value)| map.set(key, value))
    }
}

enum Cursor<'a, K, V> {
    Entry(&'a Entry<K, V>),
    Pairs(std::slice::Iter<'a, (K, V)>),
}

/// Depth-first entry iterator driven by an explicit stack. Enumeration order
/// follows trie layout, not insertion order.
pub struct Iter<'a, K, V> {
    stack: Vec<Cursor<'a, K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stack.pop()? {
                Cursor::Entry(Entry::Leaf { key, value, .. }) => return Some((key, value)),
                Cursor::Entry(Entry::Node(node)) => match node.as_ref() {
                    Node::Index { children, .. } => {
                        self.stack.extend(children.iter().map(Cursor::Entry));
                    }
                    Node::Array { children, .. } => {
                        self.stack
                            .extend(children.iter().flatten().map(Cursor::Entry));
                    }
                    Node::Collision { entries, .. } => {
                        self.stack.push(Cursor::Pairs(entries.iter()));
                    }
                },
                Cursor::Pairs(mut pairs) => {
                    if let Some((key, value)) = pairs.next() {
                        self.stack.push(Cursor::Pairs(pairs));
                        return Some((key, value));
                    }
                }
            }
        }
    }
}

impl<'a, K, V> IntoIterator for &'a Map<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
