//! Patch protocol: the edit tree produced by diffing two snapshots.
//!
//! A patch mirrors only the regions of the tree that changed.
//!
//! Invariants:
//! - Leaf changes are applied in list order; `removed` trailing children are
//!   trimmed after the changes; nested child patches are resolved against the
//!   child list only after both.
//! - Child-list indices (`Change::Remove`, `Replace`, `Insert`,
//!   `Move::before`, `Patch::index`) are expressed in the evolving live-list
//!   coordinates of that application order, so appliers need no extra offset
//!   bookkeeping.
//! - A patch stream is self-contained for one `old -> new` transition.
//! - `Move` never recreates a node: the applier relocates the existing child
//!   (and, for a fragment, its live descendants), preserving listeners and
//!   timers.

use crate::attribute::Attribute;
use crate::node::Node;

/// Edits for one node, plus nested patches for its children.
#[derive(Clone, Debug)]
pub struct Patch<Msg> {
    /// Position of the target node within its parent's child list.
    pub index: usize,
    /// Trailing children to delete after `changes` are applied.
    pub removed: usize,
    pub changes: Vec<Change<Msg>>,
    pub children: Vec<Patch<Msg>>,
}

/// One leaf edit against a live node.
#[derive(Clone, Debug)]
pub enum Change<Msg> {
    /// Swap the payload of a text node in place.
    ReplaceText { content: String },
    /// Swap the verbatim markup payload of a raw node in place.
    ReplaceInnerHtml { markup: String },
    /// Apply attribute/property additions and removals to the target node.
    Update {
        added: Vec<Attribute<Msg>>,
        removed: Vec<Attribute<Msg>>,
    },
    /// Relocate the existing keyed child to sit before `before`.
    Move { key: String, before: usize },
    /// Detach the child at `index` and its subtree.
    Remove { index: usize },
    /// Replace the child at `index` with a freshly materialized node.
    Replace { index: usize, node: Node<Msg> },
    /// Materialize `nodes` as a batch before the child at `before`.
    Insert { nodes: Vec<Node<Msg>>, before: usize },
}

impl<Msg> Patch<Msg> {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            removed: 0,
            changes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// True when applying this patch would do nothing.
    pub fn is_empty(&self) -> bool {
        self.removed == 0 && self.changes.is_empty() && self.children.is_empty()
    }

    pub(crate) fn push_change(&mut self, change: Change<Msg>) {
        self.changes.push(change);
    }

    pub(crate) fn push_child(&mut self, child: Patch<Msg>) {
        self.children.push(child);
    }
}
