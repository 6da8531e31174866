//! Keyed tree diffing.
//!
//! Contract:
//! - `diff(old, new, events)` returns the patch transforming a live rendering
//!   of `old` into one of `new`, plus the updated event registry.
//! - Diffing a tree against itself yields an empty patch.
//! - Sibling lists are compared in a single forward pass with no
//!   backtracking; keyed nodes move, everything else matches positionally.
//! - Malformed input never fails: the worst case is an over-produced
//!   `Replace`, which is always correctness-preserving.
//!
//! Indices in emitted changes are in evolving live-list coordinates (see
//! `patch.rs`), so at every step the current old head sits exactly at the
//! running node index once prior changes are applied.
//!
//! Handler bookkeeping: releases are issued against the paths nodes were
//! registered under in the old tree, registrations against their new-tree
//! paths. The two only differ for keyless nodes whose sibling index shifted.

use crate::attribute::Attribute;
use crate::events::Events;
use crate::node::{keyed_index, Mapper, Node};
use crate::patch::{Change, Patch};
use crate::path::Path;
use log::trace;
use pmap::Map;
use std::collections::HashSet;

/// Result of one diff cycle.
#[derive(Clone, Debug)]
pub struct Diff<Msg> {
    pub patch: Patch<Msg>,
    pub events: Events<Msg>,
}

/// Tags whose `value`/`checked`/`selected` must be forced back through the
/// host whenever the element has previously dispatched an event.
fn is_controllable(namespace: &str, tag: &str) -> bool {
    namespace.is_empty() && matches!(tag, "input" | "select" | "textarea")
}

pub fn diff<Msg: Clone + 'static>(
    old: &Node<Msg>,
    new: &Node<Msg>,
    events: &Events<Msg>,
) -> Diff<Msg> {
    let mut events = events.tick();
    let mut patch = Patch::new(0);
    let root = Path::root();
    let old_list = std::slice::from_ref(old);
    let new_list = std::slice::from_ref(new);
    let old_keyed = keyed_index(old_list);
    let new_keyed = keyed_index(new_list);
    diff_siblings(
        &mut events,
        &mut patch,
        &root,
        &root,
        &Mapper::Identity,
        old_list,
        &old_keyed,
        new_list,
        &new_keyed,
    );
    Diff { patch, events }
}

/// Forward cursor over the old sibling list. A node matched by key out of
/// order is pushed back to be reconsidered against the new head.
struct OldCursor<'a, Msg> {
    items: &'a [Node<Msg>],
    pos: usize,
    pending: Option<&'a Node<Msg>>,
}

impl<'a, Msg> OldCursor<'a, Msg> {
    fn peek(&self) -> Option<&'a Node<Msg>> {
        self.pending.or_else(|| self.items.get(self.pos))
    }

    /// Index the current head occupied in the original old list. Only
    /// meaningful for positional (keyless) heads, which never come from
    /// `pending`.
    fn old_index(&self) -> usize {
        self.pos
    }

    fn advance(&mut self) {
        if self.pending.take().is_none() {
            self.pos += 1;
        }
    }

    fn reconsider(&mut self, node: &'a Node<Msg>) {
        self.pending = Some(node);
    }
}

#[allow(clippy::too_many_arguments)]
fn diff_siblings<Msg: Clone + 'static>(
    events: &mut Events<Msg>,
    patch: &mut Patch<Msg>,
    old_path: &Path,
    new_path: &Path,
    mapper: &Mapper<Msg>,
    old_list: &[Node<Msg>],
    old_keyed: &Map<String, usize>,
    new_list: &[Node<Msg>],
    new_keyed: &Map<String, usize>,
) {
    let mut old = OldCursor {
        items: old_list,
        pos: 0,
        pending: None,
    };
    let mut moved: HashSet<&str> = HashSet::new();
    let mut new_pos = 0usize;
    let mut node_index = 0usize;

    loop {
        match (old.peek(), new_list.get(new_pos)) {
            (None, None) => break,

            // New list exhausted: everything left in old is a trailing
            // removal, except nodes already moved into the prefix.
            (Some(prev), None) => {
                let key = prev.key();
                if key.is_empty() || !moved.contains(key) {
                    patch.removed += 1;
                    let prev_path = old_path.add(old.old_index(), key);
                    *events = events.release_subtree(&prev_path, prev);
                }
                old.advance();
            }

            // Old list exhausted: insert the rest of new as one batch.
            (None, Some(_)) => {
                let nodes: Vec<Node<Msg>> = new_list[new_pos..].to_vec();
                for (offset, node) in nodes.iter().enumerate() {
                    let child_path = new_path.add(node_index + offset, node.key());
                    *events = events.register_subtree(mapper, &child_path, node);
                }
                trace!("diff: insert batch of {} before {}", nodes.len(), node_index);
                patch.push_change(Change::Insert {
                    nodes,
                    before: node_index,
                });
                break;
            }

            (Some(prev), Some(next)) => {
                if prev.key() == next.key() {
                    let prev_path = old_path.add(old.old_index(), prev.key());
                    let next_path = new_path.add(node_index, next.key());
                    diff_pair(
                        events, patch, &prev_path, &next_path, mapper, prev, next, node_index,
                    );
                    old.advance();
                    new_pos += 1;
                    node_index += 1;
                    continue;
                }

                // Skip an old head that was already moved into the prefix.
                if !prev.key().is_empty() && moved.contains(prev.key()) {
                    old.advance();
                    continue;
                }

                let matched = if next.key().is_empty() {
                    None
                } else {
                    old_keyed
                        .get(&next.key().to_string())
                        .and_then(|&index| old_list.get(index))
                        .filter(|node| node.key() == next.key())
                };
                let prev_persists =
                    !prev.key().is_empty() && new_keyed.has(&prev.key().to_string());

                match (matched, prev_persists) {
                    // The new head existed before and the old head still has
                    // a place later: pull the match forward and reconsider.
                    (Some(matched), true) => {
                        trace!("diff: move key={} before {}", next.key(), node_index);
                        patch.push_change(Change::Move {
                            key: next.key().to_string(),
                            before: node_index,
                        });
                        moved.insert(next.key());
                        old.reconsider(matched);
                    }
                    // The old head has no place in the new list: drop it.
                    (Some(_), false) => {
                        trace!("diff: remove stale head at {}", node_index);
                        patch.push_change(Change::Remove { index: node_index });
                        let prev_path = old_path.add(old.old_index(), prev.key());
                        *events = events.release_subtree(&prev_path, prev);
                        old.advance();
                    }
                    // The new head is genuinely new while the old head is
                    // still needed later: insert just the new head.
                    (None, true) => {
                        trace!("diff: insert key={:?} at {}", next.key(), node_index);
                        let child_path = new_path.add(node_index, next.key());
                        *events = events.register_subtree(mapper, &child_path, next);
                        patch.push_change(Change::Insert {
                            nodes: vec![next.clone()],
                            before: node_index,
                        });
                        new_pos += 1;
                        node_index += 1;
                    }
                    // Neither side matches anything: swap the slot wholesale.
                    (None, false) => {
                        trace!("diff: replace at {}", node_index);
                        let prev_path = old_path.add(old.old_index(), prev.key());
                        *events = events.release_subtree(&prev_path, prev);
                        let child_path = new_path.add(node_index, next.key());
                        *events = events.register_subtree(mapper, &child_path, next);
                        patch.push_change(Change::Replace {
                            index: node_index,
                            node: next.clone(),
                        });
                        old.advance();
                        new_pos += 1;
                        node_index += 1;
                    }
                }
            }
        }
    }
}

/// Structural comparison of two nodes matched by identity.
#[allow(clippy::too_many_arguments)]
fn diff_pair<Msg: Clone + 'static>(
    events: &mut Events<Msg>,
    parent_patch: &mut Patch<Msg>,
    old_path: &Path,
    new_path: &Path,
    mapper: &Mapper<Msg>,
    prev: &Node<Msg>,
    next: &Node<Msg>,
    node_index: usize,
) {
    match (prev, next) {
        (Node::Text { content: old_text, .. }, Node::Text { content: new_text, .. }) => {
            if old_text != new_text {
                let mut child = Patch::new(node_index);
                child.push_change(Change::ReplaceText {
                    content: new_text.clone(),
                });
                parent_patch.push_child(child);
            }
        }

        (
            Node::Raw {
                namespace: old_ns,
                tag: old_tag,
                attributes: old_attrs,
                markup: old_markup,
                ..
            },
            Node::Raw {
                namespace: new_ns,
                tag: new_tag,
                attributes: new_attrs,
                markup: new_markup,
                ..
            },
        ) if old_ns == new_ns && old_tag == new_tag => {
            let mapper = mapper.compose(next.mapper());
            let mut child = Patch::new(node_index);
            if let Some(update) = diff_attributes(
                events, old_path, new_path, &mapper, old_attrs, new_attrs, false,
            ) {
                child.push_change(update);
            }
            if old_markup != new_markup {
                child.push_change(Change::ReplaceInnerHtml {
                    markup: new_markup.clone(),
                });
            }
            if !child.is_empty() {
                parent_patch.push_child(child);
            }
        }

        (
            Node::Element {
                namespace: old_ns,
                tag: old_tag,
                attributes: old_attrs,
                children: old_children,
                keyed: old_keyed,
                ..
            },
            Node::Element {
                namespace: new_ns,
                tag: new_tag,
                attributes: new_attrs,
                children: new_children,
                keyed: new_keyed,
                ..
            },
        ) if old_ns == new_ns && old_tag == new_tag => {
            let mapper = mapper.compose(next.mapper());
            let controlled = is_controllable(new_ns, new_tag) && events.has_dispatched(old_path);
            let mut child = Patch::new(node_index);
            if let Some(update) = diff_attributes(
                events, old_path, new_path, &mapper, old_attrs, new_attrs, controlled,
            ) {
                child.push_change(update);
            }
            diff_siblings(
                events,
                &mut child,
                old_path,
                new_path,
                &mapper,
                old_children,
                old_keyed,
                new_children,
                new_keyed,
            );
            if !child.is_empty() {
                parent_patch.push_child(child);
            }
        }

        (
            Node::Fragment {
                children: old_children,
                keyed: old_keyed,
                ..
            },
            Node::Fragment {
                children: new_children,
                keyed: new_keyed,
                ..
            },
        ) => {
            let mapper = mapper.compose(next.mapper());
            let mut child = Patch::new(node_index);
            diff_siblings(
                events,
                &mut child,
                old_path,
                new_path,
                &mapper,
                old_children,
                old_keyed,
                new_children,
                new_keyed,
            );
            if !child.is_empty() {
                parent_patch.push_child(child);
            }
        }

        // Variant or tag changed: swap the subtree.
        _ => {
            trace!("diff: structural mismatch at {}, replacing", node_index);
            *events = events.release_subtree(old_path, prev);
            *events = events.register_subtree(mapper, new_path, next);
            parent_patch.push_change(Change::Replace {
                index: node_index,
                node: next.clone(),
            });
        }
    }
}

/// Two-pointer walk over two canonical attribute lists. Returns the
/// `Update` change when anything host-visible changed. Registry bookkeeping
/// for event bindings happens here as a side effect.
fn diff_attributes<Msg: Clone + 'static>(
    events: &mut Events<Msg>,
    old_path: &Path,
    new_path: &Path,
    mapper: &Mapper<Msg>,
    old_attrs: &[Attribute<Msg>],
    new_attrs: &[Attribute<Msg>],
    controlled: bool,
) -> Option<Change<Msg>> {
    let mut added: Vec<Attribute<Msg>> = Vec::new();
    let mut removed: Vec<Attribute<Msg>> = Vec::new();
    let mut old_iter = old_attrs.iter().peekable();
    let mut new_iter = new_attrs.iter().peekable();

    loop {
        match (old_iter.peek(), new_iter.peek()) {
            (None, None) => break,
            (Some(old), None) => {
                remove_attr(events, old_path, old, &mut removed);
                old_iter.next();
            }
            (None, Some(new)) => {
                add_attr(events, new_path, mapper, new, &mut added);
                new_iter.next();
            }
            (Some(old), Some(new)) => {
                use std::cmp::Ordering;
                let old_rank = (u8::from(old.is_event()), old.name());
                let new_rank = (u8::from(new.is_event()), new.name());
                match old_rank.cmp(&new_rank) {
                    Ordering::Less => {
                        remove_attr(events, old_path, old, &mut removed);
                        old_iter.next();
                    }
                    Ordering::Greater => {
                        add_attr(events, new_path, mapper, new, &mut added);
                        new_iter.next();
                    }
                    Ordering::Equal => {
                        diff_same_name(
                            events, old_path, new_path, mapper, old, new, controlled, &mut added,
                            &mut removed,
                        );
                        old_iter.next();
                        new_iter.next();
                    }
                }
            }
        }
    }

    (!added.is_empty() || !removed.is_empty()).then_some(Change::Update { added, removed })
}

fn remove_attr<Msg: Clone + 'static>(
    events: &mut Events<Msg>,
    old_path: &Path,
    attr: &Attribute<Msg>,
    removed: &mut Vec<Attribute<Msg>>,
) {
    if attr.is_event() {
        *events = events.remove_binding(old_path, attr.name());
    }
    removed.push(attr.clone());
}

fn add_attr<Msg: Clone + 'static>(
    events: &mut Events<Msg>,
    new_path: &Path,
    mapper: &Mapper<Msg>,
    attr: &Attribute<Msg>,
    added: &mut Vec<Attribute<Msg>>,
) {
    if attr.is_event() {
        *events = events.add_binding(new_path, attr, mapper);
    }
    added.push(attr.clone());
}

/// Attributes force-synced while an element is controlled, so the host value
/// never drifts from application state after user input.
fn forces_sync(name: &str) -> bool {
    matches!(name, "value" | "checked" | "selected")
}

#[allow(clippy::too_many_arguments)]
fn diff_same_name<Msg: Clone + 'static>(
    events: &mut Events<Msg>,
    old_path: &Path,
    new_path: &Path,
    mapper: &Mapper<Msg>,
    old: &Attribute<Msg>,
    new: &Attribute<Msg>,
    controlled: bool,
    added: &mut Vec<Attribute<Msg>>,
    removed: &mut Vec<Attribute<Msg>>,
) {
    match (old, new) {
        (
            Attribute::Attribute { value: old_value, .. },
            Attribute::Attribute { value: new_value, .. },
        ) => {
            if old_value != new_value || (controlled && forces_sync(new.name())) {
                added.push(new.clone());
            }
        }
        (
            Attribute::Property { value: old_value, .. },
            Attribute::Property { value: new_value, .. },
        ) => {
            if old_value != new_value || (controlled && forces_sync(new.name())) {
                added.push(new.clone());
            }
        }
        (
            Attribute::Event {
                prevent_default: old_pd,
                stop_propagation: old_sp,
                immediate: old_im,
                debounce: old_db,
                throttle: old_th,
                include: old_inc,
                ..
            },
            Attribute::Event {
                prevent_default,
                stop_propagation,
                immediate,
                debounce,
                throttle,
                include,
                ..
            },
        ) => {
            // Decoders are opaque, so the registry always adopts the new
            // handler; the binding moved if the node's path shifted.
            if old_path != new_path {
                *events = events.remove_binding(old_path, old.name());
            }
            *events = events.add_binding(new_path, new, mapper);
            let policy_changed = old_pd != prevent_default
                || old_sp != stop_propagation
                || old_im != immediate
                || old_db != debounce
                || old_th != throttle
                || old_inc != include;
            if policy_changed {
                added.push(new.clone());
            }
        }
        // Same name, different variant: swap representations.
        _ => {
            remove_attr(events, old_path, old, removed);
            add_attr(events, new_path, mapper, new, added);
        }
    }
}
