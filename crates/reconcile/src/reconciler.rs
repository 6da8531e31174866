//! Stack-driven application of patch trees against a live host tree.
//!
//! Contract:
//! - `mount` materializes a full tree once; `push` applies one patch tree.
//! - Patch application is iterative over an explicit work stack, so tree
//!   depth can never overflow the call stack.
//! - Per patch node: leaf changes apply in list order, then trailing
//!   children are trimmed, then nested child patches are resolved against
//!   the (now final) child list.
//! - Nothing here is fatal: a patch that no longer matches the live tree
//!   degrades to skipped operations with a warning, never a panic.

use crate::host::Host;
use crate::meta::{Arena, MetaKind, MetaNode, NodeRef};
use crate::timing::PendingDebounce;
use log::{trace, warn};
use serde_json::Value;
use std::collections::HashMap;
use vdom::{
    Attribute, Change, Diff, Dispatched, Events, HandlerError, Mapper, Node, Patch, Path,
};

/// Outcome of routing one native event occurrence.
#[derive(Clone, Debug)]
pub enum Dispatch<Msg> {
    /// Decoded synchronously; hand the message to the dispatch sink.
    Message(Dispatched<Msg>),
    /// Debounced; the host should arrange a wakeup at `deadline` and call
    /// [`Reconciler::poll_timers`].
    Pending { deadline: u64 },
    /// Dropped inside a throttle window.
    Suppressed,
    /// Registry miss or payload decode failure; both benign.
    Failed(HandlerError),
}

/// Live-tree state machine: host handles, shadow metadata, the event
/// registry baseline, and dispatch timing.
pub struct Reconciler<H: Host, Msg> {
    host: H,
    arena: Arena<H>,
    root: NodeRef,
    events: Events<Msg>,
    /// Mirror of every armed debounce deadline, for `next_deadline` without
    /// an arena scan.
    pending: HashMap<(NodeRef, String), u64>,
}

impl<H: Host, Msg: Clone + 'static> Reconciler<H, Msg> {
    /// `mount_point` is the host container the tree will live under.
    pub fn new(host: H, mount_point: H::Handle) -> Self {
        let mut arena = Arena::new();
        let root = arena.alloc(MetaNode::new(
            MetaKind::Root,
            String::new(),
            None,
            mount_point,
        ));
        Self {
            host,
            arena,
            root,
            events: Events::new(),
            pending: HashMap::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Current event-registry baseline, to thread into the next diff.
    pub fn events(&self) -> &Events<Msg> {
        &self.events
    }

    /// Adopts the registry produced by a diff as the new baseline.
    pub fn commit(&mut self, events: Events<Msg>) {
        self.events = events;
    }

    /// One-shot full materialization of `tree`, replacing any previous
    /// mount. Handlers for the whole tree are registered as the new
    /// baseline.
    pub fn mount(&mut self, tree: &Node<Msg>) {
        let existing = self
            .arena
            .get(self.root)
            .map(|meta| meta.children.len())
            .unwrap_or(0);
        for _ in 0..existing {
            self.remove_subtree(self.root, 0);
        }
        let Some(container) = self.arena.get(self.root).map(|meta| meta.handle.clone()) else {
            return;
        };
        let child = self.materialize(tree, self.root, &container, None);
        if let Some(root_meta) = self.arena.get_mut(self.root) {
            root_meta.children.push(child);
        }
        self.events = Events::new().register_subtree(
            &Mapper::Identity,
            &Path::root().add(0, tree.key()),
            tree,
        );
    }

    /// Applies a diff result: the patch against the live tree, the registry
    /// as the new baseline.
    pub fn apply(&mut self, diff: Diff<Msg>) {
        let Diff { patch, events } = diff;
        self.push(patch);
        self.commit(events);
    }

    /// Applies one patch tree.
    pub fn push(&mut self, patch: Patch<Msg>) {
        let mut stack = vec![(self.root, patch)];
        while let Some((target, patch)) = stack.pop() {
            if self.arena.get(target).is_none() {
                warn!("reconcile: patch target no longer live, skipping");
                continue;
            }
            for change in patch.changes {
                self.apply_change(target, change);
            }
            if patch.removed > 0 {
                self.trim_trailing(target, patch.removed);
            }
            for child_patch in patch.children {
                let child = self
                    .arena
                    .get(target)
                    .and_then(|meta| meta.children.get(child_patch.index).copied());
                match child {
                    Some(child) => stack.push((child, child_patch)),
                    None => warn!(
                        "reconcile: no live child at index {}, skipping nested patch",
                        child_patch.index
                    ),
                }
            }
        }
    }

    fn apply_change(&mut self, target: NodeRef, change: Change<Msg>) {
        match change {
            Change::ReplaceText { content } => {
                let Some(meta) = self.arena.get(target) else { return };
                if meta.kind == MetaKind::Text {
                    let handle = meta.handle.clone();
                    self.host.set_text(&handle, &content);
                } else {
                    warn!("reconcile: replace-text on a non-text node, skipping");
                }
            }
            Change::ReplaceInnerHtml { markup } => {
                let Some(meta) = self.arena.get(target) else { return };
                let handle = meta.handle.clone();
                self.host.set_raw_markup(&handle, &markup);
            }
            Change::Update { added, removed } => self.apply_update(target, added, removed),
            Change::Move { key, before } => self.apply_move(target, &key, before),
            Change::Remove { index } => {
                if !self.remove_subtree(target, index) {
                    warn!("reconcile: remove index {index} out of range, skipping");
                }
            }
            Change::Replace { index, node } => {
                if self.remove_subtree(target, index) {
                    self.insert_nodes(target, std::slice::from_ref(&node), index);
                } else {
                    warn!("reconcile: replace index {index} out of range, skipping");
                }
            }
            Change::Insert { nodes, before } => self.insert_nodes(target, &nodes, before),
        }
    }

    // ------------------------------------------------------------------
    // Materialization and structural edits
    // ------------------------------------------------------------------

    /// Creates host + metadata for `node`, inserting its host nodes into
    /// `container` before `anchor`. The caller links the returned ref into
    /// the parent's child list.
    fn materialize(
        &mut self,
        node: &Node<Msg>,
        parent: NodeRef,
        container: &H::Handle,
        anchor: Option<&H::Handle>,
    ) -> NodeRef {
        match node {
            Node::Element {
                key,
                namespace,
                tag,
                attributes,
                children,
                ..
            } => {
                let handle = self.host.create_element(namespace, tag);
                let node_ref = self.arena.alloc(MetaNode::new(
                    MetaKind::Element {
                        namespace: namespace.clone(),
                        tag: tag.clone(),
                    },
                    key.clone(),
                    Some(parent),
                    handle.clone(),
                ));
                self.host.insert_before(container, &handle, anchor);
                for attribute in attributes {
                    self.apply_attribute(node_ref, &handle, attribute);
                }
                for child in children {
                    let child_ref = self.materialize(child, node_ref, &handle, None);
                    if let Some(meta) = self.arena.get_mut(node_ref) {
                        meta.children.push(child_ref);
                    }
                }
                node_ref
            }
            Node::Text { key, content, .. } => {
                let handle = self.host.create_text(content);
                let node_ref = self.arena.alloc(MetaNode::new(
                    MetaKind::Text,
                    key.clone(),
                    Some(parent),
                    handle.clone(),
                ));
                self.host.insert_before(container, &handle, anchor);
                node_ref
            }
            Node::Raw {
                key,
                namespace,
                tag,
                attributes,
                markup,
                ..
            } => {
                let handle = self.host.create_element(namespace, tag);
                let node_ref = self.arena.alloc(MetaNode::new(
                    MetaKind::Raw,
                    key.clone(),
                    Some(parent),
                    handle.clone(),
                ));
                self.host.insert_before(container, &handle, anchor);
                for attribute in attributes {
                    self.apply_attribute(node_ref, &handle, attribute);
                }
                self.host.set_raw_markup(&handle, markup);
                node_ref
            }
            Node::Fragment { key, children, .. } => {
                let marker = self.host.create_fragment_marker();
                let node_ref = self.arena.alloc(MetaNode::new(
                    MetaKind::Fragment,
                    key.clone(),
                    Some(parent),
                    marker.clone(),
                ));
                self.host.insert_before(container, &marker, anchor);
                // Fragment children are host siblings of the marker: they go
                // into the same container, before the same anchor.
                for child in children {
                    let child_ref = self.materialize(child, node_ref, container, anchor);
                    if let Some(meta) = self.arena.get_mut(node_ref) {
                        meta.children.push(child_ref);
                    }
                }
                node_ref
            }
        }
    }

    fn insert_nodes(&mut self, parent: NodeRef, nodes: &[Node<Msg>], before: usize) {
        let Some(container) = self.container_of(parent) else {
            warn!("reconcile: insert into a node without a container, skipping");
            return;
        };
        let len = self
            .arena
            .get(parent)
            .map(|meta| meta.children.len())
            .unwrap_or(0);
        let before = before.min(len);
        let anchor = self.anchor_at(parent, before);
        for (offset, node) in nodes.iter().enumerate() {
            let child = self.materialize(node, parent, &container, anchor.as_ref());
            if let Some(meta) = self.arena.get_mut(parent) {
                let at = (before + offset).min(meta.children.len());
                meta.children.insert(at, child);
            }
        }
    }

    /// Detaches the child at `index`: host nodes out of the tree, timers
    /// cleared for the whole subtree, metadata freed.
    fn remove_subtree(&mut self, parent: NodeRef, index: usize) -> bool {
        let Some(child) = self
            .arena
            .get(parent)
            .and_then(|meta| meta.children.get(index).copied())
        else {
            return false;
        };
        if let Some(meta) = self.arena.get_mut(parent) {
            meta.children.remove(index);
        }
        if let Some(container) = self.container_of(parent) {
            self.remove_host_subtree(child, &container);
        }
        self.free_subtree(child);
        true
    }

    fn remove_host_subtree(&mut self, node: NodeRef, container: &H::Handle) {
        let Some(meta) = self.arena.get(node) else { return };
        let handle = meta.handle.clone();
        let is_fragment = meta.kind == MetaKind::Fragment;
        let children = meta.children.clone();
        self.host.remove_child(container, &handle);
        if is_fragment {
            for child in children {
                self.remove_host_subtree(child, container);
            }
        }
    }

    fn free_subtree(&mut self, node: NodeRef) {
        let Some(meta) = self.arena.get(node) else { return };
        let children = meta.children.clone();
        let timers: Vec<String> = meta.timing.keys().cloned().collect();
        for name in timers {
            self.pending.remove(&(node, name));
        }
        for child in children {
            self.free_subtree(child);
        }
        self.arena.release(node);
    }

    fn trim_trailing(&mut self, target: NodeRef, count: usize) {
        for _ in 0..count {
            let len = self
                .arena
                .get(target)
                .map(|meta| meta.children.len())
                .unwrap_or(0);
            if len == 0 {
                warn!("reconcile: trailing trim ran out of children");
                break;
            }
            self.remove_subtree(target, len - 1);
        }
    }

    /// Relocates the keyed child (its host nodes move, nothing is
    /// recreated) to sit at position `before`.
    fn apply_move(&mut self, target: NodeRef, key: &str, before: usize) {
        let Some(children) = self.arena.get(target).map(|meta| meta.children.clone()) else {
            return;
        };
        let pos = children
            .iter()
            .position(|&c| self.arena.get(c).is_some_and(|meta| meta.key == key));
        let Some(pos) = pos else {
            warn!("reconcile: move target key {key:?} not found, skipping");
            return;
        };
        let child = children[pos];
        let at = {
            let Some(meta) = self.arena.get_mut(target) else { return };
            meta.children.remove(pos);
            let at = before.min(meta.children.len());
            meta.children.insert(at, child);
            at
        };
        let Some(container) = self.container_of(target) else { return };
        let anchor = self.anchor_at(target, at + 1);
        trace!("reconcile: move key={key} to {at}");
        self.move_host_subtree(child, &container, anchor.as_ref());
    }

    fn move_host_subtree(&mut self, node: NodeRef, container: &H::Handle, anchor: Option<&H::Handle>) {
        let Some(meta) = self.arena.get(node) else { return };
        let handle = meta.handle.clone();
        let is_fragment = meta.kind == MetaKind::Fragment;
        let children = meta.children.clone();
        self.host.move_before(container, &handle, anchor);
        if is_fragment {
            for child in children {
                self.move_host_subtree(child, container, anchor);
            }
        }
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    fn apply_update(
        &mut self,
        target: NodeRef,
        added: Vec<Attribute<Msg>>,
        removed: Vec<Attribute<Msg>>,
    ) {
        let Some(handle) = self.arena.get(target).map(|meta| meta.handle.clone()) else {
            return;
        };
        for attribute in &removed {
            match attribute {
                Attribute::Attribute { name, .. } => {
                    self.host.remove_attribute(&handle, name);
                    match name.as_str() {
                        "value" => self.host.sync_value(&handle, ""),
                        "checked" => self.host.sync_checked(&handle, false),
                        "selected" => self.host.sync_selected(&handle, false),
                        "autoplay" => {
                            self.host.set_property(&handle, "autoplay", &Value::Bool(false))
                        }
                        _ => {}
                    }
                }
                Attribute::Property { name, .. } => {
                    self.host.set_property(&handle, name, &Value::Null);
                }
                Attribute::Event { name, .. } => {
                    let had = self
                        .arena
                        .get(target)
                        .is_some_and(|meta| meta.listeners.iter().any(|n| n == name));
                    if had {
                        self.host.remove_event_listener(&handle, name);
                        if let Some(meta) = self.arena.get_mut(target) {
                            meta.listeners.retain(|n| n != name);
                            meta.timing.remove(name);
                        }
                        self.pending.remove(&(target, name.clone()));
                    }
                }
            }
        }
        for attribute in &added {
            self.apply_attribute(target, &handle, attribute);
        }
    }

    fn apply_attribute(&mut self, target: NodeRef, handle: &H::Handle, attribute: &Attribute<Msg>) {
        match attribute {
            Attribute::Attribute { name, value } => {
                if name.as_str() == "value"
                    && self.host.get_attribute(handle, "value").as_deref() == Some(value.as_str())
                {
                    // Live value already matches; rewriting it would clobber
                    // the caret.
                    return;
                }
                self.host.set_attribute(handle, name, value);
                match name.as_str() {
                    "value" => self.host.sync_value(handle, value),
                    "checked" => self.host.sync_checked(handle, true),
                    "selected" => self.host.sync_selected(handle, true),
                    "autofocus" => self.host.request_focus(handle),
                    "autoplay" => self.host.set_property(handle, "autoplay", &Value::Bool(true)),
                    _ => {}
                }
            }
            Attribute::Property { name, value } => {
                self.host.set_property(handle, name, value);
                match name.as_str() {
                    "value" => {
                        if let Some(text) = value.as_str() {
                            self.host.sync_value(handle, text);
                        }
                    }
                    "checked" => self.host.sync_checked(handle, value.as_bool().unwrap_or(false)),
                    "selected" => self.host.sync_selected(handle, value.as_bool().unwrap_or(false)),
                    "autofocus" => {
                        if value.as_bool().unwrap_or(false) {
                            self.host.request_focus(handle);
                        }
                    }
                    _ => {}
                }
            }
            Attribute::Event {
                name,
                debounce,
                throttle,
                ..
            } => {
                let has_listener = self
                    .arena
                    .get(target)
                    .is_some_and(|meta| meta.listeners.iter().any(|n| n == name));
                if !has_listener {
                    self.host.add_event_listener(handle, target, name);
                    if let Some(meta) = self.arena.get_mut(target) {
                        meta.listeners.push(name.clone());
                    }
                }
                // A delay reconfigured to zero clears its pending state.
                if let Some(meta) = self.arena.get_mut(target) {
                    if let Some(entry) = meta.timing.get_mut(name) {
                        if *debounce == 0 && entry.debounce.take().is_some() {
                            self.pending.remove(&(target, name.clone()));
                        }
                        if *throttle == 0 {
                            entry.clear_throttle();
                        }
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Routes one native event occurrence for the node the host registered
    /// the listener on. `now` is the host clock in milliseconds.
    pub fn dispatch(&mut self, target: NodeRef, name: &str, payload: &Value, now: u64) -> Dispatch<Msg> {
        let Some(path) = self.path_of(target) else {
            return Dispatch::Failed(HandlerError::NotFound);
        };
        let Some(policy) = self.events.policy(&path, name).cloned() else {
            return Dispatch::Failed(HandlerError::NotFound);
        };

        if policy.debounce == 0 && policy.throttle == 0 {
            return self.deliver(&path, name, payload);
        }

        let Some(meta) = self.arena.get_mut(target) else {
            return Dispatch::Failed(HandlerError::NotFound);
        };
        let entry = meta.timing.entry(name.to_string()).or_default();
        let seq = entry.bump();

        let mut leading_edge = false;
        if policy.throttle > 0 && entry.throttle_allows(now, policy.throttle) {
            entry.throttle_last_fired = Some(now);
            entry.throttle_fired_seq = seq;
            leading_edge = true;
        }

        if policy.debounce > 0 {
            let deadline = now + policy.debounce;
            entry.debounce = Some(PendingDebounce {
                deadline,
                payload: payload.clone(),
                seq,
            });
            self.pending.insert((target, name.to_string()), deadline);
            if !leading_edge {
                trace!("reconcile: debounced {name} until {deadline}");
                return Dispatch::Pending { deadline };
            }
        }

        if policy.throttle > 0 && !leading_edge {
            return Dispatch::Suppressed;
        }
        self.deliver(&path, name, payload)
    }

    fn deliver(&mut self, path: &Path, name: &str, payload: &Value) -> Dispatch<Msg> {
        let (events, result) = self.events.handle(path, name, payload);
        self.events = events;
        match result {
            Ok(message) => Dispatch::Message(message),
            Err(error) => Dispatch::Failed(error),
        }
    }

    /// Earliest armed debounce deadline, if any. The host schedules one
    /// wakeup for it.
    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.values().copied().min()
    }

    /// Fires every debounce whose deadline has passed, in unspecified
    /// order, and returns the decoded messages.
    pub fn poll_timers(&mut self, now: u64) -> Vec<Dispatched<Msg>> {
        let due: Vec<(NodeRef, String)> = self
            .pending
            .iter()
            .filter(|&(_, &deadline)| deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        let mut out = Vec::new();
        for (target, name) in due {
            self.pending.remove(&(target, name.clone()));
            let mut restore = None;
            let mut payload = None;
            if let Some(meta) = self.arena.get_mut(target) {
                if let Some(entry) = meta.timing.get_mut(&name) {
                    match &entry.debounce {
                        Some(pending) if pending.deadline > now => {
                            restore = Some(pending.deadline);
                        }
                        Some(_) => {
                            if let Some(pending) = entry.debounce.take() {
                                if entry.throttle_fired_seq != pending.seq {
                                    payload = Some(pending.payload);
                                }
                            }
                        }
                        None => {}
                    }
                }
            }
            if let Some(deadline) = restore {
                self.pending.insert((target, name), deadline);
                continue;
            }
            let Some(payload) = payload else { continue };
            let Some(path) = self.path_of(target) else { continue };
            let (events, result) = self.events.handle(&path, &name, &payload);
            self.events = events;
            if let Ok(message) = result {
                out.push(message);
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // Paths and anchors
    // ------------------------------------------------------------------

    /// Recomputes the path of a live node by walking parent links; each
    /// level is a sibling-position lookup, never a whole-tree scan.
    pub fn path_of(&self, target: NodeRef) -> Option<Path> {
        let mut steps: Vec<(usize, String)> = Vec::new();
        let mut current = target;
        while current != self.root {
            let meta = self.arena.get(current)?;
            let parent_ref = meta.parent?;
            let parent = self.arena.get(parent_ref)?;
            let index = parent.children.iter().position(|&c| c == current)?;
            steps.push((index, meta.key.clone()));
            current = parent_ref;
        }
        let mut path = Path::root();
        for (index, key) in steps.into_iter().rev() {
            path = path.add(index, &key);
        }
        Some(path)
    }

    /// Host handle that parents the children of `node`: the node itself for
    /// elements, the nearest element ancestor for fragments.
    fn container_of(&self, node: NodeRef) -> Option<H::Handle> {
        let meta = self.arena.get(node)?;
        match &meta.kind {
            MetaKind::Root | MetaKind::Element { .. } | MetaKind::Raw => Some(meta.handle.clone()),
            MetaKind::Text => None,
            MetaKind::Fragment => self.container_of(meta.parent?),
        }
    }

    /// Host reference node for an insertion at `index` under `parent`. Past
    /// the end this is the next host sibling after the parent's last live
    /// descendant.
    fn anchor_at(&self, parent: NodeRef, index: usize) -> Option<H::Handle> {
        let meta = self.arena.get(parent)?;
        if let Some(&child) = meta.children.get(index) {
            return self.arena.get(child).map(|m| m.handle.clone());
        }
        self.anchor_after(parent)
    }

    fn anchor_after(&self, node: NodeRef) -> Option<H::Handle> {
        let meta = self.arena.get(node)?;
        let parent_ref = meta.parent?;
        let parent = self.arena.get(parent_ref)?;
        let pos = parent.children.iter().position(|&c| c == node)?;
        if let Some(&next) = parent.children.get(pos + 1) {
            return self.arena.get(next).map(|m| m.handle.clone());
        }
        if parent.kind == MetaKind::Fragment {
            self.anchor_after(parent_ref)
        } else {
            None
        }
    }
}
