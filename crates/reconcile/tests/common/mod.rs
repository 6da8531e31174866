//! In-memory host double for reconciler tests.
//!
//! Applies the capability calls against a plain node store so tests can
//! compare a patched tree against a directly materialized one, and inspect
//! listener wiring and node identity.

// Each test binary uses a different slice of the helpers.
#![allow(dead_code)]

use reconcile::{Host, NodeRef};
use serde_json::Value;
use std::collections::BTreeMap;

pub const ROOT: u32 = 0;

#[derive(Clone, Debug)]
pub enum TestKind {
    Element { tag: String },
    Text { content: String },
    Marker,
}

#[derive(Clone, Debug)]
pub struct TestNode {
    pub kind: TestKind,
    pub parent: Option<u32>,
    pub children: Vec<u32>,
    pub attributes: BTreeMap<String, String>,
    pub properties: BTreeMap<String, Value>,
    pub listeners: BTreeMap<String, NodeRef>,
    pub raw: Option<String>,
}

impl TestNode {
    fn new(kind: TestKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            attributes: BTreeMap::new(),
            properties: BTreeMap::new(),
            listeners: BTreeMap::new(),
            raw: None,
        }
    }
}

pub struct TestHost {
    nodes: BTreeMap<u32, TestNode>,
    next_id: u32,
    pub focus_requests: Vec<u32>,
}

impl TestHost {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            ROOT,
            TestNode::new(TestKind::Element {
                tag: "#root".to_string(),
            }),
        );
        Self {
            nodes,
            next_id: 1,
            focus_requests: Vec::new(),
        }
    }

    fn alloc(&mut self, kind: TestKind) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, TestNode::new(kind));
        id
    }

    fn detach(&mut self, node: u32) {
        let parent = self.nodes.get(&node).and_then(|n| n.parent);
        if let Some(parent) = parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.retain(|&c| c != node);
            }
        }
        if let Some(entry) = self.nodes.get_mut(&node) {
            entry.parent = None;
        }
    }

    fn delete_subtree(&mut self, node: u32) {
        let Some(entry) = self.nodes.remove(&node) else { return };
        for child in entry.children {
            self.delete_subtree(child);
        }
    }

    fn insert(&mut self, parent: u32, node: u32, reference: Option<u32>) {
        self.detach(node);
        let Some(parent_node) = self.nodes.get_mut(&parent) else { return };
        let position = reference
            .and_then(|r| parent_node.children.iter().position(|&c| c == r))
            .unwrap_or(parent_node.children.len());
        parent_node.children.insert(position, node);
        if let Some(entry) = self.nodes.get_mut(&node) {
            entry.parent = Some(parent);
        }
    }

    pub fn get(&self, node: u32) -> Option<&TestNode> {
        self.nodes.get(&node)
    }

    /// First node with the given tag, in allocation order.
    pub fn find_by_tag(&self, tag: &str) -> Option<u32> {
        self.nodes.iter().find_map(|(&id, node)| match &node.kind {
            TestKind::Element { tag: t } if t == tag => Some(id),
            _ => None,
        })
    }

    /// Allocation ids of every element with the given tag.
    pub fn ids_with_tag(&self, tag: &str) -> Vec<u32> {
        self.nodes
            .iter()
            .filter_map(|(&id, node)| match &node.kind {
                TestKind::Element { tag: t } if t == tag => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn listener_target(&self, node: u32, name: &str) -> Option<NodeRef> {
        self.nodes.get(&node)?.listeners.get(name).copied()
    }

    /// Deterministic serialization of the tree under the root container.
    /// Default-valued sync properties are skipped so a patched tree and a
    /// directly mounted one compare equal.
    pub fn snapshot(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.nodes.get(&ROOT) {
            for &child in &root.children {
                self.write(&mut out, child);
            }
        }
        out
    }

    fn write(&self, out: &mut String, node: u32) {
        let Some(entry) = self.nodes.get(&node) else {
            out.push_str("<missing>");
            return;
        };
        match &entry.kind {
            TestKind::Text { content } => {
                out.push('"');
                out.push_str(content);
                out.push('"');
            }
            TestKind::Marker => out.push_str("<!>"),
            TestKind::Element { tag } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &entry.attributes {
                    out.push_str(&format!(" {name}={value:?}"));
                }
                for (name, value) in &entry.properties {
                    if skip_property(name, value) {
                        continue;
                    }
                    out.push_str(&format!(" .{name}={value}"));
                }
                for name in entry.listeners.keys() {
                    out.push_str(&format!(" @{name}"));
                }
                out.push('>');
                if let Some(raw) = &entry.raw {
                    out.push_str(raw);
                }
                for &child in &entry.children {
                    self.write(out, child);
                }
                out.push_str(&format!("</{tag}>"));
            }
        }
    }
}

/// Sync hooks leave default-valued properties behind when attributes are
/// removed; those are indistinguishable from "never set" on a real host.
fn skip_property(name: &str, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => name == "value" && s.is_empty(),
        Value::Bool(false) => matches!(name, "checked" | "selected" | "autoplay"),
        _ => false,
    }
}

impl Host for TestHost {
    type Handle = u32;

    fn create_element(&mut self, _namespace: &str, tag: &str) -> u32 {
        self.alloc(TestKind::Element {
            tag: tag.to_string(),
        })
    }

    fn create_text(&mut self, content: &str) -> u32 {
        self.alloc(TestKind::Text {
            content: content.to_string(),
        })
    }

    fn create_fragment_marker(&mut self) -> u32 {
        self.alloc(TestKind::Marker)
    }

    fn insert_before(&mut self, parent: &u32, node: &u32, reference: Option<&u32>) {
        self.insert(*parent, *node, reference.copied());
    }

    fn move_before(&mut self, parent: &u32, node: &u32, reference: Option<&u32>) {
        self.insert(*parent, *node, reference.copied());
    }

    fn remove_child(&mut self, _parent: &u32, node: &u32) {
        self.detach(*node);
        self.delete_subtree(*node);
    }

    fn get_attribute(&mut self, node: &u32, name: &str) -> Option<String> {
        self.nodes.get(node)?.attributes.get(name).cloned()
    }

    fn set_attribute(&mut self, node: &u32, name: &str, value: &str) {
        if let Some(entry) = self.nodes.get_mut(node) {
            entry.attributes.insert(name.to_string(), value.to_string());
        }
    }

    fn remove_attribute(&mut self, node: &u32, name: &str) {
        if let Some(entry) = self.nodes.get_mut(node) {
            entry.attributes.remove(name);
        }
    }

    fn set_property(&mut self, node: &u32, name: &str, value: &Value) {
        if let Some(entry) = self.nodes.get_mut(node) {
            entry.properties.insert(name.to_string(), value.clone());
        }
    }

    fn add_event_listener(&mut self, node: &u32, target: NodeRef, name: &str) {
        if let Some(entry) = self.nodes.get_mut(node) {
            entry.listeners.insert(name.to_string(), target);
        }
    }

    fn remove_event_listener(&mut self, node: &u32, name: &str) {
        if let Some(entry) = self.nodes.get_mut(node) {
            entry.listeners.remove(name);
        }
    }

    fn set_text(&mut self, node: &u32, content: &str) {
        if let Some(entry) = self.nodes.get_mut(node) {
            if let TestKind::Text { content: existing } = &mut entry.kind {
                *existing = content.to_string();
            }
        }
    }

    fn set_raw_markup(&mut self, node: &u32, markup: &str) {
        if let Some(entry) = self.nodes.get_mut(node) {
            entry.raw = Some(markup.to_string());
        }
    }

    fn request_focus(&mut self, node: &u32) {
        self.focus_requests.push(*node);
    }
}
