//! Immutable tree snapshot model.
//!
//! A [`Node`] describes one unit of UI. Trees are value types: every render
//! produces a brand-new tree, and the previous one is only retained until
//! diffing completes. Identity across renders is positional unless a node
//! carries an explicit key.

use crate::attribute::{self, Attribute};
use pmap::Map;
use std::fmt;
use std::rc::Rc;

/// Composes outward-dispatched messages through nested render scopes.
///
/// When one render scope is embedded inside another, the inner scope's
/// messages are lifted into the outer message space by the mapper chain.
pub enum Mapper<Msg> {
    Identity,
    Map(Rc<dyn Fn(Msg) -> Msg>),
}

impl<Msg> Mapper<Msg> {
    pub fn wrap(f: impl Fn(Msg) -> Msg + 'static) -> Self {
        Mapper::Map(Rc::new(f))
    }

    pub fn apply(&self, msg: Msg) -> Msg {
        match self {
            Mapper::Identity => msg,
            Mapper::Map(f) => f(msg),
        }
    }

    /// `outer.compose(inner)` applies `inner` first, then `outer`, matching
    /// the direction messages travel out of nested scopes.
    pub fn compose(&self, inner: &Mapper<Msg>) -> Mapper<Msg>
    where
        Msg: 'static,
    {
        match (self, inner) {
            (Mapper::Identity, other) | (other, Mapper::Identity) => other.clone(),
            (Mapper::Map(outer), Mapper::Map(inner)) => {
                let outer = Rc::clone(outer);
                let inner = Rc::clone(inner);
                Mapper::Map(Rc::new(move |msg| outer(inner(msg))))
            }
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Mapper::Identity)
    }
}

impl<Msg> Clone for Mapper<Msg> {
    fn clone(&self) -> Self {
        match self {
            Mapper::Identity => Mapper::Identity,
            Mapper::Map(f) => Mapper::Map(Rc::clone(f)),
        }
    }
}

impl<Msg> fmt::Debug for Mapper<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mapper::Identity => f.write_str("Mapper::Identity"),
            Mapper::Map(_) => f.write_str("Mapper::Map"),
        }
    }
}

/// One node of a tree snapshot.
///
/// `key` is the identity across renders; an empty key means positional
/// identity. `keyed` indexes keyed children by key for move detection and is
/// built by the constructors, so child keys must be assigned before the
/// parent is constructed.
#[derive(Clone, Debug)]
pub enum Node<Msg> {
    /// Ordered children with no host element of their own; anchored in the
    /// host tree by a marker.
    Fragment {
        key: String,
        mapper: Mapper<Msg>,
        children: Vec<Node<Msg>>,
        keyed: Map<String, usize>,
    },
    Element {
        key: String,
        mapper: Mapper<Msg>,
        namespace: String,
        tag: String,
        attributes: Vec<Attribute<Msg>>,
        children: Vec<Node<Msg>>,
        keyed: Map<String, usize>,
        self_closing: bool,
        void: bool,
    },
    Text {
        key: String,
        mapper: Mapper<Msg>,
        content: String,
    },
    /// Verbatim markup payload; children are never diffed.
    Raw {
        key: String,
        mapper: Mapper<Msg>,
        namespace: String,
        tag: String,
        attributes: Vec<Attribute<Msg>>,
        markup: String,
    },
}

/// Tags with no closing tag and no children in the default namespace.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "param", "source", "track", "wbr",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub(crate) fn keyed_index<Msg>(children: &[Node<Msg>]) -> Map<String, usize> {
    let mut keyed = Map::new();
    for (index, child) in children.iter().enumerate() {
        if !child.key().is_empty() {
            keyed = keyed.set(child.key().to_string(), index);
        }
    }
    keyed
}

pub fn element<Msg>(
    tag: impl Into<String>,
    attributes: Vec<Attribute<Msg>>,
    children: Vec<Node<Msg>>,
) -> Node<Msg> {
    element_ns("", tag, attributes, children)
}

pub fn element_ns<Msg>(
    namespace: impl Into<String>,
    tag: impl Into<String>,
    attributes: Vec<Attribute<Msg>>,
    children: Vec<Node<Msg>>,
) -> Node<Msg> {
    let tag = tag.into();
    let namespace = namespace.into();
    let void = namespace.is_empty() && is_void_element(&tag);
    let keyed = keyed_index(&children);
    Node::Element {
        key: String::new(),
        mapper: Mapper::Identity,
        namespace,
        tag,
        attributes: attribute::prepare(attributes),
        children,
        keyed,
        self_closing: false,
        void,
    }
}

pub fn text<Msg>(content: impl Into<String>) -> Node<Msg> {
    Node::Text {
        key: String::new(),
        mapper: Mapper::Identity,
        content: content.into(),
    }
}

pub fn fragment<Msg>(children: Vec<Node<Msg>>) -> Node<Msg> {
    let keyed = keyed_index(&children);
    Node::Fragment {
        key: String::new(),
        mapper: Mapper::Identity,
        children,
        keyed,
    }
}

/// Element whose markup payload is inserted verbatim, bypassing child diffing.
pub fn raw<Msg>(
    tag: impl Into<String>,
    attributes: Vec<Attribute<Msg>>,
    markup: impl Into<String>,
) -> Node<Msg> {
    Node::Raw {
        key: String::new(),
        mapper: Mapper::Identity,
        namespace: String::new(),
        tag: tag.into(),
        attributes: attribute::prepare(attributes),
        markup: markup.into(),
    }
}

/// Assigns identity keys to a list of children. Use before handing the list
/// to a parent constructor so the keyed index picks the keys up.
pub fn keyed<Msg, K: Into<String>>(pairs: Vec<(K, Node<Msg>)>) -> Vec<Node<Msg>> {
    pairs
        .into_iter()
        .map(|(key, node)| node.with_key(key))
        .collect()
}

impl<Msg> Node<Msg> {
    pub fn key(&self) -> &str {
        match self {
            Node::Fragment { key, .. }
            | Node::Element { key, .. }
            | Node::Text { key, .. }
            | Node::Raw { key, .. } => key,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        let slot = match &mut self {
            Node::Fragment { key, .. }
            | Node::Element { key, .. }
            | Node::Text { key, .. }
            | Node::Raw { key, .. } => key,
        };
        *slot = key.into();
        self
    }

    /// Marks an element as self-closing (`<path/>`-style markup in foreign
    /// namespaces). No effect on other variants.
    pub fn self_closing(mut self) -> Self {
        if let Node::Element { self_closing, .. } = &mut self {
            *self_closing = true;
        }
        self
    }

    pub fn mapper(&self) -> &Mapper<Msg> {
        match self {
            Node::Fragment { mapper, .. }
            | Node::Element { mapper, .. }
            | Node::Text { mapper, .. }
            | Node::Raw { mapper, .. } => mapper,
        }
    }

    /// Lifts every message produced inside this subtree through `f`.
    pub fn map(mut self, f: impl Fn(Msg) -> Msg + 'static) -> Self
    where
        Msg: 'static,
    {
        let wrapped = Mapper::wrap(f);
        let slot = match &mut self {
            Node::Fragment { mapper, .. }
            | Node::Element { mapper, .. }
            | Node::Text { mapper, .. }
            | Node::Raw { mapper, .. } => mapper,
        };
        *slot = wrapped.compose(slot);
        self
    }

    pub fn children(&self) -> &[Node<Msg>] {
        match self {
            Node::Fragment { children, .. } | Node::Element { children, .. } => children,
            Node::Text { .. } | Node::Raw { .. } => &[],
        }
    }

    pub fn keyed_children(&self) -> Option<&Map<String, usize>> {
        match self {
            Node::Fragment { keyed, .. } | Node::Element { keyed, .. } => Some(keyed),
            Node::Text { .. } | Node::Raw { .. } => None,
        }
    }

    pub fn attributes(&self) -> &[Attribute<Msg>] {
        match self {
            Node::Element { attributes, .. } | Node::Raw { attributes, .. } => attributes,
            Node::Fragment { .. } | Node::Text { .. } => &[],
        }
    }
}
