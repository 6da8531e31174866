//! Stable addressing for node positions.
//!
//! A [`Path`] chains key/index steps from the root and serializes to a token
//! string used as the handler-registry key and as the correlation id carried
//! back by native dispatch. The format must stay bit-exact: any remote peer
//! correlating dispatched paths parses the same tokens.
//!
//! Token format:
//! - Segments join with [`SEGMENT_SEPARATOR`]; a segment is the node's key
//!   string, or its decimal sibling index when it has no key.
//! - An event name joins the serialized path with [`EVENT_SEPARATOR`], which
//!   is distinct from the segment separator so `path` and `path ⊕ event`
//!   tokens can never collide.

use std::fmt;
use std::rc::Rc;

/// Joins path segments (ASCII unit separator).
pub const SEGMENT_SEPARATOR: char = '\u{1F}';
/// Joins a serialized path to an event name (ASCII record separator).
pub const EVENT_SEPARATOR: char = '\u{1E}';

/// Address of one node position, built by chaining steps from the root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Path {
    Root,
    Key { key: String, parent: Rc<Path> },
    Index { index: usize, parent: Rc<Path> },
}

impl Path {
    pub fn root() -> Self {
        Path::Root
    }

    pub fn key(&self, key: impl Into<String>) -> Self {
        Path::Key {
            key: key.into(),
            parent: Rc::new(self.clone()),
        }
    }

    pub fn index(&self, index: usize) -> Self {
        Path::Index {
            index,
            parent: Rc::new(self.clone()),
        }
    }

    /// Keyed step when `key` is non-empty, positional step otherwise.
    pub fn add(&self, index: usize, key: &str) -> Self {
        if key.is_empty() {
            self.index(index)
        } else {
            self.key(key)
        }
    }

    /// Serialized segment token, root first.
    pub fn to_token(&self) -> String {
        let mut segments = Vec::new();
        let mut current = self;
        loop {
            match current {
                Path::Root => break,
                Path::Key { key, parent } => {
                    segments.push(key.clone());
                    current = parent;
                }
                Path::Index { index, parent } => {
                    segments.push(index.to_string());
                    current = parent;
                }
            }
        }
        segments.reverse();
        let mut token = String::new();
        for (i, segment) in segments.iter().enumerate() {
            if i != 0 {
                token.push(SEGMENT_SEPARATOR);
            }
            token.push_str(segment);
        }
        token
    }

    /// Registry/correlation token for an event bound at this path.
    pub fn event_token(&self, name: &str) -> String {
        let mut token = self.to_token();
        token.push(EVENT_SEPARATOR);
        token.push_str(name);
        token
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_serializes_empty() {
        assert_eq!(Path::root().to_token(), "");
    }

    #[test]
    fn segments_join_with_unit_separator() {
        let path = Path::root().index(0).key("row-3").index(2);
        assert_eq!(path.to_token(), "0\u{1F}row-3\u{1F}2");
    }

    #[test]
    fn event_token_uses_distinct_separator() {
        let path = Path::root().index(0).key("save");
        assert_eq!(path.event_token("click"), "0\u{1F}save\u{1E}click");
    }

    #[test]
    fn add_picks_key_over_index() {
        let keyed = Path::root().add(4, "k");
        let positional = Path::root().add(4, "");
        assert_eq!(keyed.to_token(), "k");
        assert_eq!(positional.to_token(), "4");
    }

    #[test]
    fn paths_compare_structurally() {
        let a = Path::root().index(1).key("x");
        let b = Path::root().index(1).key("x");
        assert_eq!(a, b);
        assert_ne!(a, Path::root().index(2).key("x"));
    }
}
