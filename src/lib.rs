//! # heddle
//!
//! UI-state reconciliation core. Given two snapshots of a declarative tree,
//! compute the minimal edits transforming a live rendering of the first into
//! a rendering of the second, and manage the registration and timed dispatch
//! of the interaction handlers attached to that tree.
//!
//! The pieces, bottom up:
//! - [`pmap`]: persistent hash-trie map with structural sharing, the
//!   backbone of keyed-children lookup and the handler registry.
//! - [`vdom`]: tree/attribute model, path addressing, the keyed diff engine,
//!   and the event registry.
//! - [`reconcile`]: the live-tree state machine applying patches through a
//!   narrow host capability trait, plus debounce/throttle dispatch timing.
//!
//! A render cycle: render `state -> Node`, then
//! `diff(previous, next, reconciler.events())`, then
//! [`Reconciler::apply`](reconcile::Reconciler::apply).

pub use pmap;
pub use reconcile;
pub use vdom;

pub use reconcile::{Dispatch, Host, NodeRef, Reconciler};
pub use vdom::{diff, Diff, Events, Node, Patch, Path};
