//! # vdom
//!
//! Declarative UI tree model with a keyed diff engine and an event registry.
//!
//! An external render step produces a new [`Node`] tree; [`diff`] compares it
//! against the previous tree and the live [`Events`] registry, yielding a
//! [`Patch`] plus the updated registry. Applying the patch to a live tree is
//! the reconciler's job (a separate crate); this crate never touches host
//! state.
//!
//! Message types are plain values: `Msg: Clone + 'static` throughout.

pub mod attribute;
pub mod diff;
pub mod events;
pub mod node;
pub mod patch;
pub mod path;
pub mod render;

pub use crate::attribute::{attribute, class, on, property, style, Attribute};
pub use crate::diff::{diff, Diff};
pub use crate::events::{
    on_check, on_click, on_input, DecodeError, Decoder, Dispatched, DispatchPolicy, Events,
    HandlerError,
};
pub use crate::node::{
    element, element_ns, fragment, is_void_element, keyed, raw, text, Mapper, Node,
};
pub use crate::patch::{Change, Patch};
pub use crate::path::{Path, EVENT_SEPARATOR, SEGMENT_SEPARATOR};
pub use crate::render::{render, render_with, RenderOptions};
