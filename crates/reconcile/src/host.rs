//! Host capability trait: the narrow surface the reconciler drives.
//!
//! The reconciler owns *what* changes; a host owns the actual platform
//! primitives. All operations are synchronous and infallible from the
//! reconciler's point of view; a host that can fail must absorb the failure
//! itself.
//!
//! # Integration Pattern
//!
//! Listener registration hands the host a [`NodeRef`](crate::NodeRef). When
//! the native event fires, the host routes it back through
//! [`Reconciler::dispatch`](crate::Reconciler::dispatch) with that ref, the
//! event name, and the decoded-to-JSON native payload:
//!
//! ```ignore
//! fn on_native_event(reconciler: &mut Reconciler<MyHost, Msg>, target: NodeRef) {
//!     match reconciler.dispatch(target, "click", &payload, now_ms()) {
//!         Dispatch::Message(m) => queue.push(m),
//!         _ => {}
//!     }
//! }
//! ```

use crate::meta::NodeRef;
use serde_json::Value;

pub trait Host {
    /// Opaque handle to one live host node. Cheap to clone.
    type Handle: Clone;

    fn create_element(&mut self, namespace: &str, tag: &str) -> Self::Handle;

    fn create_text(&mut self, content: &str) -> Self::Handle;

    /// Anchor node for a fragment; it has no visual representation.
    fn create_fragment_marker(&mut self) -> Self::Handle;

    /// Insert `node` into `parent` before `reference`; append when `None`.
    fn insert_before(
        &mut self,
        parent: &Self::Handle,
        node: &Self::Handle,
        reference: Option<&Self::Handle>,
    );

    /// Relocate an existing `node` (listeners and state intact) before
    /// `reference`. Hosts without a native move can fall back to
    /// [`insert_before`](Host::insert_before).
    fn move_before(
        &mut self,
        parent: &Self::Handle,
        node: &Self::Handle,
        reference: Option<&Self::Handle>,
    );

    fn remove_child(&mut self, parent: &Self::Handle, node: &Self::Handle);

    fn get_attribute(&mut self, node: &Self::Handle, name: &str) -> Option<String>;

    fn set_attribute(&mut self, node: &Self::Handle, name: &str, value: &str);

    fn remove_attribute(&mut self, node: &Self::Handle, name: &str);

    /// Assign a value directly on the node, bypassing string attribute
    /// semantics.
    fn set_property(&mut self, node: &Self::Handle, name: &str, value: &Value);

    /// Attach a native listener for `name`. The host must carry `target`
    /// back into [`Reconciler::dispatch`](crate::Reconciler::dispatch) when
    /// the event fires.
    fn add_event_listener(&mut self, node: &Self::Handle, target: NodeRef, name: &str);

    fn remove_event_listener(&mut self, node: &Self::Handle, name: &str);

    fn set_text(&mut self, node: &Self::Handle, content: &str);

    /// Replace the node's children with verbatim markup.
    fn set_raw_markup(&mut self, node: &Self::Handle, markup: &str);

    /// Push a text value through the live representation, not just the
    /// declarative attribute surface.
    fn sync_value(&mut self, node: &Self::Handle, value: &str) {
        self.set_property(node, "value", &Value::String(value.to_string()));
    }

    fn sync_checked(&mut self, node: &Self::Handle, checked: bool) {
        self.set_property(node, "checked", &Value::Bool(checked));
    }

    fn sync_selected(&mut self, node: &Self::Handle, selected: bool) {
        self.set_property(node, "selected", &Value::Bool(selected));
    }

    fn request_focus(&mut self, _node: &Self::Handle) {}
}
