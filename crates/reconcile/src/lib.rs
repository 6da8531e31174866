//! # reconcile
//!
//! Applies diff patches from `vdom` to a live host tree and owns the timed
//! dispatch of user interactions (debounce/throttle).
//!
//! The live tree is shadowed 1:1 by a metadata arena so paths, anchors, and
//! timer tables never require scanning host state. Host platform primitives
//! are reached exclusively through the [`Host`] capability trait.
//!
//! Render-cycle shape:
//!
//! ```ignore
//! let mut reconciler = Reconciler::new(my_host, mount_point);
//! let mut tree = view(&state);
//! reconciler.mount(&tree);
//!
//! loop {
//!     // ...messages fold into state...
//!     let next = view(&state);
//!     reconciler.apply(vdom::diff(&tree, &next, reconciler.events()));
//!     tree = next;
//! }
//! ```

mod host;
mod meta;
mod reconciler;
mod timing;

pub use crate::host::Host;
pub use crate::meta::NodeRef;
pub use crate::reconciler::{Dispatch, Reconciler};
