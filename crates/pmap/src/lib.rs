//! # pmap
//!
//! Immutable key/value map with structural sharing.
//!
//! `set` and `delete` never mutate the receiver; they return a new map that
//! shares every unaffected subtree with the original, so keeping old versions
//! around is cheap and reads of an old version stay valid while a newer one
//! is being built. Operations are amortized O(log32 n).
//!
//! ## Example
//!
//! ```
//! use pmap::Map;
//!
//! let a: Map<String, u32> = Map::new();
//! let b = a.set("projects".to_string(), 3);
//! let c = b.set("tasks".to_string(), 7);
//!
//! assert_eq!(a.len(), 0);
//! assert_eq!(b.get(&"tasks".to_string()), None);
//! assert_eq!(c.get(&"tasks".to_string()), Some(&7));
//! ```

mod map;

pub use map::{Iter, Map};
