//! Event registry and payload decoding.
//!
//! The registry maps `path ⊕ event-name` tokens to handler descriptors and
//! tracks which paths dispatched in the previous and current cycles. It is a
//! value: every operation returns a new registry sharing structure with the
//! old one, so the diff engine can thread it alongside the patch it builds.
//!
//! A handler never executes application logic; it only decodes a native
//! payload into a message for the caller to act on.

use crate::attribute::Attribute;
use crate::node::{Mapper, Node};
use crate::path::Path;
use pmap::Map;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// A native payload did not have the shape a decoder expected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("expected {expected}, found {found}")]
pub struct DecodeError {
    pub expected: String,
    pub found: String,
}

impl DecodeError {
    pub fn new(expected: impl Into<String>, found: &Value) -> Self {
        Self {
            expected: expected.into(),
            found: describe(found),
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "a bool".to_string(),
        Value::Number(_) => "a number".to_string(),
        Value::String(_) => "a string".to_string(),
        Value::Array(_) => "an array".to_string(),
        Value::Object(_) => "an object".to_string(),
    }
}

/// Why a dispatch produced no message.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Nothing is bound at that path and event name. Benign: the binding may
    /// have been unregistered while the native event was in flight.
    #[error("no handler registered for this path and event")]
    NotFound,
    #[error("payload decode failed: {0}")]
    Decode(#[from] DecodeError),
}

/// Decodes a native interaction payload into an application message.
pub struct Decoder<Msg>(Rc<dyn Fn(&Value) -> Result<Msg, DecodeError>>);

impl<Msg> Decoder<Msg> {
    pub fn new(f: impl Fn(&Value) -> Result<Msg, DecodeError> + 'static) -> Self {
        Decoder(Rc::new(f))
    }

    /// Ignores the payload and always produces `msg`.
    pub fn succeed(msg: Msg) -> Self
    where
        Msg: Clone + 'static,
    {
        Decoder(Rc::new(move |_| Ok(msg.clone())))
    }

    pub fn run(&self, payload: &Value) -> Result<Msg, DecodeError> {
        (self.0)(payload)
    }
}

impl<Msg> Clone for Decoder<Msg> {
    fn clone(&self) -> Self {
        Decoder(Rc::clone(&self.0))
    }
}

impl<Msg> fmt::Debug for Decoder<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Decoder")
    }
}

/// Dispatch policy of one event binding, minus the decoder itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchPolicy {
    pub prevent_default: bool,
    pub stop_propagation: bool,
    pub immediate: bool,
    pub debounce: u64,
    pub throttle: u64,
    /// Payload sub-fields a transport should forward with the event.
    pub include: Vec<String>,
}

/// A successfully decoded interaction, ready for the dispatch sink.
#[derive(Clone, Debug)]
pub struct Dispatched<Msg> {
    pub message: Msg,
    pub immediate: bool,
    pub prevent_default: bool,
    pub stop_propagation: bool,
}

#[derive(Clone, Debug)]
struct RegisteredHandler<Msg> {
    decoder: Decoder<Msg>,
    mapper: Mapper<Msg>,
    policy: DispatchPolicy,
}

/// Handler registry plus dispatched-path tracking for controlled-element
/// decisions.
#[derive(Clone, Debug)]
pub struct Events<Msg> {
    handlers: Map<String, RegisteredHandler<Msg>>,
    /// Paths that dispatched during the previous completed cycle.
    dispatched_last: Map<String, ()>,
    /// Paths that dispatched during the in-flight cycle.
    dispatched_next: Map<String, ()>,
}

impl<Msg> Default for Events<Msg> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Msg> Events<Msg> {
    pub fn new() -> Self {
        Self {
            handlers: Map::new(),
            dispatched_last: Map::new(),
            dispatched_next: Map::new(),
        }
    }
}

impl<Msg: Clone + 'static> Events<Msg> {
    /// Starts a new cycle: the in-flight dispatched set becomes the previous
    /// one. Called once at the start of every diff.
    pub fn tick(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
            dispatched_last: self.dispatched_next.clone(),
            dispatched_next: Map::new(),
        }
    }

    /// Registers the binding described by an event attribute at `path`.
    /// Non-event attributes are ignored.
    pub fn add_binding(
        &self,
        path: &Path,
        attribute: &Attribute<Msg>,
        mapper: &Mapper<Msg>,
    ) -> Self {
        let Attribute::Event {
            name,
            handler,
            prevent_default,
            stop_propagation,
            immediate,
            debounce,
            throttle,
            include,
        } = attribute
        else {
            return self.clone();
        };
        let registered = RegisteredHandler {
            decoder: handler.clone(),
            mapper: mapper.clone(),
            policy: DispatchPolicy {
                prevent_default: *prevent_default,
                stop_propagation: *stop_propagation,
                immediate: *immediate,
                debounce: *debounce,
                throttle: *throttle,
                include: include.clone(),
            },
        };
        Self {
            handlers: self.handlers.set(path.event_token(name), registered),
            dispatched_last: self.dispatched_last.clone(),
            dispatched_next: self.dispatched_next.clone(),
        }
    }

    pub fn remove_binding(&self, path: &Path, name: &str) -> Self {
        Self {
            handlers: self.handlers.delete(&path.event_token(name)),
            dispatched_last: self.dispatched_last.clone(),
            dispatched_next: self.dispatched_next.clone(),
        }
    }

    /// Registers every binding in the subtree rooted at `node`, whose own
    /// path is `path`. `mapper` is the scope chain inherited from ancestors.
    pub fn register_subtree(&self, mapper: &Mapper<Msg>, path: &Path, node: &Node<Msg>) -> Self {
        let mapper = mapper.compose(node.mapper());
        let mut events = self.clone();
        for attribute in node.attributes() {
            events = events.add_binding(path, attribute, &mapper);
        }
        for (index, child) in node.children().iter().enumerate() {
            let child_path = path.add(index, child.key());
            events = events.register_subtree(&mapper, &child_path, child);
        }
        events
    }

    /// Releases every binding in the subtree rooted at `node`, registered
    /// when the node's path was `path`.
    pub fn release_subtree(&self, path: &Path, node: &Node<Msg>) -> Self {
        let mut events = self.clone();
        for attribute in node.attributes() {
            if attribute.is_event() {
                events = events.remove_binding(path, attribute.name());
            }
        }
        for (index, child) in node.children().iter().enumerate() {
            let child_path = path.add(index, child.key());
            events = events.release_subtree(&child_path, child);
        }
        events
    }

    /// Looks up the binding at `path ⊕ name`, decodes `payload`, and marks
    /// the path as dispatched for this cycle. A registry miss is a benign
    /// [`HandlerError::NotFound`]; a payload mismatch surfaces as
    /// [`HandlerError::Decode`]. Neither panics.
    pub fn handle(
        &self,
        path: &Path,
        name: &str,
        payload: &Value,
    ) -> (Self, Result<Dispatched<Msg>, HandlerError>) {
        let token = path.event_token(name);
        let Some(handler) = self.handlers.get(&token) else {
            return (self.clone(), Err(HandlerError::NotFound));
        };
        let result = handler
            .decoder
            .run(payload)
            .map(|message| Dispatched {
                message: handler.mapper.apply(message),
                immediate: handler.policy.immediate,
                prevent_default: handler.policy.prevent_default,
                stop_propagation: handler.policy.stop_propagation,
            })
            .map_err(HandlerError::Decode);
        let next = Self {
            handlers: self.handlers.clone(),
            dispatched_last: self.dispatched_last.clone(),
            dispatched_next: self.dispatched_next.set(path.to_token(), ()),
        };
        (next, result)
    }

    /// Did `path` dispatch during the previous completed cycle? Feeds the
    /// controlled-element decision in the diff engine.
    pub fn has_dispatched(&self, path: &Path) -> bool {
        self.dispatched_last.has(&path.to_token())
    }

    pub fn policy(&self, path: &Path, name: &str) -> Option<&DispatchPolicy> {
        self.handlers
            .get(&path.event_token(name))
            .map(|handler| &handler.policy)
    }

    pub fn has_handler(&self, path: &Path, name: &str) -> bool {
        self.handlers.has(&path.event_token(name))
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Small combinators for reading typed fields out of native payloads.
pub mod decoders {
    use super::DecodeError;
    use serde_json::Value;

    /// Walks `steps` through nested objects.
    pub fn value_at<'a>(payload: &'a Value, steps: &[&str]) -> Result<&'a Value, DecodeError> {
        let mut current = payload;
        for step in steps {
            current = current
                .get(step)
                .ok_or_else(|| DecodeError::new(format!("field `{}`", steps.join(".")), payload))?;
        }
        Ok(current)
    }

    pub fn string_at(payload: &Value, steps: &[&str]) -> Result<String, DecodeError> {
        let value = value_at(payload, steps)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DecodeError::new(format!("string at `{}`", steps.join(".")), value))
    }

    pub fn bool_at(payload: &Value, steps: &[&str]) -> Result<bool, DecodeError> {
        let value = value_at(payload, steps)?;
        value
            .as_bool()
            .ok_or_else(|| DecodeError::new(format!("bool at `{}`", steps.join(".")), value))
    }

    /// `event.target.value` of an input-like element.
    pub fn target_value(payload: &Value) -> Result<String, DecodeError> {
        string_at(payload, &["target", "value"])
    }

    /// `event.target.checked` of a checkbox-like element.
    pub fn target_checked(payload: &Value) -> Result<bool, DecodeError> {
        bool_at(payload, &["target", "checked"])
    }
}

/// Click binding dispatching a fixed message.
pub fn on_click<Msg: Clone + 'static>(msg: Msg) -> Attribute<Msg> {
    crate::attribute::on("click", Decoder::succeed(msg))
}

/// Input binding dispatching the target's current value.
pub fn on_input<Msg: Clone + 'static>(to_msg: impl Fn(String) -> Msg + 'static) -> Attribute<Msg> {
    crate::attribute::on(
        "input",
        Decoder::new(move |payload| decoders::target_value(payload).map(&to_msg)),
    )
}

/// Change binding dispatching the target's checked state.
pub fn on_check<Msg: Clone + 'static>(to_msg: impl Fn(bool) -> Msg + 'static) -> Attribute<Msg> {
    crate::attribute::on(
        "change",
        Decoder::new(move |payload| decoders::target_checked(payload).map(&to_msg)),
    )
}
