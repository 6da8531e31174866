//! Attribute model and canonicalization.
//!
//! Attribute lists on a node are canonical: sorted, with empty entries
//! dropped and duplicate names resolved. The diff engine relies on this so a
//! single two-pointer walk can compare lists.
//!
//! Canonical form:
//! - Entries are ordered non-events first, then events, each group sorted by
//!   name. The sort is stable, so source order decides between duplicates.
//! - Empty-name entries and string attributes with empty values are dropped.
//! - Duplicate `class`/`style` attributes merge (space / `;` separated);
//!   for any other duplicate the later entry in source order wins.

use crate::events::Decoder;
use serde_json::Value;

#[derive(Clone, Debug)]
pub enum Attribute<Msg> {
    /// String attribute applied to the host node's attribute set.
    Attribute { name: String, value: String },
    /// Value assigned directly to the host node, bypassing string attribute
    /// semantics.
    Property { name: String, value: Value },
    /// Interaction binding: decodes a native payload into a message, plus
    /// the dispatch policy for that event name.
    Event {
        name: String,
        handler: Decoder<Msg>,
        prevent_default: bool,
        stop_propagation: bool,
        immediate: bool,
        debounce: u64,
        throttle: u64,
        include: Vec<String>,
    },
}

pub fn attribute<Msg>(name: impl Into<String>, value: impl Into<String>) -> Attribute<Msg> {
    Attribute::Attribute {
        name: name.into(),
        value: value.into(),
    }
}

pub fn property<Msg>(name: impl Into<String>, value: Value) -> Attribute<Msg> {
    Attribute::Property {
        name: name.into(),
        value,
    }
}

pub fn class<Msg>(value: impl Into<String>) -> Attribute<Msg> {
    attribute("class", value)
}

pub fn style<Msg>(value: impl Into<String>) -> Attribute<Msg> {
    attribute("style", value)
}

/// Binds `handler` to `name`. Text-entry events dispatch immediately by
/// default so the caret never visibly desyncs from application state.
pub fn on<Msg>(name: impl Into<String>, handler: Decoder<Msg>) -> Attribute<Msg> {
    let name = name.into();
    let immediate = matches!(name.as_str(), "input" | "change");
    Attribute::Event {
        name,
        handler,
        prevent_default: false,
        stop_propagation: false,
        immediate,
        debounce: 0,
        throttle: 0,
        include: Vec::new(),
    }
}

impl<Msg> Attribute<Msg> {
    pub fn name(&self) -> &str {
        match self {
            Attribute::Attribute { name, .. }
            | Attribute::Property { name, .. }
            | Attribute::Event { name, .. } => name,
        }
    }

    pub fn is_event(&self) -> bool {
        matches!(self, Attribute::Event { .. })
    }

    pub fn prevent_default(mut self) -> Self {
        if let Attribute::Event { prevent_default, .. } = &mut self {
            *prevent_default = true;
        }
        self
    }

    pub fn stop_propagation(mut self) -> Self {
        if let Attribute::Event { stop_propagation, .. } = &mut self {
            *stop_propagation = true;
        }
        self
    }

    pub fn immediate(mut self, value: bool) -> Self {
        if let Attribute::Event { immediate, .. } = &mut self {
            *immediate = value;
        }
        self
    }

    /// Delay dispatch until `ms` elapse with no further occurrence; the final
    /// occurrence's payload wins.
    pub fn debounce(mut self, ms: u64) -> Self {
        if let Attribute::Event { debounce, .. } = &mut self {
            *debounce = ms;
        }
        self
    }

    /// Dispatch the first occurrence, then drop further occurrences until
    /// `ms` elapse.
    pub fn throttle(mut self, ms: u64) -> Self {
        if let Attribute::Event { throttle, .. } = &mut self {
            *throttle = ms;
        }
        self
    }

    /// Sub-fields of the native payload a transport should forward.
    pub fn include(mut self, fields: Vec<String>) -> Self {
        if let Attribute::Event { include, .. } = &mut self {
            *include = fields;
        }
        self
    }

    /// Sort rank: non-events before events, then by name.
    fn rank(&self) -> (u8, &str) {
        let group = if self.is_event() { 1 } else { 0 };
        (group, self.name())
    }
}

/// Canonicalizes an attribute list. Constructors call this; the diff engine
/// assumes its output.
pub fn prepare<Msg>(attributes: Vec<Attribute<Msg>>) -> Vec<Attribute<Msg>> {
    let mut attributes: Vec<Attribute<Msg>> = attributes
        .into_iter()
        .filter(|attr| !attr.name().is_empty())
        .filter(|attr| match attr {
            Attribute::Attribute { value, .. } => !value.is_empty(),
            Attribute::Property { .. } | Attribute::Event { .. } => true,
        })
        .collect();
    attributes.sort_by(|a, b| a.rank().cmp(&b.rank()));

    let mut canonical: Vec<Attribute<Msg>> = Vec::with_capacity(attributes.len());
    for attr in attributes {
        let Some(last) = canonical.last_mut() else {
            canonical.push(attr);
            continue;
        };
        if last.is_event() != attr.is_event() || last.name() != attr.name() {
            canonical.push(attr);
            continue;
        }
        match (last, attr) {
            (
                Attribute::Attribute { name, value: merged },
                Attribute::Attribute { value, .. },
            ) if name.as_str() == "class" => {
                merged.push(' ');
                merged.push_str(&value);
            }
            (
                Attribute::Attribute { name, value: merged },
                Attribute::Attribute { value, .. },
            ) if name.as_str() == "style" => {
                if !merged.ends_with(';') {
                    merged.push(';');
                }
                merged.push_str(&value);
            }
            (last, attr) => *last = attr,
        }
    }
    canonical
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names<Msg>(attrs: &[Attribute<Msg>]) -> Vec<&str> {
        attrs.iter().map(Attribute::name).collect()
    }

    #[test]
    fn prepare_sorts_by_name_with_events_last() {
        let attrs: Vec<Attribute<()>> = prepare(vec![
            on("click", Decoder::succeed(())),
            attribute("id", "x"),
            attribute("class", "a"),
        ]);
        assert_eq!(names(&attrs), vec!["class", "id", "click"]);
    }

    #[test]
    fn prepare_drops_empty_entries() {
        let attrs: Vec<Attribute<()>> = prepare(vec![
            attribute("", "x"),
            attribute("title", ""),
            attribute("id", "kept"),
        ]);
        assert_eq!(names(&attrs), vec!["id"]);
    }

    #[test]
    fn duplicate_classes_merge_in_source_order() {
        let attrs: Vec<Attribute<()>> =
            prepare(vec![class("card"), attribute("id", "x"), class("active")]);
        match &attrs[0] {
            Attribute::Attribute { name, value } => {
                assert_eq!(name, "class");
                assert_eq!(value, "card active");
            }
            other => panic!("expected class attribute, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_styles_merge_with_separator() {
        let attrs: Vec<Attribute<()>> =
            prepare(vec![style("color: red"), style("margin: 0")]);
        match &attrs[0] {
            Attribute::Attribute { value, .. } => assert_eq!(value, "color: red;margin: 0"),
            other => panic!("expected style attribute, got {other:?}"),
        }
    }

    #[test]
    fn later_duplicate_wins_for_plain_attributes() {
        let attrs: Vec<Attribute<()>> =
            prepare(vec![attribute("id", "first"), attribute("id", "second")]);
        assert_eq!(attrs.len(), 1);
        match &attrs[0] {
            Attribute::Attribute { value, .. } => assert_eq!(value, "second"),
            other => panic!("expected attribute, got {other:?}"),
        }
    }

    #[test]
    fn properties_and_events_may_share_a_name() {
        let attrs: Vec<Attribute<()>> = prepare(vec![
            property("scroll", json!(1)),
            on("scroll", Decoder::succeed(())),
        ]);
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn event_policy_builders_only_touch_events() {
        let event: Attribute<()> = on("input", Decoder::succeed(()))
            .debounce(250)
            .prevent_default();
        match event {
            Attribute::Event {
                debounce,
                prevent_default,
                immediate,
                ..
            } => {
                assert_eq!(debounce, 250);
                assert!(prevent_default);
                assert!(immediate, "input events default to immediate dispatch");
            }
            other => panic!("expected event, got {other:?}"),
        }

        let plain: Attribute<()> = attribute("id", "x").debounce(250);
        assert!(matches!(plain, Attribute::Attribute { .. }));
    }
}
