//! Deterministic markup serialization of a tree snapshot.
//!
//! Not a patch-transport format: intended for snapshot comparisons in tests,
//! debugging output, and server-side callers that need a full document.
//! Output is deterministic because attribute lists are canonical.

use crate::attribute::Attribute;
use crate::node::Node;
use serde_json::Value;
use std::fmt::Write;

/// Serialization options in the spirit of a snapshot config.
#[derive(Clone, Copy, Debug, Default)]
pub struct RenderOptions {
    /// Emit `data-key` attributes for keyed nodes, which makes snapshot
    /// diffs in tests point at the right row.
    pub include_keys: bool,
}

pub fn render<Msg>(node: &Node<Msg>) -> String {
    render_with(node, &RenderOptions::default())
}

pub fn render_with<Msg>(node: &Node<Msg>, options: &RenderOptions) -> String {
    let mut out = String::new();
    write_node(&mut out, node, options);
    out
}

fn write_node<Msg>(out: &mut String, node: &Node<Msg>, options: &RenderOptions) {
    match node {
        Node::Fragment { children, .. } => {
            for child in children {
                write_node(out, child, options);
            }
        }
        Node::Element {
            key,
            tag,
            attributes,
            children,
            self_closing,
            void,
            ..
        } => {
            write_open_tag(out, tag, key, attributes, options);
            if *void {
                out.push('>');
                return;
            }
            if *self_closing && children.is_empty() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in children {
                write_node(out, child, options);
            }
            let _ = write!(out, "</{tag}>");
        }
        Node::Text { content, .. } => {
            out.push_str(&escape_text(content));
        }
        Node::Raw {
            key,
            tag,
            attributes,
            markup,
            ..
        } => {
            write_open_tag(out, tag, key, attributes, options);
            out.push('>');
            // Verbatim by contract.
            out.push_str(markup);
            let _ = write!(out, "</{tag}>");
        }
    }
}

fn write_open_tag<Msg>(
    out: &mut String,
    tag: &str,
    key: &str,
    attributes: &[Attribute<Msg>],
    options: &RenderOptions,
) {
    let _ = write!(out, "<{tag}");
    if options.include_keys && !key.is_empty() {
        let _ = write!(out, r#" data-key="{}""#, escape_attribute(key));
    }
    for attribute in attributes {
        match attribute {
            Attribute::Attribute { name, value } => {
                let _ = write!(out, r#" {name}="{}""#, escape_attribute(value));
            }
            Attribute::Property { name, value } => match value {
                Value::Bool(true) => {
                    let _ = write!(out, " {name}");
                }
                Value::Bool(false) | Value::Null => {}
                Value::String(s) => {
                    let _ = write!(out, r#" {name}="{}""#, escape_attribute(s));
                }
                other => {
                    let _ = write!(out, r#" {name}="{}""#, escape_attribute(&other.to_string()));
                }
            },
            Attribute::Event { .. } => {}
        }
    }
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
