//! Behavioral coverage for the diff engine: idempotence, keyed moves,
//! controlled elements, and registry bookkeeping across renders.

use serde_json::json;
use vdom::{
    attribute, class, diff, element, fragment, keyed, on_click, on_input, text, Change, Events,
    Node, Patch, Path,
};

#[derive(Clone, Debug, PartialEq)]
enum Msg {
    Clicked(&'static str),
    Typed(String),
}

fn app_tree() -> Node<Msg> {
    element(
        "div",
        vec![class("board")],
        vec![
            element("h1", vec![], vec![text("Projects")]),
            element(
                "ul",
                vec![],
                keyed(vec![
                    ("a", element("li", vec![on_click(Msg::Clicked("a"))], vec![text("alpha")])),
                    ("b", element("li", vec![on_click(Msg::Clicked("b"))], vec![text("beta")])),
                    ("c", element("li", vec![on_click(Msg::Clicked("c"))], vec![text("gamma")])),
                ]),
            ),
            element("input", vec![attribute("value", "draft"), on_input(Msg::Typed)], vec![]),
        ],
    )
}

fn collect_changes<Msg>(patch: &Patch<Msg>, out: &mut Vec<String>) {
    for change in &patch.changes {
        let label = match change {
            Change::ReplaceText { .. } => "replace-text",
            Change::ReplaceInnerHtml { .. } => "replace-inner-html",
            Change::Update { .. } => "update",
            Change::Move { .. } => "move",
            Change::Remove { .. } => "remove",
            Change::Replace { .. } => "replace",
            Change::Insert { .. } => "insert",
        };
        out.push(label.to_string());
    }
    for child in &patch.children {
        collect_changes(child, out);
    }
}

fn change_labels<Msg>(patch: &Patch<Msg>) -> Vec<String> {
    let mut out = Vec::new();
    collect_changes(patch, &mut out);
    out
}

#[test]
fn self_diff_is_empty() {
    let events = Events::new();
    let tree = app_tree();
    let result = diff(&tree, &app_tree(), &events);
    assert!(
        result.patch.is_empty(),
        "self diff produced {:?}",
        result.patch
    );
}

#[test]
fn text_change_emits_replace_text_not_replace() {
    let old: Node<Msg> = element("p", vec![], vec![text("before")]);
    let new: Node<Msg> = element("p", vec![], vec![text("after")]);
    let result = diff(&old, &new, &Events::new());
    assert_eq!(change_labels(&result.patch), vec!["replace-text"]);
}

#[test]
fn tag_change_promotes_to_replace() {
    let old: Node<Msg> = element("span", vec![], vec![]);
    let new: Node<Msg> = element("div", vec![], vec![]);
    let result = diff(&old, &new, &Events::new());
    assert_eq!(change_labels(&result.patch), vec!["replace"]);
}

#[test]
fn keyed_rotation_produces_only_moves() {
    let old: Node<Msg> = element(
        "ul",
        vec![],
        keyed(vec![
            ("a", element("li", vec![on_click(Msg::Clicked("a"))], vec![])),
            ("b", element("li", vec![on_click(Msg::Clicked("b"))], vec![])),
            ("c", element("li", vec![on_click(Msg::Clicked("c"))], vec![])),
        ]),
    );
    let new: Node<Msg> = element(
        "ul",
        vec![],
        keyed(vec![
            ("c", element("li", vec![on_click(Msg::Clicked("c"))], vec![])),
            ("a", element("li", vec![on_click(Msg::Clicked("a"))], vec![])),
            ("b", element("li", vec![on_click(Msg::Clicked("b"))], vec![])),
        ]),
    );

    let before = Events::new()
        .register_subtree(&vdom::Mapper::Identity, &Path::root().index(0), &old);
    let handler_count = before.handler_count();

    let result = diff(&old, &new, &before);
    let labels = change_labels(&result.patch);
    assert!(labels.iter().all(|l| l == "move"), "got {labels:?}");
    assert!(!labels.is_empty());

    // Handlers survive a pure reorder: same registrations, nothing dropped.
    assert_eq!(result.events.handler_count(), handler_count);
    let ul = Path::root().index(0);
    for key in ["a", "b", "c"] {
        assert!(result.events.has_handler(&ul.key(key), "click"));
    }
}

#[test]
fn keyed_removal_mid_list_emits_remove() {
    let make = |keys: &[&str]| -> Node<Msg> {
        element(
            "ul",
            vec![],
            keyed(
                keys.iter()
                    .map(|k| (k.to_string(), element("li", vec![], vec![])))
                    .collect(),
            ),
        )
    };
    let result = diff(&make(&["a", "b", "c"]), &make(&["a", "c"]), &Events::new());
    assert_eq!(change_labels(&result.patch), vec!["remove"]);
}

#[test]
fn new_keyed_head_emits_single_insert() {
    let make = |keys: &[&str]| -> Node<Msg> {
        element(
            "ul",
            vec![],
            keyed(
                keys.iter()
                    .map(|k| (k.to_string(), element("li", vec![], vec![])))
                    .collect(),
            ),
        )
    };
    let result = diff(&make(&["a", "b"]), &make(&["x", "a", "b"]), &Events::new());
    assert_eq!(change_labels(&result.patch), vec!["insert"]);
}

#[test]
fn appended_children_insert_as_one_batch() {
    let old: Node<Msg> = element("div", vec![], vec![text("a")]);
    let new: Node<Msg> = element("div", vec![], vec![text("a"), text("b"), text("c")]);
    let result = diff(&old, &new, &Events::new());

    let mut inserts = Vec::new();
    fn walk<Msg>(patch: &Patch<Msg>, out: &mut Vec<(usize, usize)>) {
        for change in &patch.changes {
            if let Change::Insert { nodes, before } = change {
                out.push((nodes.len(), *before));
            }
        }
        for child in &patch.children {
            walk(child, out);
        }
    }
    walk(&result.patch, &mut inserts);
    assert_eq!(inserts, vec![(2, 1)]);
}

#[test]
fn trailing_removals_use_the_removed_counter() {
    let old: Node<Msg> = element("div", vec![], vec![text("a"), text("b"), text("c")]);
    let new: Node<Msg> = element("div", vec![], vec![text("a")]);
    let result = diff(&old, &new, &Events::new());

    let child = &result.patch.children[0];
    assert_eq!(child.removed, 2);
    assert!(child.changes.is_empty());
}

#[test]
fn attribute_updates_carry_adds_and_removes() {
    let old: Node<Msg> = element(
        "div",
        vec![attribute("id", "x"), attribute("title", "old")],
        vec![],
    );
    let new: Node<Msg> = element(
        "div",
        vec![attribute("title", "new"), attribute("lang", "en")],
        vec![],
    );
    let result = diff(&old, &new, &Events::new());
    let child = &result.patch.children[0];
    let Some(Change::Update { added, removed }) = child.changes.first() else {
        panic!("expected update, got {:?}", child.changes);
    };
    let added_names: Vec<&str> = added.iter().map(|a| a.name()).collect();
    let removed_names: Vec<&str> = removed.iter().map(|a| a.name()).collect();
    assert_eq!(added_names, vec!["lang", "title"]);
    assert_eq!(removed_names, vec!["id"]);
}

#[test]
fn controlled_input_re_emits_identical_value() {
    let make = || -> Node<Msg> {
        element(
            "input",
            vec![attribute("value", "same"), on_input(Msg::Typed)],
            vec![],
        )
    };
    let tree = make();
    let path = Path::root().index(0);
    let events = Events::new().register_subtree(&vdom::Mapper::Identity, &path, &tree);

    // Without a prior dispatch, identical values produce no update at all.
    let silent = diff(&tree, &make(), &events);
    assert!(silent.patch.is_empty());

    // The user typed into the input during this cycle.
    let payload = json!({ "target": { "value": "typed" } });
    let (events, result) = events.handle(&path, "input", &payload);
    assert!(result.is_ok());

    // Now the path is controlled: the value must be forced through even
    // though old and new virtual values coincide.
    let forced = diff(&tree, &make(), &events);
    let child = &forced.patch.children[0];
    let Some(Change::Update { added, .. }) = child.changes.first() else {
        panic!("expected update, got {:?}", child.changes);
    };
    assert!(added.iter().any(|a| a.name() == "value"));
}

#[test]
fn uncontrolled_div_never_forces_values() {
    // Only input/select/textarea are controllable; a dispatching div is not.
    let make = || -> Node<Msg> {
        element(
            "div",
            vec![attribute("value", "same"), on_click(Msg::Clicked("d"))],
            vec![],
        )
    };
    let tree = make();
    let path = Path::root().index(0);
    let events = Events::new().register_subtree(&vdom::Mapper::Identity, &path, &tree);
    let (events, _) = events.handle(&path, "click", &json!({}));
    let result = diff(&tree, &make(), &events);
    assert!(result.patch.is_empty());
}

#[test]
fn replaced_subtree_swaps_handler_registrations() {
    let old: Node<Msg> = element(
        "div",
        vec![],
        vec![element("button", vec![on_click(Msg::Clicked("old"))], vec![])],
    );
    let new: Node<Msg> = element(
        "div",
        vec![],
        vec![element("a", vec![on_click(Msg::Clicked("new"))], vec![])],
    );
    let root = Path::root().index(0);
    let events = Events::new().register_subtree(&vdom::Mapper::Identity, &root, &old);
    assert_eq!(events.handler_count(), 1);

    let result = diff(&old, &new, &events);
    assert_eq!(change_labels(&result.patch), vec!["replace"]);
    assert_eq!(result.events.handler_count(), 1);

    let (_, dispatched) = result
        .events
        .handle(&root.index(0), "click", &json!({}));
    assert_eq!(dispatched.unwrap().message, Msg::Clicked("new"));
}

#[test]
fn removed_subtree_releases_handlers_recursively() {
    let old: Node<Msg> = element(
        "div",
        vec![],
        vec![element(
            "section",
            vec![on_click(Msg::Clicked("outer"))],
            vec![element("button", vec![on_click(Msg::Clicked("inner"))], vec![])],
        )],
    );
    let new: Node<Msg> = element("div", vec![], vec![]);
    let root = Path::root().index(0);
    let events = Events::new().register_subtree(&vdom::Mapper::Identity, &root, &old);
    assert_eq!(events.handler_count(), 2);

    let result = diff(&old, &new, &events);
    assert_eq!(result.events.handler_count(), 0);
    assert_eq!(result.patch.children[0].removed, 1);
}

#[test]
fn fragment_children_diff_in_place() {
    let old: Node<Msg> = element(
        "div",
        vec![],
        vec![fragment(vec![text("a"), text("b")]), text("tail")],
    );
    let new: Node<Msg> = element(
        "div",
        vec![],
        vec![fragment(vec![text("a"), text("B")]), text("tail")],
    );
    let result = diff(&old, &new, &Events::new());
    assert_eq!(change_labels(&result.patch), vec!["replace-text"]);

    // The change sits under div -> fragment -> text index 1.
    let div_patch = &result.patch.children[0];
    let frag_patch = &div_patch.children[0];
    assert_eq!(frag_patch.index, 0);
    assert_eq!(frag_patch.children[0].index, 1);
}

#[test]
fn keyless_shift_keeps_registry_paths_in_sync() {
    // A keyed head removal shifts the keyless button from index 1 to 0; its
    // handler must follow the path change.
    let old: Node<Msg> = element(
        "div",
        vec![],
        vec![
            element("p", vec![], vec![text("gone")]).with_key("p"),
            element("button", vec![on_click(Msg::Clicked("b"))], vec![]),
        ],
    );
    let new: Node<Msg> = element(
        "div",
        vec![],
        vec![element("button", vec![on_click(Msg::Clicked("b"))], vec![])],
    );
    let root = Path::root().index(0);
    let events = Events::new().register_subtree(&vdom::Mapper::Identity, &root, &old);
    assert!(events.has_handler(&root.index(1), "click"));

    let result = diff(&old, &new, &events);
    assert_eq!(result.events.handler_count(), 1);
    assert!(result.events.has_handler(&root.index(0), "click"));
    assert!(!result.events.has_handler(&root.index(1), "click"));
}

#[test]
fn diff_then_diff_back_round_trips_registry() {
    let a = app_tree();
    let b: Node<Msg> = element("div", vec![class("board")], vec![text("empty")]);

    let root = Path::root().index(0);
    let events = Events::new().register_subtree(&vdom::Mapper::Identity, &root, &a);
    let forward = diff(&a, &b, &events);
    assert_eq!(forward.events.handler_count(), 0);

    let back = diff(&b, &a, &forward.events);
    assert_eq!(back.events.handler_count(), events.handler_count());
}
