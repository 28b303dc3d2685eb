use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use flowtree::tree::FlowTree;
use serde_json::Value;
use flowtree::{
    Document, FlowConfig, FlowError, KindMeta, KindRegistration, NodeRecord, ROOT_ID, TreeView,
    parse_records,
};

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|err| panic!("fixture {name}: {err}"))
}

fn load(name: &str) -> Document {
    let mut doc = Document::new();
    doc.from_json_str(&fixture(name)).expect("fixture loads");
    doc
}

fn assert_consistent(doc: &Document) {
    let origin = doc.origin();
    for node in doc.all_nodes() {
        let key = doc.key_of(node.id()).unwrap();
        let children = origin.children(key);
        assert_eq!(
            origin.index().sibling_chain(key),
            children.to_vec(),
            "{}: children disagree with the next chain",
            node.id()
        );
        for child in children {
            assert_eq!(origin.parent(*child), Some(key));
        }
        if key == origin.root() {
            assert_eq!(origin.parent(key), None);
        } else {
            assert!(origin.parent(key).is_some(), "{} has no parent", node.id());
        }
    }
}

const SCENARIO_LISTING: &str = "root
|-- start_0
|-- split_0
|---- $icon$split_0
|---- $container$split_0
|------ block_0
|------ block_1
|-- end_0";

#[test]
fn scenario_listing() {
    let doc = load("scenario.json");
    assert_eq!(doc.to_listing(TreeView::Origin, false).unwrap(), SCENARIO_LISTING);
    assert_eq!(doc.node_count(), 8);
    assert_consistent(&doc);
}

#[test]
fn json5_input_matches_json_input() {
    let strict = load("scenario.json");
    let relaxed = load("scenario.json5");
    assert_eq!(
        relaxed.to_listing(TreeView::Origin, true).unwrap(),
        strict.to_listing(TreeView::Origin, true).unwrap()
    );
}

#[test]
fn removing_the_split_relinks_its_neighbours() {
    let mut doc = load("scenario.json");
    doc.remove_node("split_0").unwrap();
    assert_eq!(
        doc.to_listing(TreeView::Origin, false).unwrap(),
        "root\n|-- start_0\n|-- end_0"
    );
    assert_eq!(doc.node_count(), 3);
    let start = doc.key_of("start_0").unwrap();
    let end = doc.key_of("end_0").unwrap();
    assert_eq!(doc.origin().next(start), Some(end));
    assert_eq!(doc.origin().prev(end), Some(start));
    for gone in ["split_0", "$icon$split_0", "$container$split_0", "block_0", "block_1"] {
        assert!(doc.node(gone).is_none(), "{gone} survived");
    }
    assert_consistent(&doc);
}

#[test]
fn add_after_start_lands_before_the_split() {
    let mut doc = load("scenario.json");
    let key = doc.add_after("start_0", NodeRecord::new("block_2")).unwrap();
    assert_eq!(doc.origin().prev(key), doc.key_of("start_0"));
    assert_eq!(doc.origin().next(key), doc.key_of("split_0"));
    assert_eq!(
        doc.origin_children(ROOT_ID).unwrap(),
        vec!["start_0", "block_2", "split_0", "end_0"]
    );
    assert_consistent(&doc);
}

#[test]
fn moving_a_repeated_id_moves_it_once() {
    let mut doc = load("scenario.json");
    doc.move_nodes(&["end_0", "end_0"], "block_0", 0).unwrap();
    assert_eq!(doc.origin_children("block_0").unwrap(), vec!["end_0"]);
    assert_eq!(doc.origin_children(ROOT_ID).unwrap(), vec!["start_0", "split_0"]);
    assert_eq!(doc.node_count(), 8);
    assert_consistent(&doc);

    doc.remove_node("block_0").unwrap();
    assert!(doc.node("end_0").is_none());
    assert_consistent(&doc);
}

#[test]
fn round_trip_reproduces_the_declared_tree() {
    let doc = load("scenario.json");
    let exported = serde_json::to_value(doc.to_json().unwrap()).unwrap();
    let declared: serde_json::Value = serde_json::from_str(&fixture("scenario.json")).unwrap();
    assert_eq!(exported, declared);

    let relaxed = load("scenario.json5");
    assert_eq!(serde_json::to_value(relaxed.to_json().unwrap()).unwrap(), declared);
}

#[test]
fn reload_preserves_identity_and_ui_state() {
    let mut doc = load("scenario.json");
    let before: Vec<(String, flowtree::NodeKey)> = doc
        .all_nodes()
        .map(|node| (node.id().to_string(), doc.key_of(node.id()).unwrap()))
        .collect();
    doc.node_mut("block_0")
        .unwrap()
        .ui_state
        .insert("selected".into(), Value::Bool(true));

    doc.from_json_str(&fixture("appended.json")).unwrap();

    for (id, key) in &before {
        assert_eq!(doc.key_of(id), Some(*key), "{id} was recreated");
    }
    assert_eq!(
        doc.node("block_0").unwrap().ui_state.get("selected"),
        Some(&Value::Bool(true))
    );
    assert_eq!(doc.all_nodes().last().map(|node| node.id()), Some("block_2"));
    assert_eq!(doc.node_count(), before.len() + 1);
    assert_eq!(doc.origin_children("block_1").unwrap(), vec!["block_2"]);
}

#[test]
fn reloading_the_same_tree_is_silent() {
    let mut doc = load("scenario.json");
    let version = doc.origin().version();
    let fired = Rc::new(Cell::new(0));
    let counter = fired.clone();
    doc.on_tree_change(move |_| counter.set(counter.get() + 1));
    doc.from_json_str(&fixture("scenario.json")).unwrap();
    assert_eq!(doc.origin().version(), version);
    assert_eq!(fired.get(), 0);
}

#[test]
fn loads_and_batches_notify_once() {
    let mut doc = Document::new();
    let fired = Rc::new(Cell::new(0));
    let counter = fired.clone();
    let listener = doc.on_tree_change(move |_| counter.set(counter.get() + 1));

    doc.from_json_str(&fixture("scenario.json")).unwrap();
    assert_eq!(fired.get(), 1);

    {
        let mut batch = doc.batch().unwrap();
        batch.add_node(NodeRecord::new("a"), None, None).unwrap();
        batch.add_node(NodeRecord::new("b"), Some("a"), None).unwrap();
        batch.remove_node("end_0").unwrap();
        batch.from_json_str(&fixture("appended.json")).unwrap();
        assert!(matches!(batch.batch(), Err(FlowError::BatchActive)));
        assert_eq!(fired.get(), 1);
    }
    assert_eq!(fired.get(), 2);

    doc.remove_node("block_2").unwrap();
    assert_eq!(fired.get(), 3);
    assert!(doc.off_tree_change(listener));
    doc.remove_node("end_0").unwrap();
    assert_eq!(fired.get(), 3);
}

#[test]
fn collapse_hides_everything_but_the_marker() {
    let mut doc = load("scenario.json");
    assert!(doc.set_collapsed("split_0", true).unwrap());
    doc.refresh().unwrap();
    assert_eq!(doc.render_children("split_0").unwrap(), vec!["$icon$split_0"]);
    assert_eq!(doc.origin_children("split_0").unwrap().len(), 2);
    assert!(doc.bounds("block_0").unwrap().is_none());
    assert!(doc.bounds("$icon$split_0").unwrap().is_some());
    assert_eq!(
        doc.to_listing(TreeView::Render, false).unwrap(),
        "root\n|-- start_0\n|-- split_0\n|---- $icon$split_0\n|-- end_0"
    );

    assert!(doc.set_collapsed("split_0", false).unwrap());
    doc.refresh().unwrap();
    assert_eq!(doc.render_children("split_0").unwrap().len(), 2);
    assert!(doc.bounds("block_0").unwrap().is_some());
}

#[test]
fn collapsing_a_node_without_marker_hides_all_children() {
    let mut doc = load("appended.json");
    doc.set_collapsed("block_1", true).unwrap();
    doc.update_render().unwrap();
    assert!(doc.render_children("block_1").unwrap().is_empty());
    assert_eq!(doc.origin_children("block_1").unwrap(), vec!["block_2"]);
}

#[test]
fn default_collapsed_kinds_start_collapsed() {
    let mut doc = Document::new();
    doc.register_kind(KindRegistration::new("group").meta(KindMeta {
        is_container: Some(true),
        default_collapsed: Some(true),
        ..Default::default()
    }))
    .unwrap();
    doc.from_json_str(r#"[{"id": "g", "kind": "group", "children": ["a", "b"]}]"#)
        .unwrap();
    assert!(doc.is_collapsed("g").unwrap());
    doc.refresh().unwrap();
    assert!(doc.render_children("g").unwrap().is_empty());
}

#[test]
fn branch_refinement_straightens_dead_branches() {
    let mut doc = load("dead_branch.json");
    doc.set_refine_branches(true);
    doc.refresh().unwrap();
    assert_eq!(doc.render_children("block_1").unwrap(), vec!["block_2", "end_0"]);
    assert_eq!(doc.render_children(ROOT_ID).unwrap(), vec!["start_0", "split_0"]);
    assert_eq!(
        doc.origin_children(ROOT_ID).unwrap(),
        vec!["start_0", "split_0", "block_2", "end_0"]
    );

    doc.set_refine_branches(false);
    doc.refresh().unwrap();
    assert!(doc.render_children("block_1").unwrap().is_empty());
}

#[test]
fn collapsed_splits_keep_their_followers_visible() {
    let mut doc = load("dead_branch.json");
    doc.set_refine_branches(true);
    doc.set_collapsed("split_0", true).unwrap();
    doc.refresh().unwrap();
    assert_eq!(
        doc.render_children(ROOT_ID).unwrap(),
        vec!["start_0", "split_0", "block_2", "end_0"]
    );
    assert_eq!(doc.render_children("split_0").unwrap(), vec!["$icon$split_0"]);
    assert!(doc.bounds("block_2").unwrap().is_some());
    assert!(doc.bounds("end_0").unwrap().is_some());

    doc.set_collapsed("split_0", false).unwrap();
    doc.set_collapsed("block_1", true).unwrap();
    doc.refresh().unwrap();
    assert_eq!(
        doc.render_children(ROOT_ID).unwrap(),
        vec!["start_0", "split_0", "block_2", "end_0"]
    );
    assert!(doc.bounds("end_0").unwrap().is_some());

    doc.set_collapsed("block_1", false).unwrap();
    doc.refresh().unwrap();
    assert_eq!(doc.render_children("block_1").unwrap(), vec!["block_2", "end_0"]);
}

#[test]
fn strict_kinds_reject_unknown_kinds() {
    let config = FlowConfig {
        strict_kinds: true,
        ..Default::default()
    };
    let mut doc = Document::with_config(config).unwrap();
    let err = doc
        .from_json_str(r#"[{"id": "x", "kind": "custom"}]"#)
        .unwrap_err();
    assert!(matches!(err, FlowError::UnknownKind(kind) if kind == "custom"));

    let mut lenient = Document::new();
    lenient
        .from_json_str(r#"[{"id": "x", "kind": "custom"}]"#)
        .unwrap();
    assert_eq!(lenient.node("x").unwrap().kind(), "custom");
}

#[test]
fn invalid_input_is_a_json_error() {
    let mut doc = Document::new();
    assert!(matches!(doc.from_json_str("{not json"), Err(FlowError::Json(_))));
    assert!(parse_records(r#"[{"kind": "start"}]"#).is_err());
}

#[test]
fn disposed_documents_refuse_work() {
    let mut doc = load("scenario.json");
    doc.dispose();
    assert!(doc.is_disposed());
    assert!(matches!(doc.to_json(), Err(FlowError::Disposed)));
    assert!(matches!(doc.to_listing(TreeView::Origin, false), Err(FlowError::Disposed)));
    assert!(matches!(doc.refresh(), Err(FlowError::Disposed)));
    assert!(matches!(
        doc.from_json_str(&fixture("scenario.json")),
        Err(FlowError::Disposed)
    ));
    assert!(matches!(doc.bounds("start_0"), Err(FlowError::Disposed)));
    assert!(doc.node("start_0").is_none());
}
