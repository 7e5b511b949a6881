//! End-to-end integration tests for template generation.
//!
//! Tests structure creation, parameters, round trip with search,
//! non-idempotence, rollback of failed calls and the events they report.

use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use semgraph::{
    ElementHandle, ElementStore, Error, EventKind, Graph, GraphConfig, LinkContent, MemoryStore, Template, TemplateItem,
    TemplateParams, Type,
};

fn graph() -> Graph<MemoryStore> {
    Graph::open_memory(GraphConfig::default()).unwrap()
}

/// `class --> _x ; _x ==(nrel_name)==> _name_link`
fn named_instance(class: ElementHandle, nrel_name: ElementHandle) -> Template {
    let mut t = Template::new();
    t.triple(class, Type::EDGE_ACCESS_VAR_POS_PERM, TemplateItem::var_as(Type::NODE_VAR, "_x"))
        .unwrap();
    t.quintuple(
        "_x",
        TemplateItem::var_as(Type::EDGE_DCOMMON_VAR, "_name_arc"),
        TemplateItem::var_as(Type::LINK_VAR, "_name_link"),
        Type::EDGE_ACCESS_VAR_POS_PERM,
        nrel_name,
    )
    .unwrap();
    t
}

// ============================================================================
// 1. Shape of generated structure
// ============================================================================

#[test]
fn test_generate_creates_const_elements() {
    let g = graph();
    let class = g.resolve_keynode_or_create("concept_person", Type::NODE_CONST_CLASS).unwrap();
    let nrel = g.resolve_keynode_or_create("nrel_name", Type::NODE_CONST_NOROLE).unwrap();

    let rows = g.generate(&named_instance(class, nrel), &TemplateParams::new()).unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];

    let db = g.store();
    let x = row.get("_x").unwrap();
    let link = row.get("_name_link").unwrap();
    let arc = row.get("_name_arc").unwrap();
    assert_eq!(db.element_type(x).unwrap(), Type::NODE_CONST);
    assert_eq!(db.element_type(link).unwrap(), Type::LINK_CONST);
    assert_eq!(db.element_type(arc).unwrap(), Type::EDGE_DCOMMON_CONST);
    assert!(g.check_edge(class, x, Type::EDGE_ACCESS_CONST_POS_PERM).unwrap());
    assert!(g.check_edge(nrel, arc, Type::EDGE_ACCESS_CONST_POS_PERM).unwrap());

    db.set_link_content(link, "Ada".into()).unwrap();
    assert_eq!(db.find_links_by_content(&LinkContent::from("Ada")), vec![link]);
}

// ============================================================================
// 2. Round trip and non-idempotence
// ============================================================================

#[test]
fn test_search_finds_generated_row() {
    let g = graph();
    let class = g.resolve_keynode_or_create("concept_person", Type::NODE_CONST_CLASS).unwrap();
    let nrel = g.resolve_keynode_or_create("nrel_name", Type::NODE_CONST_NOROLE).unwrap();
    let t = named_instance(class, nrel);

    let generated = g.generate(&t, &TemplateParams::new()).unwrap();
    let found = g.search(&t).unwrap();
    assert!(found.contains(&generated[0]));
}

#[test]
fn test_generate_twice_creates_two_structures() {
    let g = graph();
    let class = g.resolve_keynode_or_create("concept_person", Type::NODE_CONST_CLASS).unwrap();
    let nrel = g.resolve_keynode_or_create("nrel_name", Type::NODE_CONST_NOROLE).unwrap();
    let t = named_instance(class, nrel);

    assert_eq!(g.search(&t).unwrap().len(), 0);
    let first = g.generate(&t, &TemplateParams::new()).unwrap();
    assert_eq!(g.search(&t).unwrap().len(), 1);
    let second = g.generate(&t, &TemplateParams::new()).unwrap();
    assert_eq!(g.search(&t).unwrap().len(), 2);

    for alias in ["_x", "_name_arc", "_name_link"] {
        assert_ne!(first[0].get(alias), second[0].get(alias));
    }
}

// ============================================================================
// 3. Parameters
// ============================================================================

#[test]
fn test_params_reuse_existing_element() {
    let g = graph();
    let class = g.resolve_keynode_or_create("concept_person", Type::NODE_CONST_CLASS).unwrap();
    let nrel = g.resolve_keynode_or_create("nrel_name", Type::NODE_CONST_NOROLE).unwrap();
    let ada = g.store().create_node(Type::NODE_CONST).unwrap();

    let params: TemplateParams = [("_x", ada)].into_iter().collect();
    let rows = g.generate(&named_instance(class, nrel), &params).unwrap();
    assert_eq!(rows[0].get("_x"), Some(ada));
    assert!(g.check_edge(class, ada, Type::EDGE_ACCESS_CONST_POS_PERM).unwrap());
}

#[test]
fn test_param_type_violation_fails_whole_call() {
    let g = graph();
    let class = g.resolve_keynode_or_create("concept_person", Type::NODE_CONST_CLASS).unwrap();
    let nrel = g.resolve_keynode_or_create("nrel_name", Type::NODE_CONST_NOROLE).unwrap();
    let not_a_link = g.store().create_node(Type::NODE_CONST).unwrap();
    let before = g.store().element_count();

    let params = TemplateParams::new().with("_name_link", not_a_link);
    let err = g.generate(&named_instance(class, nrel), &params).unwrap_err();
    assert!(matches!(err, Error::TypeConflict { .. }));
    assert_eq!(g.store().element_count(), before);
}

// ============================================================================
// 4. Rollback
// ============================================================================

#[test]
fn test_failure_mid_template_rolls_back() {
    let g = graph();
    let db = g.store();
    let class = db.create_node(Type::NODE_CONST_CLASS).unwrap();
    let before = db.element_count();

    // The third triple needs a sort-less variable created; the first two
    // have already created elements by then.
    let mut t = Template::new();
    t.triple(class, Type::EDGE_ACCESS_VAR_POS_PERM, TemplateItem::var_as(Type::NODE_VAR, "_x")).unwrap();
    t.triple("_x", Type::EDGE_DCOMMON_VAR, TemplateItem::var_as(Type::NODE_VAR, "_y")).unwrap();
    t.triple("_y", Type::EDGE_DCOMMON_VAR, TemplateItem::var_as(Type::VAR, "_z")).unwrap();

    let err = g.generate(&t, &TemplateParams::new()).unwrap_err();
    assert!(matches!(err, Error::MalformedTemplate(_)));
    assert_eq!(db.element_count(), before);
    assert!(db.outgoing(class).unwrap().is_empty());
}

#[test]
fn test_missing_fixed_element() {
    let g = graph();
    let mut t = Template::new();
    t.triple(ElementHandle(424_242), Type::EDGE_ACCESS_VAR_POS_PERM, Type::NODE_VAR).unwrap();
    assert!(matches!(g.generate(&t, &TemplateParams::new()), Err(Error::InvalidHandle(_))));
    assert_eq!(g.store().element_count(), 0);
}

// ============================================================================
// 5. Optional triples are materialized
// ============================================================================

#[test]
fn test_optional_triples_are_generated() {
    let g = graph();
    let class = g.store().create_node(Type::NODE_CONST_CLASS).unwrap();
    let mut t = Template::new();
    t.triple(class, Type::EDGE_ACCESS_VAR_POS_PERM, TemplateItem::var_as(Type::NODE_VAR, "_x")).unwrap();
    t.triple(TemplateItem::var_as(Type::NODE_VAR, "_o"), Type::EDGE_DCOMMON_VAR, "_x")
        .unwrap()
        .optional();

    let rows = g.generate(&t, &TemplateParams::new()).unwrap();
    assert!(rows[0].get("_o").is_some());
    assert_eq!(g.store().element_count(), 5);
}

// ============================================================================
// 6. Events of a failed call are never delivered
// ============================================================================

#[test]
fn test_failed_generate_emits_no_events() {
    let g = graph();
    let class = g.store().create_node(Type::NODE_CONST_CLASS).unwrap();

    let added = Arc::new(Mutex::new(Vec::new()));
    for kind in [EventKind::OutgoingArcAdded, EventKind::OutgoingArcRemoved] {
        let seen = Arc::clone(&added);
        g.subscribe(class, kind, move |e| seen.lock().push((e.kind, e.edge))).unwrap();
    }

    let mut t = Template::new();
    t.triple(class, Type::EDGE_ACCESS_VAR_POS_PERM, TemplateItem::var_as(Type::NODE_VAR, "_x")).unwrap();
    t.triple("_x", Type::EDGE_DCOMMON_VAR, TemplateItem::var_as(Type::VAR, "_z")).unwrap();
    assert!(g.generate(&t, &TemplateParams::new()).is_err());
    g.flush_events().unwrap();
    assert!(added.lock().is_empty());

    let mut t = Template::new();
    t.triple(class, TemplateItem::var_as(Type::EDGE_ACCESS_VAR_POS_PERM, "_e"), Type::NODE_VAR).unwrap();
    let rows = g.generate(&t, &TemplateParams::new()).unwrap();
    g.flush_events().unwrap();
    assert_eq!(*added.lock(), vec![(EventKind::OutgoingArcAdded, rows[0].get("_e").unwrap())]);
}
