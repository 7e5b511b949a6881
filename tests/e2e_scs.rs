//! End-to-end integration tests for the SCs template language.
//!
//! Tests compile-and-search through `Graph::search_scs`, type declarations,
//! attributes, optional sentences and error reporting.

use pretty_assertions::assert_eq;
use semgraph::{ElementHandle, ElementStore, Error, Graph, GraphConfig, MemoryStore, TemplateParams, Type};

// ============================================================================
// Helper: a family with a parent relation.
//
//   concept_person ──▶ alice, bob, carol
//   alice ==nrel_parent==> bob
//   concept_set ──▶ team (a class node)
// ============================================================================

struct Family {
    graph: Graph<MemoryStore>,
    alice: ElementHandle,
    bob: ElementHandle,
    carol: ElementHandle,
}

fn family() -> Family {
    let graph = Graph::open_memory(GraphConfig::default()).unwrap();
    let person = graph.resolve_keynode_or_create("concept_person", Type::NODE_CONST_CLASS).unwrap();
    let parent = graph.resolve_keynode_or_create("nrel_parent", Type::NODE_CONST_NOROLE).unwrap();

    let db = graph.store();
    let alice = db.create_node(Type::NODE_CONST).unwrap();
    let bob = db.create_node(Type::NODE_CONST).unwrap();
    let carol = db.create_node(Type::NODE_CONST).unwrap();
    for p in [alice, bob, carol] {
        db.create_edge(Type::EDGE_ACCESS_CONST_POS_PERM, person, p).unwrap();
    }
    let arc = db.create_edge(Type::EDGE_DCOMMON_CONST, alice, bob).unwrap();
    db.create_edge(Type::EDGE_ACCESS_CONST_POS_PERM, parent, arc).unwrap();

    Family { graph, alice, bob, carol }
}

fn sorted(rows: &semgraph::ResultSet, alias: &str) -> Vec<ElementHandle> {
    let mut v: Vec<ElementHandle> = rows.iter().filter_map(|r| r.get(alias)).collect();
    v.sort();
    v
}

// ============================================================================
// 1. Search through SCs
// ============================================================================

#[test]
fn test_search_scs_members() {
    let f = family();
    let rows = f.graph.search_scs("concept_person -> _p;;").unwrap();
    let mut expected = vec![f.alice, f.bob, f.carol];
    expected.sort();
    assert_eq!(sorted(&rows, "_p"), expected);
}

#[test]
fn test_search_scs_attribute() {
    let f = family();
    let rows = f.graph.search_scs("_child <= nrel_parent: _parent;;").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("_parent"), Some(f.alice));
    assert_eq!(rows[0].get("_child"), Some(f.bob));
}

#[test]
fn test_search_scs_optional_sentence() {
    let f = family();
    let text = "
        concept_person -> _p;;
        // parents are optional
        ? _p => nrel_parent:: _child;;
    ";
    let rows = f.graph.search_scs(text).unwrap();
    assert_eq!(rows.len(), 3);
    for row in &rows {
        let expected = if row.get("_p") == Some(f.alice) { Some(f.bob) } else { None };
        assert_eq!(row.get("_child"), expected);
    }
}

#[test]
fn test_type_declaration_narrows_matches() {
    let f = family();
    let person = f.graph.resolve_keynode("concept_person").unwrap();
    let link = f.graph.store().create_link(Type::LINK_CONST).unwrap();
    f.graph.store().create_edge(Type::EDGE_ACCESS_CONST_POS_PERM, person, link).unwrap();

    let rows = f.graph.search_scs("concept_person -> _p;; sc_link -> _p;;").unwrap();
    assert_eq!(sorted(&rows, "_p"), vec![link]);

    let rows = f.graph.search_scs("concept_person -> _p;;").unwrap();
    assert_eq!(rows.len(), 3);
}

#[test]
fn test_scs_template_feeds_generate() {
    let f = family();
    let t = f.graph.parse_scs("concept_person -> _p;; _p => nrel_parent: _kid;;").unwrap();
    assert_eq!(f.graph.search(&t).unwrap().len(), 1);

    let rows = f.graph.generate(&t, &TemplateParams::new().with("_p", f.carol)).unwrap();
    assert_eq!(rows[0].get("_p"), Some(f.carol));
    let kid = rows[0].get("_kid").unwrap();

    let found = f.graph.search(&t).unwrap();
    assert!(found.iter().any(|r| r.get("_p") == Some(f.carol) && r.get("_kid") == Some(kid)));
}

// ============================================================================
// 2. Errors
// ============================================================================

#[test]
fn test_unknown_keynode_reported() {
    let f = family();
    let err = f.graph.search_scs("concept_missing -> _x;;").unwrap_err();
    assert!(matches!(err, Error::KeynodeNotFound(ref name) if name == "concept_missing"));
}

#[test]
fn test_syntax_error_position() {
    let f = family();
    // Missing target before the sentence end.
    let err = f.graph.search_scs("concept_person -> ;;").unwrap_err();
    assert!(matches!(err, Error::SyntaxError { position: 18, .. }));

    // Single ';' is not a sentence end.
    assert!(matches!(f.graph.search_scs("concept_person -> _x;"), Err(Error::SyntaxError { .. })));

    // Unterminated sentence.
    assert!(matches!(f.graph.search_scs("concept_person -> _x"), Err(Error::SyntaxError { .. })));
}

#[test]
fn test_empty_text_is_empty_template() {
    let f = family();
    let rows = f.graph.search_scs("  /* nothing */  ").unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_empty());
}
