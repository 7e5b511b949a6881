//! # Property-Based Tests
//!
//! Invariants of search and generate checked over random graphs.

use std::collections::HashSet;

use proptest::collection::vec;
use proptest::prelude::*;
use semgraph::{
    ElementHandle, ElementStore, EventConfig, DispatchMode, Graph, GraphConfig, MemoryStore, Template,
    TemplateItem, TemplateParams, Type,
};

fn graph() -> Graph<MemoryStore> {
    let config = GraphConfig {
        events: EventConfig { mode: DispatchMode::Inline, ..EventConfig::default() },
        ..GraphConfig::default()
    };
    Graph::open_memory(config).expect("open")
}

/// `n` const nodes and one common arc per `(from, to)` pair with `from != to`.
fn random_graph(n: usize, pairs: &[(usize, usize)]) -> (Graph<MemoryStore>, Vec<ElementHandle>, Vec<(usize, usize)>) {
    let g = graph();
    let nodes: Vec<ElementHandle> =
        (0..n).map(|_| g.store().create_node(Type::NODE_CONST).expect("node")).collect();
    let arcs: Vec<(usize, usize)> = pairs.iter().map(|&(a, b)| (a % n, b % n)).filter(|(a, b)| a != b).collect();
    for &(a, b) in &arcs {
        g.store().create_edge(Type::EDGE_DCOMMON_CONST, nodes[a], nodes[b]).expect("edge");
    }
    (g, nodes, arcs)
}

/// `_a =(_e1)=> _x ; _x =(_e2)=> _b`
fn path2() -> Template {
    let mut t = Template::new();
    t.triple(
        TemplateItem::var_as(Type::NODE_VAR, "_a"),
        TemplateItem::var_as(Type::EDGE_DCOMMON_VAR, "_e1"),
        TemplateItem::var_as(Type::NODE_VAR, "_x"),
    )
    .expect("triple");
    t.triple(
        "_x",
        TemplateItem::var_as(Type::EDGE_DCOMMON_VAR, "_e2"),
        TemplateItem::var_as(Type::NODE_VAR, "_b"),
    )
    .expect("triple");
    t
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Every row of a two-step path binds connected elements, and the number
    /// of rows equals the number of arc pairs meeting at a middle node.
    #[test]
    fn alias_bindings_are_consistent(n in 2usize..8, pairs in vec((0usize..8, 0usize..8), 0..20)) {
        let (g, nodes, arcs) = random_graph(n, &pairs);
        let rows = g.search(&path2()).expect("search");

        for row in &rows {
            let (a, x, b) = (row.get("_a").expect("_a"), row.get("_x").expect("_x"), row.get("_b").expect("_b"));
            let (e1, e2) = (row.get("_e1").expect("_e1"), row.get("_e2").expect("_e2"));
            prop_assert_ne!(e1, e2);
            let ends1 = g.store().edge_ends(e1).expect("ends");
            let ends2 = g.store().edge_ends(e2).expect("ends");
            prop_assert_eq!((ends1.source, ends1.target), (a, x));
            prop_assert_eq!((ends2.source, ends2.target), (x, b));
        }

        let expected: usize = (0..nodes.len())
            .map(|m| {
                let incoming = arcs.iter().filter(|(_, to)| *to == m).count();
                let outgoing = arcs.iter().filter(|(from, _)| *from == m).count();
                incoming * outgoing
            })
            .sum();
        prop_assert_eq!(rows.len(), expected);
    }

    /// After deleting nodes, no row mentions a deleted element and every
    /// surviving arc is still found.
    #[test]
    fn deleted_elements_never_appear(
        n in 2usize..8,
        pairs in vec((0usize..8, 0usize..8), 0..20),
        doomed in vec(0usize..8, 0..4),
    ) {
        let (g, nodes, arcs) = random_graph(n, &pairs);
        let doomed: HashSet<usize> = doomed.into_iter().map(|i| i % n).collect();
        for &i in &doomed {
            g.store().delete_element(nodes[i]);
        }

        let mut t = Template::new();
        t.triple(
            TemplateItem::var_as(Type::NODE_VAR, "_a"),
            TemplateItem::var_as(Type::EDGE_DCOMMON_VAR, "_e"),
            TemplateItem::var_as(Type::NODE_VAR, "_b"),
        )
        .expect("triple");
        let rows = g.search(&t).expect("search");

        let dead: HashSet<ElementHandle> = doomed.iter().map(|&i| nodes[i]).collect();
        for row in &rows {
            for h in row.handles() {
                prop_assert!(!dead.contains(&h));
                prop_assert!(g.store().is_element(h));
            }
        }
        let surviving = arcs.iter().filter(|(a, b)| !doomed.contains(a) && !doomed.contains(b)).count();
        prop_assert_eq!(rows.len(), surviving);
    }

    /// Each generate call adds exactly one new match of its own template.
    #[test]
    fn generate_is_not_idempotent(calls in 1usize..6) {
        let g = graph();
        let class = g.store().create_node(Type::NODE_CONST_CLASS).expect("class");
        let mut t = Template::new();
        t.triple(class, Type::EDGE_ACCESS_VAR_POS_PERM, TemplateItem::var_as(Type::NODE_VAR, "_x"))
            .expect("triple");

        for i in 1..=calls {
            g.generate(&t, &TemplateParams::new()).expect("generate");
            prop_assert_eq!(g.search(&t).expect("search").len(), i);
        }
    }

    /// Handles and type tags travel as raw integers.
    #[test]
    fn raw_integer_wire_form(raw in 1u32..=u32::MAX, bits in any::<u16>()) {
        let handle = ElementHandle(raw);
        let json = serde_json::to_string(&handle).expect("serialize");
        prop_assert_eq!(&json, &raw.to_string());
        prop_assert_eq!(serde_json::from_str::<ElementHandle>(&json).expect("deserialize"), handle);

        let ty = Type::from_bits(bits);
        let json = serde_json::to_string(&ty).expect("serialize");
        prop_assert_eq!(&json, &bits.to_string());
        prop_assert_eq!(serde_json::from_str::<Type>(&json).expect("deserialize"), ty);
    }

    /// A composed tag is matched by both of its inputs.
    #[test]
    fn compose_preserves_both_sides(a in any::<u16>(), b in any::<u16>()) {
        let (a, b) = (Type::from_bits(a), Type::from_bits(b));
        if let Ok(c) = a.compose(b) {
            prop_assert!(a.matches(c));
            prop_assert!(b.matches(c));
        }
    }
}
