//! Templates compiled from structures stored in the graph.
//!
//! A structure is a node whose members are the targets of its const positive
//! permanent access arcs. Every member edge becomes one triple:
//!
//! - a `var` element becomes a typed alias, named by its system identifier
//!   when it has one and `_<raw handle>` otherwise;
//! - any other element is used as a fixed handle.
//!
//! Edges whose end is another member edge are placed after that edge, so
//! generating the template creates an edge before anything hangs on it.
//! Members that are not edges only appear as ends.

use hashbrown::{HashMap, HashSet};

use crate::keynodes::system_identifier_of;
use crate::model::{ElementHandle, Type};
use crate::storage::ElementStore;
use crate::{Error, Result};

use super::{Template, TemplateItem, TemplateParams};

impl Template {
    /// Compile the member edges of `structure` into a template.
    ///
    /// Aliases named in `params` are fixed to the given handles, which must
    /// satisfy the alias's constraint.
    pub fn from_structure<S>(store: &S, structure: ElementHandle, params: &TemplateParams) -> Result<Template>
    where
        S: ElementStore + ?Sized,
    {
        store.element_type(structure)?;
        let members = members(store, structure)?;
        let edges = ordered_edges(store, &members)?;

        let mut builder = Builder { store, params, declared: HashMap::new() };
        let mut template = Template::new();
        for edge in &edges {
            let ends = store.edge_ends(*edge)?;
            let source = builder.item(ends.source)?;
            let edge_item = builder.item(*edge)?;
            let target = builder.item(ends.target)?;
            template.triple(source, edge_item, target)?;
        }

        for (name, _) in params.iter() {
            if !template.has_alias(name) {
                return Err(Error::MalformedTemplate(format!(
                    "parameter for unknown alias '{name}' in structure {structure}"
                )));
            }
        }
        tracing::debug!(%structure, members = members.len(), triples = template.len(), "template built from structure");
        Ok(template)
    }
}

/// Members of `structure` in arc order, without repeats.
fn members<S: ElementStore + ?Sized>(store: &S, structure: ElementHandle) -> Result<Vec<ElementHandle>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for arc in store.outgoing(structure)? {
        if !Type::EDGE_ACCESS_CONST_POS_PERM.matches(store.element_type(arc)?) {
            continue;
        }
        let ends = store.edge_ends(arc)?;
        if ends.source == structure && seen.insert(ends.target) {
            out.push(ends.target);
        }
    }
    Ok(out)
}

/// Member edges by dependence depth, then handle.
///
/// An edge between plain elements has depth 0; an edge with a member edge at
/// one of its ends is one deeper than the deepest such end.
fn ordered_edges<S: ElementStore + ?Sized>(store: &S, members: &[ElementHandle]) -> Result<Vec<ElementHandle>> {
    let mut ends = HashMap::new();
    for &el in members {
        if store.element_type(el)?.is_edge() {
            let e = store.edge_ends(el)?;
            ends.insert(el, [e.source, e.target]);
        }
    }

    let mut depth: HashMap<ElementHandle, usize> = HashMap::new();
    for &root in ends.keys() {
        let mut stack = vec![root];
        let mut open = HashSet::new();
        while let Some(&edge) = stack.last() {
            if depth.contains_key(&edge) {
                stack.pop();
                continue;
            }
            open.insert(edge);
            let pending: Vec<ElementHandle> = ends[&edge]
                .iter()
                .copied()
                .filter(|end| ends.contains_key(end) && !depth.contains_key(end))
                .collect();
            if pending.is_empty() {
                let d = ends[&edge]
                    .iter()
                    .filter_map(|end| depth.get(end).map(|d| d + 1))
                    .max()
                    .unwrap_or(0);
                depth.insert(edge, d);
                open.remove(&edge);
                stack.pop();
                continue;
            }
            for end in pending {
                if open.contains(&end) {
                    return Err(Error::MalformedTemplate(format!("edge {end} depends on itself")));
                }
                stack.push(end);
            }
        }
    }

    let mut edges: Vec<ElementHandle> = ends.keys().copied().collect();
    edges.sort_by_key(|e| (depth.get(e).copied().unwrap_or(0), *e));
    Ok(edges)
}

struct Builder<'a, S: ?Sized> {
    store: &'a S,
    params: &'a TemplateParams,
    /// Variables already declared, by handle.
    declared: HashMap<ElementHandle, String>,
}

impl<S: ElementStore + ?Sized> Builder<'_, S> {
    fn item(&mut self, el: ElementHandle) -> Result<TemplateItem> {
        if let Some(name) = self.declared.get(&el) {
            return Ok(TemplateItem::alias(name.clone()));
        }
        let ty = self.store.element_type(el)?;
        if !ty.is_var() {
            return Ok(TemplateItem::fixed(el));
        }

        let name = system_identifier_of(self.store, el)?.unwrap_or_else(|| format!("_{}", el.0));
        self.declared.insert(el, name.clone());
        let Some(value) = self.params.get(&name) else {
            return Ok(TemplateItem::var_as(ty, name));
        };

        let actual = self.store.element_type(value)?;
        if !ty.to_const().matches(actual) {
            return Err(Error::TypeConflict {
                left: ty,
                right: actual,
                message: format!("parameter {value} for alias '{name}' violates its constraint"),
            });
        }
        Ok(TemplateItem::fixed_as(value, name))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keynodes::KeynodeCache;
    use crate::storage::MemoryStore;
    use crate::template::Slot;

    fn include(db: &MemoryStore, structure: ElementHandle, els: &[ElementHandle]) {
        for &el in els {
            db.create_edge(Type::EDGE_ACCESS_CONST_POS_PERM, structure, el).unwrap();
        }
    }

    #[test]
    fn test_const_and_var_items() {
        let db = MemoryStore::new();
        let class = db.create_node(Type::NODE_CONST_CLASS).unwrap();
        let x = db.create_node(Type::NODE_VAR).unwrap();
        let arc = db.create_edge(Type::EDGE_ACCESS_VAR_POS_PERM, class, x).unwrap();
        KeynodeCache::new().set_system_identifier(&db, x, "_member").unwrap();

        let s = db.create_node(Type::NODE_CONST_STRUCT).unwrap();
        include(&db, s, &[class, arc, x]);

        let t = Template::from_structure(&db, s, &TemplateParams::new()).unwrap();
        assert_eq!(t.len(), 1);
        let triple = &t.triples()[0];
        assert_eq!(triple.item(Slot::Source), &TemplateItem::fixed(class));
        assert_eq!(triple.item(Slot::Edge), &TemplateItem::var_as(Type::EDGE_ACCESS_VAR_POS_PERM, format!("_{}", arc.0)));
        assert_eq!(triple.item(Slot::Target), &TemplateItem::var_as(Type::NODE_VAR, "_member"));
    }

    #[test]
    fn test_edge_of_edge_comes_after_its_edge() {
        let db = MemoryStore::new();
        let rel = db.create_node(Type::NODE_CONST_NOROLE).unwrap();
        let a = db.create_node(Type::NODE_VAR).unwrap();
        let b = db.create_node(Type::NODE_VAR).unwrap();
        let d = db.create_edge(Type::EDGE_DCOMMON_VAR, a, b).unwrap();
        let attr = db.create_edge(Type::EDGE_ACCESS_VAR_POS_PERM, rel, d).unwrap();
        let meta = db.create_edge(Type::EDGE_ACCESS_VAR_POS_PERM, rel, attr).unwrap();

        let s = db.create_node(Type::NODE_CONST_STRUCT).unwrap();
        // Membership order is the reverse of dependence order.
        include(&db, s, &[meta, attr, d, rel, a, b]);

        assert_eq!(ordered_edges(&db, &members(&db, s).unwrap()).unwrap(), vec![d, attr, meta]);
        let t = Template::from_structure(&db, s, &TemplateParams::new()).unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.triples()[1].item(Slot::Target), &TemplateItem::alias(format!("_{}", d.0)));
        assert_eq!(t.triples()[2].item(Slot::Target), &TemplateItem::alias(format!("_{}", attr.0)));
    }

    #[test]
    fn test_params_fix_aliases() {
        let db = MemoryStore::new();
        let class = db.create_node(Type::NODE_CONST_CLASS).unwrap();
        let x = db.create_node(Type::NODE_VAR).unwrap();
        let arc = db.create_edge(Type::EDGE_ACCESS_VAR_POS_PERM, class, x).unwrap();
        let s = db.create_node(Type::NODE_CONST_STRUCT).unwrap();
        include(&db, s, &[class, arc, x]);
        let alias = format!("_{}", x.0);

        let node = db.create_node(Type::NODE_CONST).unwrap();
        let t = Template::from_structure(&db, s, &TemplateParams::new().with(alias.clone(), node)).unwrap();
        assert_eq!(t.triples()[0].item(Slot::Target), &TemplateItem::fixed_as(node, alias.clone()));

        let link = db.create_link(Type::LINK_CONST).unwrap();
        let err = Template::from_structure(&db, s, &TemplateParams::new().with(alias, link)).unwrap_err();
        assert!(matches!(err, Error::TypeConflict { .. }));

        let err = Template::from_structure(&db, s, &TemplateParams::new().with("_nope", node)).unwrap_err();
        assert!(matches!(err, Error::MalformedTemplate(_)));
    }

    #[test]
    fn test_missing_or_empty_structure() {
        let db = MemoryStore::new();
        assert!(matches!(
            Template::from_structure(&db, ElementHandle(77), &TemplateParams::new()),
            Err(Error::InvalidHandle(_))
        ));
        let s = db.create_node(Type::NODE_CONST_STRUCT).unwrap();
        assert!(Template::from_structure(&db, s, &TemplateParams::new()).unwrap().is_empty());
    }
}
