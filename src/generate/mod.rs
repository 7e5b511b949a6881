//! # Generate Engine
//!
//! Materializes a [`Template`] in the store. Triples are processed in
//! declaration order, optional ones included:
//!
//! - an end that resolves (fixed handle, parameter, or alias bound by an
//!   earlier triple) is used as is;
//! - an unbound end is created from the const form of its constraint, which
//!   must name the node or link sort;
//! - an unbound edge is created between the resolved ends; a fixed or bound
//!   edge is checked to connect them and reused.
//!
//! Every call creates fresh elements, so generating twice yields two
//! structures. A failing call deletes whatever it created, newest first.
//!
//! The calling thread's mutation events are held for the whole call:
//! a successful call delivers them once it is done, a failing one drops
//! them together with its rollback.

use std::sync::Arc;

use crate::model::{ElementHandle, Type};
use crate::storage::ElementStore;
use crate::template::{ResultRow, ResultSet, Slot, Template, TemplateParams, TemplateTriple, Term};
use crate::{Error, Result};

/// Generate `template` with the aliases in `params` pre-bound.
pub fn generate<S>(store: &S, template: &Template, params: &TemplateParams) -> Result<ResultSet>
where
    S: ElementStore + ?Sized,
{
    let hold = EventHold::open(store);
    let mut generator = Generator::new(store, template);
    let outcome = generator.prepare(params).and_then(|_| {
        for triple in template.triples() {
            generator.triple(triple)?;
        }
        Ok(())
    });

    if let Err(e) = outcome {
        if !generator.created.is_empty() {
            tracing::warn!(error = %e, created = generator.created.len(), "generate failed, rolling back");
            generator.rollback();
        }
        return Err(e);
    }
    hold.deliver();

    tracing::debug!(triples = template.len(), created = generator.created.len(), "generate finished");
    let layout = template.aliases().layout();
    let row = ResultRow::from_bindings(Arc::clone(&layout), &generator.bindings, generator.positions);
    Ok(ResultSet::new(layout, vec![row]))
}

/// Holds the store's events until delivered; dropping it discards them.
struct EventHold<'a, S: ElementStore + ?Sized> {
    store: &'a S,
    deliver: bool,
}

impl<'a, S: ElementStore + ?Sized> EventHold<'a, S> {
    fn open(store: &'a S) -> Self {
        store.hold_events();
        Self { store, deliver: false }
    }

    fn deliver(mut self) {
        self.deliver = true;
    }
}

impl<S: ElementStore + ?Sized> Drop for EventHold<'_, S> {
    fn drop(&mut self) {
        self.store.release_events(self.deliver);
    }
}

struct Generator<'a, S: ?Sized> {
    store: &'a S,
    template: &'a Template,
    bindings: Vec<Option<ElementHandle>>,
    positions: Vec<Option<ElementHandle>>,
    created: Vec<ElementHandle>,
}

impl<'a, S> Generator<'a, S>
where
    S: ElementStore + ?Sized,
{
    fn new(store: &'a S, template: &'a Template) -> Self {
        Self {
            store,
            template,
            bindings: template.aliases().slots().iter().map(|s| s.fixed).collect(),
            positions: vec![None; template.len() * 3],
            created: Vec::new(),
        }
    }

    /// Check every fixed handle and bind the parameters.
    fn prepare(&mut self, params: &TemplateParams) -> Result<()> {
        for triple in self.template.triples() {
            for term in triple.terms {
                if let Term::Fixed(el) = term {
                    self.require(el)?;
                }
            }
        }
        for el in self.bindings.iter().flatten() {
            self.require(*el)?;
        }

        let aliases = self.template.aliases();
        for (name, el) in params.iter() {
            let i = aliases.lookup(name).ok_or_else(|| {
                Error::MalformedTemplate(format!("parameter for unknown alias '{name}'"))
            })?;
            let slot = aliases.slot(i).ok_or_else(|| Error::MalformedTemplate(format!("alias '{name}'")))?;
            let actual = self.store.element_type(el)?;
            if let Some(fixed) = slot.fixed {
                if fixed != el {
                    return Err(Error::MalformedTemplate(format!(
                        "alias '{name}' is fixed to {fixed}, parameter gives {el}"
                    )));
                }
            }
            let constraint = slot.constraint.to_const();
            if !constraint.matches(actual) {
                return Err(Error::TypeConflict {
                    left: slot.constraint,
                    right: actual,
                    message: format!("parameter {el} for alias '{name}' violates its constraint"),
                });
            }
            self.bindings[i] = Some(el);
        }
        Ok(())
    }

    fn require(&self, el: ElementHandle) -> Result<()> {
        if self.store.is_element(el) { Ok(()) } else { Err(Error::InvalidHandle(el)) }
    }

    fn triple(&mut self, triple: &TemplateTriple) -> Result<()> {
        let source = self.end(triple.term(Slot::Source))?;
        let target = self.end(triple.term(Slot::Target))?;
        let edge = self.edge(triple.term(Slot::Edge), source, target)?;
        self.positions[Slot::Source.position(triple.index)] = Some(source);
        self.positions[Slot::Edge.position(triple.index)] = Some(edge);
        self.positions[Slot::Target.position(triple.index)] = Some(target);
        Ok(())
    }

    fn constraint(&self, slot: usize) -> Type {
        let ty = self.template.aliases().slot(slot).map(|s| s.constraint).unwrap_or_default().to_const();
        if ty.has_constancy() { ty } else { ty.union(Type::CONST) }
    }

    fn alias_name(&self, slot: usize) -> String {
        self.template
            .aliases()
            .slot(slot)
            .and_then(|s| s.name.clone())
            .unwrap_or_else(|| format!("<anonymous #{slot}>"))
    }

    fn end(&mut self, term: Term) -> Result<ElementHandle> {
        let slot = match term {
            Term::Fixed(el) => return Ok(el),
            Term::Var(i) => i,
        };
        if let Some(el) = self.bindings[slot] {
            return Ok(el);
        }

        let ty = self.constraint(slot);
        let el = if ty.is_node() {
            self.store.create_node(ty)?
        } else if ty.is_link() {
            self.store.create_link(ty)?
        } else {
            return Err(Error::MalformedTemplate(format!(
                "cannot create '{}' of type {ty}: no node or link sort",
                self.alias_name(slot)
            )));
        };
        self.created.push(el);
        self.bindings[slot] = Some(el);
        Ok(el)
    }

    fn edge(&mut self, term: Term, source: ElementHandle, target: ElementHandle) -> Result<ElementHandle> {
        let existing = match term {
            Term::Fixed(el) => Some(el),
            Term::Var(i) => self.bindings[i],
        };
        if let Some(edge) = existing {
            let ends = self.store.edge_ends(edge)?;
            let undirected = self.store.element_type(edge)?.is_undirected();
            let connects = (ends.source == source && ends.target == target)
                || (undirected && ends.source == target && ends.target == source);
            if !connects {
                return Err(Error::MalformedTemplate(format!(
                    "edge {edge} does not connect {source} and {target}"
                )));
            }
            return Ok(edge);
        }

        let Term::Var(slot) = term else {
            return Err(Error::MalformedTemplate("unresolved edge position".into()));
        };
        let ty = self.constraint(slot);
        if !ty.is_edge() {
            return Err(Error::MalformedTemplate(format!(
                "cannot create edge '{}' of type {ty}: no edge sort",
                self.alias_name(slot)
            )));
        }
        let edge = self.store.create_edge(ty, source, target)?;
        self.created.push(edge);
        self.bindings[slot] = Some(edge);
        Ok(edge)
    }

    fn rollback(&mut self) {
        for el in self.created.drain(..).rev() {
            // Edges go with their ends, so some of these are already gone.
            self.store.delete_element(el);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::search;
    use crate::storage::MemoryStore;
    use crate::template::TemplateItem;

    #[test]
    fn test_generate_creates_structure() {
        let db = MemoryStore::new();
        let class = db.create_node(Type::NODE_CONST_CLASS).unwrap();

        let mut t = Template::new();
        t.triple(class, (Type::EDGE_ACCESS_VAR_POS_PERM, "_e"), (Type::NODE_VAR, "_x")).unwrap();
        let rows = generate(&db, &t, &TemplateParams::new()).unwrap();
        assert_eq!(rows.len(), 1);

        let x = rows[0].get("_x").unwrap();
        let e = rows[0].get("_e").unwrap();
        assert_eq!(db.element_type(x).unwrap(), Type::NODE_CONST);
        assert_eq!(db.element_type(e).unwrap(), Type::EDGE_ACCESS_CONST_POS_PERM);
        assert_eq!(db.edge_ends(e).unwrap().source, class);
        assert_eq!(rows[0].at_position(2), Some(x));
    }

    #[test]
    fn test_generate_uses_params() {
        let db = MemoryStore::new();
        let class = db.create_node(Type::NODE_CONST_CLASS).unwrap();
        let x = db.create_node(Type::NODE_CONST).unwrap();

        let mut t = Template::new();
        t.triple(class, Type::EDGE_ACCESS_VAR_POS_PERM, (Type::NODE_VAR, "_x")).unwrap();
        let params = TemplateParams::new().with("_x", x);
        let rows = generate(&db, &t, &params).unwrap();
        assert_eq!(rows[0].get("_x"), Some(x));
        assert_eq!(db.element_count(), 3);
    }

    #[test]
    fn test_param_errors() {
        let db = MemoryStore::new();
        let class = db.create_node(Type::NODE_CONST_CLASS).unwrap();
        let link = db.create_link(Type::LINK_CONST).unwrap();
        let mut t = Template::new();
        t.triple(class, Type::EDGE_ACCESS_VAR_POS_PERM, (Type::NODE_VAR, "_x")).unwrap();

        let unknown = TemplateParams::new().with("_nope", class);
        assert!(matches!(generate(&db, &t, &unknown), Err(Error::MalformedTemplate(_))));

        let missing = TemplateParams::new().with("_x", ElementHandle(999));
        assert!(matches!(generate(&db, &t, &missing), Err(Error::InvalidHandle(_))));

        let wrong = TemplateParams::new().with("_x", link);
        assert!(matches!(generate(&db, &t, &wrong), Err(Error::TypeConflict { .. })));
        assert_eq!(db.element_count(), 2);
    }

    #[test]
    fn test_rollback_on_failure() {
        let db = MemoryStore::new();
        let a = db.create_node(Type::NODE_CONST).unwrap();
        let unrelated = db.create_edge(Type::EDGE_DCOMMON_CONST, a, a).unwrap();

        // The second triple reuses `unrelated` between ends it does not connect.
        let mut t = Template::new();
        t.triple(a, Type::EDGE_ACCESS_VAR_POS_PERM, (Type::NODE_VAR, "_x")).unwrap();
        t.triple("_x", unrelated, (Type::NODE_VAR, "_y")).unwrap();

        let before = db.element_count();
        let err = generate(&db, &t, &TemplateParams::new()).unwrap_err();
        assert!(matches!(err, Error::MalformedTemplate(_)));
        assert_eq!(db.element_count(), before);
    }

    #[test]
    fn test_failed_generate_reports_no_events() {
        use crate::events::{EventKind, EventRegistry, EventSink};

        let registry = Arc::new(EventRegistry::new());
        let db = MemoryStore::with_event_sink(Arc::clone(&registry) as Arc<dyn EventSink>);
        let a = db.create_node(Type::NODE_CONST).unwrap();
        let unrelated = db.create_edge(Type::EDGE_DCOMMON_CONST, a, a).unwrap();

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for kind in EventKind::ALL {
            let s = Arc::clone(&seen);
            registry.subscribe(a, kind, move |e| s.lock().push(e.kind)).unwrap();
        }

        let mut broken = Template::new();
        broken.triple(a, Type::EDGE_ACCESS_VAR_POS_PERM, (Type::NODE_VAR, "_x")).unwrap();
        broken.triple("_x", unrelated, (Type::NODE_VAR, "_y")).unwrap();
        assert!(generate(&db, &broken, &TemplateParams::new()).is_err());
        assert!(seen.lock().is_empty());

        let mut ok = Template::new();
        ok.triple(a, Type::EDGE_ACCESS_VAR_POS_PERM, (Type::NODE_VAR, "_x")).unwrap();
        generate(&db, &ok, &TemplateParams::new()).unwrap();
        assert_eq!(*seen.lock(), vec![EventKind::OutgoingArcAdded]);
    }

    #[test]
    fn test_sortless_variable_fails() {
        let db = MemoryStore::new();
        let a = db.create_node(Type::NODE_CONST).unwrap();
        let mut t = Template::new();
        t.triple(a, Type::EDGE_ACCESS_VAR_POS_PERM, (Type::VAR, "_x")).unwrap();
        assert!(matches!(generate(&db, &t, &TemplateParams::new()), Err(Error::MalformedTemplate(_))));
        assert_eq!(db.element_count(), 1);
    }

    #[test]
    fn test_empty_template_creates_nothing() {
        let db = MemoryStore::new();
        let rows = generate(&db, &Template::new(), &TemplateParams::new()).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_empty());
        assert_eq!(db.element_count(), 0);
    }

    #[test]
    fn test_quintuple_generate_then_search() {
        let db = MemoryStore::new();
        let a = db.create_node(Type::NODE_CONST).unwrap();
        let rel = db.create_node(Type::NODE_CONST_NOROLE).unwrap();

        let mut t = Template::new();
        t.quintuple(a, Type::EDGE_DCOMMON_VAR, (Type::LINK_VAR, "_l"), Type::EDGE_ACCESS_VAR_POS_PERM, rel)
            .unwrap();
        let generated = generate(&db, &t, &TemplateParams::new()).unwrap();
        assert_eq!(db.element_count(), 5);

        let found = search(&db, &t).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0], generated[0]);
    }

    #[test]
    fn test_fixed_edge_is_reused() {
        let db = MemoryStore::new();
        let a = db.create_node(Type::NODE_CONST).unwrap();
        let b = db.create_node(Type::NODE_CONST).unwrap();
        let e = db.create_edge(Type::EDGE_DCOMMON_CONST, a, b).unwrap();
        let rel = db.create_node(Type::NODE_CONST_NOROLE).unwrap();

        let mut t = Template::new();
        t.quintuple(a, TemplateItem::fixed(e), b, Type::EDGE_ACCESS_VAR_POS_PERM, rel).unwrap();
        generate(&db, &t, &TemplateParams::new()).unwrap();
        assert_eq!(db.incoming(e).unwrap().len(), 1);
        assert_eq!(db.element_count(), 5);
    }
}
