//! # Triple Iterator
//!
//! Enumerates facts `(source, edge, target)` and
//! `(source, edge, target, attr_edge, attr)` matching a pattern in which
//! every position is a [`Param`]: a fixed handle or a type constraint.
//!
//! There is one matcher for all fixed/free combinations. The only thing the
//! shape of the pattern decides is where candidate edges come from:
//!
//! | Fixed position | Candidates |
//! |----------------|------------|
//! | edge | that edge |
//! | source | `outgoing(source)` |
//! | target | `incoming(target)` |
//! | none | every edge in the store |
//!
//! Each call materializes its matches from the current store state, so an
//! iterator never observes mutations made after it was built. Unknown or
//! deleted fixed handles produce an empty iterator rather than an error.

use crate::model::*;
use crate::storage::ElementStore;

// ============================================================================
// Pattern positions
// ============================================================================

/// One position of an iterator pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// Exactly this element.
    Fixed(ElementHandle),
    /// Any element whose type has every bit of the constraint.
    /// [`Type::UNKNOWN`] accepts everything.
    Type(Type),
}

impl Param {
    /// Wildcard.
    pub const ANY: Param = Param::Type(Type::UNKNOWN);

    pub fn fixed(&self) -> Option<ElementHandle> {
        match self {
            Param::Fixed(el) => Some(*el),
            Param::Type(_) => None,
        }
    }

    fn accepts(&self, el: ElementHandle, ty: Type) -> bool {
        match self {
            Param::Fixed(want) => *want == el,
            Param::Type(constraint) => constraint.matches(ty),
        }
    }
}

impl From<ElementHandle> for Param {
    fn from(el: ElementHandle) -> Self {
        Param::Fixed(el)
    }
}

impl From<Type> for Param {
    fn from(ty: Type) -> Self {
        Param::Type(ty)
    }
}

// ============================================================================
// Facts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fact3 {
    pub source: ElementHandle,
    pub edge: ElementHandle,
    pub target: ElementHandle,
}

impl Fact3 {
    /// Handle at position 0 (source), 1 (edge) or 2 (target).
    pub fn at(&self, pos: usize) -> Option<ElementHandle> {
        match pos {
            0 => Some(self.source),
            1 => Some(self.edge),
            2 => Some(self.target),
            _ => None,
        }
    }
}

/// A triple together with one attribute arc pointing at its edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fact5 {
    pub source: ElementHandle,
    pub edge: ElementHandle,
    pub target: ElementHandle,
    pub attr_edge: ElementHandle,
    pub attr: ElementHandle,
}

impl Fact5 {
    pub fn triple(&self) -> Fact3 {
        Fact3 { source: self.source, edge: self.edge, target: self.target }
    }
}

// ============================================================================
// Iterators
// ============================================================================

/// Matches of a 3-position pattern.
#[derive(Debug, Clone)]
pub struct Iterator3 {
    facts: std::vec::IntoIter<Fact3>,
}

impl Iterator for Iterator3 {
    type Item = Fact3;

    fn next(&mut self) -> Option<Fact3> {
        self.facts.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.facts.size_hint()
    }
}

impl ExactSizeIterator for Iterator3 {}

/// Matches of a 5-position pattern.
#[derive(Debug, Clone)]
pub struct Iterator5 {
    facts: std::vec::IntoIter<Fact5>,
}

impl Iterator for Iterator5 {
    type Item = Fact5;

    fn next(&mut self) -> Option<Fact5> {
        self.facts.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.facts.size_hint()
    }
}

impl ExactSizeIterator for Iterator5 {}

/// Iterate edges matching `source --edge--> target`.
///
/// Undirected edges are reported in both orientations (once for a
/// self-loop).
pub fn iter3<S>(store: &S, source: Param, edge: Param, target: Param) -> Iterator3
where
    S: ElementStore + ?Sized,
{
    let candidates = match (edge.fixed(), source.fixed(), target.fixed()) {
        (Some(e), _, _) => vec![e],
        (None, Some(s), _) => store.outgoing(s).unwrap_or_default(),
        (None, None, Some(t)) => store.incoming(t).unwrap_or_default(),
        (None, None, None) => store.edges(),
    };

    let mut facts = Vec::new();
    for e in candidates {
        let Ok(edge_ty) = store.element_type(e) else { continue };
        if !edge_ty.is_edge() || !edge.accepts(e, edge_ty) {
            continue;
        }
        let Ok(ends) = store.edge_ends(e) else { continue };
        let (Ok(src_ty), Ok(trg_ty)) = (store.element_type(ends.source), store.element_type(ends.target)) else {
            continue;
        };

        if source.accepts(ends.source, src_ty) && target.accepts(ends.target, trg_ty) {
            facts.push(Fact3 { source: ends.source, edge: e, target: ends.target });
        }
        if edge_ty.is_undirected()
            && ends.source != ends.target
            && source.accepts(ends.target, trg_ty)
            && target.accepts(ends.source, src_ty)
        {
            facts.push(Fact3 { source: ends.target, edge: e, target: ends.source });
        }
    }
    Iterator3 { facts: facts.into_iter() }
}

/// Iterate `source --edge--> target` where the edge is itself the target of
/// `attr --attr_edge--> edge`.
pub fn iter5<S>(store: &S, source: Param, edge: Param, target: Param, attr_edge: Param, attr: Param) -> Iterator5
where
    S: ElementStore + ?Sized,
{
    let mut facts = Vec::new();
    for fact in iter3(store, source, edge, target) {
        for a in iter3(store, attr, attr_edge, Param::Fixed(fact.edge)) {
            facts.push(Fact5 {
                source: fact.source,
                edge: fact.edge,
                target: fact.target,
                attr_edge: a.edge,
                attr: a.source,
            });
        }
    }
    Iterator5 { facts: facts.into_iter() }
}

// ============================================================================
// Tests
// ============================================================================
