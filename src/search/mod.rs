//! # Search Engine
//!
//! Conjunctive-query evaluation of a [`Template`] over an [`ElementStore`].
//!
//! ## Algorithm
//!
//! 1. **Plan**: required triples are ordered greedily. At every step the
//!    triple with the most positions already bound wins (edge bound first,
//!    then both ends, then target, then source), so each newly placed triple
//!    joins on something known whenever the template allows it.
//! 2. **Backtrack**: an explicit stack of choice points, one per placed
//!    triple. A frame holds the matching facts for its triple under the
//!    bindings at the time it was pushed, and a mark into the undo trail.
//!    No recursion: deep templates cost heap, not stack.
//! 3. **Optional pass**: once every required triple holds, each optional
//!    triple takes its first consistent witness, or leaves its aliases
//!    unbound. Optional triples never add or remove rows.
//!
//! A row never uses one edge handle in the edge position of two triples.
//!
//! A per-fact check ([`search_checked`]) is consulted before a fact is bound,
//! in the required and the optional pass alike. A rejected fact prunes the
//! whole subtree below it.
//!
//! Variable constraints are matched against the const form of stored
//! elements: `_x: NODE_VAR_CLASS` finds const class nodes.

use std::sync::Arc;

use crate::iterator::{Fact3, Param, iter3};
use crate::model::{ElementHandle, Type};
use crate::storage::ElementStore;
use crate::template::{ResultRow, ResultSet, RowLayout, Slot, Template, TemplateTriple, Term};
use crate::Result;

/// Returned by a streaming callback to continue or stop the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchControl {
    Continue,
    Stop,
}

// ============================================================================
// Entry points
// ============================================================================

/// All rows of `template`.
///
/// An empty template yields exactly one row with no bindings. A template
/// that cannot be satisfied yields an empty set.
pub fn search<S>(store: &S, template: &Template) -> Result<ResultSet>
where
    S: ElementStore + ?Sized,
{
    search_checked(store, template, |_: &Fact3| true)
}

/// All rows of `template` built only from facts accepted by `check`.
pub fn search_checked<S, C>(store: &S, template: &Template, mut check: C) -> Result<ResultSet>
where
    S: ElementStore + ?Sized,
    C: FnMut(&Fact3) -> bool,
{
    let layout = template.aliases().layout();
    let mut rows = Vec::new();
    run(store, template, Arc::clone(&layout), &mut check, &mut |row: &ResultRow| {
        rows.push(row.clone());
        SearchControl::Continue
    })?;
    tracing::debug!(triples = template.len(), rows = rows.len(), "search finished");
    Ok(ResultSet::new(layout, rows))
}

/// Stream rows to `on_row` until it returns [`SearchControl::Stop`].
pub fn search_with<S, F>(store: &S, template: &Template, mut on_row: F) -> Result<()>
where
    S: ElementStore + ?Sized,
    F: FnMut(&ResultRow) -> SearchControl,
{
    run(store, template, template.aliases().layout(), &mut |_: &Fact3| true, &mut on_row)
}

/// Rows whose every element is a member of `structure`, i.e. the target of
/// a const positive permanent access arc from `structure`.
pub fn search_in_structure<S>(store: &S, template: &Template, structure: ElementHandle) -> Result<ResultSet>
where
    S: ElementStore + ?Sized,
{
    store.element_type(structure)?;
    let layout = template.aliases().layout();
    let mut rows = Vec::new();
    let mut failure = None;
    run(store, template, Arc::clone(&layout), &mut |_: &Fact3| true, &mut |row: &ResultRow| {
        let mut inside = true;
        for el in row.handles() {
            match store.has_edge(structure, el, Type::EDGE_ACCESS_CONST_POS_PERM) {
                Ok(true) => {}
                Ok(false) => {
                    inside = false;
                    break;
                }
                Err(e) => {
                    failure = Some(e);
                    return SearchControl::Stop;
                }
            }
        }
        if inside {
            rows.push(row.clone());
        }
        SearchControl::Continue
    })?;
    if let Some(e) = failure {
        return Err(e);
    }
    tracing::debug!(%structure, rows = rows.len(), "structure search finished");
    Ok(ResultSet::new(layout, rows))
}

// ============================================================================
// Planning
// ============================================================================

fn priority(triple: &TemplateTriple, bound: &[bool]) -> u8 {
    let is_bound = |slot: Slot| match triple.term(slot) {
        Term::Fixed(_) => true,
        Term::Var(i) => bound[i],
    };
    match (is_bound(Slot::Source), is_bound(Slot::Edge), is_bound(Slot::Target)) {
        (_, true, _) => 4,
        (true, _, true) => 3,
        (false, _, true) => 2,
        (true, _, false) => 1,
        (false, _, false) => 0,
    }
}

/// Order required triples for evaluation. Ties keep declaration order.
fn plan(template: &Template, bindings: &[Option<ElementHandle>]) -> Vec<usize> {
    let mut bound: Vec<bool> = bindings.iter().map(Option::is_some).collect();
    let mut pending: Vec<&TemplateTriple> = template.triples().iter().filter(|t| !t.optional).collect();
    let mut order = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let mut best = 0;
        let mut best_score = priority(pending[0], &bound);
        for (i, triple) in pending.iter().enumerate().skip(1) {
            let score = priority(triple, &bound);
            if score > best_score {
                best = i;
                best_score = score;
            }
        }
        let triple = pending.remove(best);
        for term in triple.terms {
            if let Term::Var(i) = term {
                bound[i] = true;
            }
        }
        order.push(triple.index);
    }
    order
}

// ============================================================================
// Evaluation
// ============================================================================

struct Frame {
    facts: Vec<Fact3>,
    next: usize,
    trail_mark: usize,
}

/// Binding environment shared by all choice points.
struct Env<'t> {
    template: &'t Template,
    bindings: Vec<Option<ElementHandle>>,
    /// Slots bound since the start, in binding order.
    trail: Vec<usize>,
    /// Edge handle used by each placed triple.
    used_edges: Vec<ElementHandle>,
    positions: Vec<Option<ElementHandle>>,
}

impl<'t> Env<'t> {
    fn new(template: &'t Template) -> Self {
        let bindings = template.aliases().slots().iter().map(|s| s.fixed).collect();
        Self {
            template,
            bindings,
            trail: Vec::new(),
            used_edges: Vec::new(),
            positions: vec![None; template.len() * 3],
        }
    }

    fn param(&self, term: Term) -> Param {
        match term {
            Term::Fixed(el) => Param::Fixed(el),
            Term::Var(i) => match self.bindings[i] {
                Some(el) => Param::Fixed(el),
                None => {
                    let constraint = self.template.aliases().slot(i).map(|s| s.constraint).unwrap_or_default();
                    Param::Type(constraint.to_const())
                }
            },
        }
    }

    fn candidates<S: ElementStore + ?Sized>(&self, store: &S, triple: &TemplateTriple) -> Vec<Fact3> {
        iter3(
            store,
            self.param(triple.term(Slot::Source)),
            self.param(triple.term(Slot::Edge)),
            self.param(triple.term(Slot::Target)),
        )
        .collect()
    }

    /// Try to extend the bindings with `fact`. On failure nothing is kept.
    fn bind(&mut self, triple: &TemplateTriple, fact: &Fact3) -> bool {
        if self.used_edges.contains(&fact.edge) {
            return false;
        }
        let mark = self.trail.len();
        for slot in Slot::ALL {
            let Some(value) = fact.at(slot as usize) else { continue };
            if let Term::Var(i) = triple.term(slot) {
                match self.bindings[i] {
                    Some(bound) if bound != value => {
                        self.undo(mark);
                        return false;
                    }
                    Some(_) => {}
                    None => {
                        self.bindings[i] = Some(value);
                        self.trail.push(i);
                    }
                }
            }
            self.positions[slot.position(triple.index)] = Some(value);
        }
        self.used_edges.push(fact.edge);
        true
    }

    fn undo(&mut self, mark: usize) {
        while self.trail.len() > mark {
            if let Some(i) = self.trail.pop() {
                self.bindings[i] = None;
            }
        }
    }

    fn clear_positions(&mut self, triple: &TemplateTriple) {
        for slot in Slot::ALL {
            self.positions[slot.position(triple.index)] = None;
        }
    }

    fn row(&self, layout: &Arc<RowLayout>) -> ResultRow {
        ResultRow::from_bindings(Arc::clone(layout), &self.bindings, self.positions.clone())
    }
}

fn run<S>(
    store: &S,
    template: &Template,
    layout: Arc<RowLayout>,
    check: &mut dyn FnMut(&Fact3) -> bool,
    on_row: &mut dyn FnMut(&ResultRow) -> SearchControl,
) -> Result<()>
where
    S: ElementStore + ?Sized,
{
    let mut env = Env::new(template);
    let order = plan(template, &env.bindings);
    let optional: Vec<&TemplateTriple> = template.triples().iter().filter(|t| t.optional).collect();
    let triples = template.triples();

    if order.is_empty() {
        complete(store, &mut env, &optional, &layout, check, on_row);
        return Ok(());
    }

    let mut stack = vec![Frame {
        facts: env.candidates(store, &triples[order[0]]),
        next: 0,
        trail_mark: 0,
    }];

    while !stack.is_empty() {
        let depth = stack.len() - 1;
        let frame = &mut stack[depth];
        let mark = frame.trail_mark;
        let fact = frame.facts.get(frame.next).copied();
        frame.next += 1;

        env.undo(mark);
        env.used_edges.truncate(depth);

        let Some(fact) = fact else {
            tracing::trace!(depth, "backtrack");
            stack.pop();
            continue;
        };
        let triple = &triples[order[depth]];
        if !check(&fact) || !env.bind(triple, &fact) {
            continue;
        }

        if depth + 1 == order.len() {
            if complete(store, &mut env, &optional, &layout, check, on_row) == SearchControl::Stop {
                tracing::trace!("search stopped by caller");
                return Ok(());
            }
        } else {
            let next = &triples[order[depth + 1]];
            stack.push(Frame {
                facts: env.candidates(store, next),
                next: 0,
                trail_mark: env.trail.len(),
            });
        }
    }
    Ok(())
}

/// All required triples hold: run the optional pass, emit, restore.
fn complete<S>(
    store: &S,
    env: &mut Env<'_>,
    optional: &[&TemplateTriple],
    layout: &Arc<RowLayout>,
    check: &mut dyn FnMut(&Fact3) -> bool,
    on_row: &mut dyn FnMut(&ResultRow) -> SearchControl,
) -> SearchControl
where
    S: ElementStore + ?Sized,
{
    let mark = env.trail.len();
    let edges = env.used_edges.len();

    for triple in optional {
        let witness = env
            .candidates(store, triple)
            .into_iter()
            .any(|fact| check(&fact) && env.bind(triple, &fact));
        if !witness {
            env.clear_positions(triple);
        }
    }

    let control = on_row(&env.row(layout));

    env.undo(mark);
    env.used_edges.truncate(edges);
    for triple in optional {
        env.clear_positions(triple);
    }
    control
}

// ============================================================================
// Tests
// ============================================================================
