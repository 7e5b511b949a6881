//! # Pattern Templates
//!
//! A [`Template`] is an ordered list of triples. Each position of a triple
//! is a [`TemplateItem`]:
//!
//! - a **fixed** handle,
//! - a **typed** variable (`var` modality constraint), optionally named,
//! - an **alias reference** to a variable named elsewhere.
//!
//! An alias used in several positions is one join variable: every result
//! row binds it to a single handle. A quintuple is sugar for two triples,
//! `(source, edge, target)` and `(attr, attr_edge, edge)`.
//!
//! Templates can also be compiled from a structure stored in the graph, see
//! [`Template::from_structure`].
//!
//! ```rust
//! use semgraph::{Template, TemplateItem, Type, ElementHandle};
//!
//! # fn example(class: ElementHandle) -> semgraph::Result<()> {
//! let mut t = Template::new();
//! t.triple(
//!     class,
//!     TemplateItem::var_as(Type::EDGE_ACCESS_VAR_POS_PERM, "_e"),
//!     TemplateItem::var_as(Type::NODE_VAR, "_x"),
//! )?;
//! t.triple(TemplateItem::var(Type::NODE_VAR), Type::EDGE_ACCESS_VAR_POS_PERM, "_x")?
//!     .optional();
//! # Ok(())
//! # }
//! ```

pub mod alias;
pub mod build;
pub mod result;

use std::ops::Range;

use crate::model::{ElementHandle, Type};
use crate::{Error, Result};

pub use alias::{AliasSlot, AliasTable, RowLayout};
pub use result::{ResultRow, ResultSet, TemplateParams};

// ============================================================================
// Items
// ============================================================================

/// One position of a template triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateItem {
    Fixed { handle: ElementHandle, alias: Option<String> },
    Typed { ty: Type, alias: Option<String> },
    Alias(String),
}

impl TemplateItem {
    pub fn fixed(handle: ElementHandle) -> Self {
        TemplateItem::Fixed { handle, alias: None }
    }

    /// A fixed handle that other positions can refer to as `alias`.
    pub fn fixed_as(handle: ElementHandle, alias: impl Into<String>) -> Self {
        TemplateItem::Fixed { handle, alias: Some(alias.into()) }
    }

    /// An anonymous variable.
    pub fn var(ty: Type) -> Self {
        TemplateItem::Typed { ty, alias: None }
    }

    pub fn var_as(ty: Type, alias: impl Into<String>) -> Self {
        TemplateItem::Typed { ty, alias: Some(alias.into()) }
    }

    pub fn alias(name: impl Into<String>) -> Self {
        TemplateItem::Alias(name.into())
    }

    /// Name other positions may use for this item.
    pub fn name(&self) -> Option<&str> {
        match self {
            TemplateItem::Fixed { alias, .. } | TemplateItem::Typed { alias, .. } => alias.as_deref(),
            TemplateItem::Alias(name) => Some(name),
        }
    }
}

impl From<ElementHandle> for TemplateItem {
    fn from(handle: ElementHandle) -> Self {
        TemplateItem::fixed(handle)
    }
}

impl From<Type> for TemplateItem {
    fn from(ty: Type) -> Self {
        TemplateItem::var(ty)
    }
}

impl From<&str> for TemplateItem {
    fn from(name: &str) -> Self {
        TemplateItem::alias(name)
    }
}

impl From<String> for TemplateItem {
    fn from(name: String) -> Self {
        TemplateItem::Alias(name)
    }
}

impl From<(Type, &str)> for TemplateItem {
    fn from((ty, alias): (Type, &str)) -> Self {
        TemplateItem::var_as(ty, alias)
    }
}

impl From<(ElementHandle, &str)> for TemplateItem {
    fn from((handle, alias): (ElementHandle, &str)) -> Self {
        TemplateItem::fixed_as(handle, alias)
    }
}

/// Compiled form of an item: a constant or an alias slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Term {
    Fixed(ElementHandle),
    Var(usize),
}

// ============================================================================
// Triples
// ============================================================================

/// Position inside a triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Source = 0,
    Edge = 1,
    Target = 2,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Source, Slot::Edge, Slot::Target];

    /// Flat position of this slot in triple `triple`.
    pub fn position(self, triple: usize) -> usize {
        triple * 3 + self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateTriple {
    /// Declaration index inside the template.
    pub index: usize,
    pub items: [TemplateItem; 3],
    pub optional: bool,
    pub(crate) terms: [Term; 3],
}

impl TemplateTriple {
    pub fn item(&self, slot: Slot) -> &TemplateItem {
        &self.items[slot as usize]
    }

    pub(crate) fn term(&self, slot: Slot) -> Term {
        self.terms[slot as usize]
    }
}

// ============================================================================
// Template
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Template {
    triples: Vec<TemplateTriple>,
    aliases: AliasTable,
    last: Range<usize>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a required triple `source --edge--> target`.
    pub fn triple(
        &mut self,
        source: impl Into<TemplateItem>,
        edge: impl Into<TemplateItem>,
        target: impl Into<TemplateItem>,
    ) -> Result<&mut Self> {
        let start = self.triples.len();
        self.push_triple([source.into(), edge.into(), target.into()])?;
        self.last = start..self.triples.len();
        Ok(self)
    }

    /// Append `source --edge--> target` plus `attr --attr_edge--> edge`.
    ///
    /// An anonymous edge item is named `_repl_<position>` so the attribute
    /// triple can refer to it.
    pub fn quintuple(
        &mut self,
        source: impl Into<TemplateItem>,
        edge: impl Into<TemplateItem>,
        target: impl Into<TemplateItem>,
        attr_edge: impl Into<TemplateItem>,
        attr: impl Into<TemplateItem>,
    ) -> Result<&mut Self> {
        let start = self.triples.len();
        let edge_ref = match edge.into() {
            TemplateItem::Typed { ty, alias: None } => {
                TemplateItem::var_as(ty, format!("_repl_{}", Slot::Edge.position(start)))
            }
            other => other,
        };
        let back_ref = match &edge_ref {
            TemplateItem::Fixed { handle, alias: None } => TemplateItem::fixed(*handle),
            other => other.name().map(TemplateItem::alias).unwrap_or_else(|| other.clone()),
        };

        let checkpoint = (self.triples.clone(), self.aliases.clone());
        let pushed = self
            .push_triple([source.into(), edge_ref, target.into()])
            .and_then(|_| self.push_triple([attr.into(), attr_edge.into(), back_ref]));
        if let Err(e) = pushed {
            (self.triples, self.aliases) = checkpoint;
            return Err(e);
        }
        self.last = start..self.triples.len();
        Ok(self)
    }

    /// Mark the triples added by the last `triple`/`quintuple` call optional.
    pub fn optional(&mut self) -> &mut Self {
        for i in self.last.clone() {
            self.triples[i].optional = true;
        }
        self
    }

    /// Mark triple `index` optional.
    pub fn mark_optional(&mut self, index: usize) -> Result<&mut Self> {
        let triple = self.triples.get_mut(index).ok_or_else(|| {
            Error::MalformedTemplate(format!("no triple at index {index}"))
        })?;
        triple.optional = true;
        Ok(self)
    }

    fn push_triple(&mut self, items: [TemplateItem; 3]) -> Result<()> {
        let index = self.triples.len();
        let mut aliases = self.aliases.clone();
        let mut terms = [Term::Fixed(ElementHandle::NULL); 3];
        for (term, item) in terms.iter_mut().zip(items.iter()) {
            *term = compile(&mut aliases, item)?;
        }

        if let Term::Var(edge) = terms[Slot::Edge as usize] {
            if terms[Slot::Source as usize] == Term::Var(edge) || terms[Slot::Target as usize] == Term::Var(edge) {
                return Err(Error::MalformedTemplate(format!(
                    "triple {index}: the edge alias is also used as one of its ends"
                )));
            }
        }

        self.aliases = aliases;
        self.triples.push(TemplateTriple { index, items, optional: false, terms });
        Ok(())
    }

    pub fn triples(&self) -> &[TemplateTriple] {
        &self.triples
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn has_alias(&self, name: &str) -> bool {
        self.aliases.lookup(name).is_some()
    }

    /// Merged type constraint of `name`.
    pub fn alias_constraint(&self, name: &str) -> Option<Type> {
        self.aliases.lookup(name).and_then(|i| self.aliases.slot(i)).map(|s| s.constraint)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }
}

fn compile(aliases: &mut AliasTable, item: &TemplateItem) -> Result<Term> {
    match item {
        TemplateItem::Fixed { handle, alias } => {
            if handle.is_null() {
                return Err(Error::InvalidHandle(*handle));
            }
            match alias {
                Some(name) => aliases.declare_fixed(name, *handle).map(Term::Var),
                None => Ok(Term::Fixed(*handle)),
            }
        }
        TemplateItem::Typed { ty, alias } => {
            if ty.is_const() {
                return Err(Error::MalformedTemplate(format!(
                    "variable {} has a const type {ty}",
                    alias.as_deref().unwrap_or("<anonymous>")
                )));
            }
            aliases.declare_typed(alias.as_deref(), *ty).map(Term::Var)
        }
        TemplateItem::Alias(name) => Ok(Term::Var(aliases.reference(name))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const A: ElementHandle = ElementHandle(1);
    const B: ElementHandle = ElementHandle(2);

    #[test]
    fn test_triple_compiles_terms() {
        let mut t = Template::new();
        t.triple(A, TemplateItem::var_as(Type::EDGE_ACCESS_VAR_POS_PERM, "_e"), (Type::NODE_VAR, "_x"))
            .unwrap();
        let triple = &t.triples()[0];
        assert_eq!(triple.term(Slot::Source), Term::Fixed(A));
        assert!(matches!(triple.term(Slot::Edge), Term::Var(_)));
        assert!(t.has_alias("_e"));
        assert!(t.has_alias("_x"));
        assert!(!triple.optional);
    }

    #[test]
    fn test_const_typed_item_rejected() {
        let mut t = Template::new();
        let err = t.triple(A, Type::EDGE_ACCESS_CONST_POS_PERM, B).unwrap_err();
        assert!(matches!(err, Error::MalformedTemplate(_)));
        assert!(t.is_empty());
    }

    #[test]
    fn test_null_fixed_rejected() {
        let mut t = Template::new();
        let err = t.triple(ElementHandle::NULL, Type::EDGE_ACCESS_VAR_POS_PERM, B).unwrap_err();
        assert!(matches!(err, Error::InvalidHandle(_)));
    }

    #[test]
    fn test_edge_alias_reused_as_end_rejected() {
        let mut t = Template::new();
        let err = t.triple("_e", (Type::EDGE_ACCESS_VAR_POS_PERM, "_e"), B).unwrap_err();
        assert!(matches!(err, Error::MalformedTemplate(_)));
    }

    #[test]
    fn test_incompatible_alias_constraints() {
        let mut t = Template::new();
        t.triple(A, Type::EDGE_ACCESS_VAR_POS_PERM, (Type::NODE_VAR, "_x")).unwrap();
        let err = t.triple(A, Type::EDGE_ACCESS_VAR_POS_PERM, (Type::LINK_VAR, "_x")).unwrap_err();
        assert!(matches!(err, Error::MalformedTemplate(_)));
        // The failed call left the template untouched.
        assert_eq!(t.len(), 1);
        assert_eq!(t.alias_constraint("_x"), Some(Type::NODE_VAR));
    }

    #[test]
    fn test_quintuple_names_anonymous_edge() {
        let mut t = Template::new();
        t.triple(A, Type::EDGE_ACCESS_VAR_POS_PERM, B).unwrap();
        t.quintuple(A, Type::EDGE_DCOMMON_VAR, (Type::NODE_VAR, "_y"), Type::EDGE_ACCESS_VAR_POS_PERM, B)
            .unwrap();
        assert_eq!(t.len(), 3);
        assert!(t.has_alias("_repl_4"));
        assert_eq!(t.triples()[2].item(Slot::Target), &TemplateItem::alias("_repl_4"));
    }

    #[test]
    fn test_quintuple_with_fixed_edge() {
        let mut t = Template::new();
        let edge = ElementHandle(9);
        t.quintuple(A, edge, B, Type::EDGE_ACCESS_VAR_POS_PERM, (Type::NODE_VAR_ROLE, "_r")).unwrap();
        assert_eq!(t.triples()[1].term(Slot::Target), Term::Fixed(edge));
    }

    #[test]
    fn test_optional_marks_last_construct() {
        let mut t = Template::new();
        t.triple(A, Type::EDGE_ACCESS_VAR_POS_PERM, (Type::NODE_VAR, "_x")).unwrap();
        t.quintuple("_x", Type::EDGE_DCOMMON_VAR, Type::NODE_VAR, Type::EDGE_ACCESS_VAR_POS_PERM, B)
            .unwrap()
            .optional();
        let flags: Vec<bool> = t.triples().iter().map(|t| t.optional).collect();
        assert_eq!(flags, vec![false, true, true]);

        t.mark_optional(0).unwrap();
        assert!(t.triples()[0].optional);
        assert!(t.mark_optional(7).is_err());
    }

    #[test]
    fn test_slot_positions() {
        assert_eq!(Slot::Source.position(0), 0);
        assert_eq!(Slot::Target.position(2), 8);
    }
}
