//! Alias table: the join variables of a template.
//!
//! Every typed item and every named item gets a *slot*. Named items sharing
//! an alias share one slot; that is what makes an alias a join key. Slots
//! are numbered in order of first appearance.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::model::{ElementHandle, Type};
use crate::{Error, Result};

/// One join variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasSlot {
    /// `None` for anonymous typed items.
    pub name: Option<String>,
    /// Merged type constraint of every typed declaration.
    pub constraint: Type,
    /// Handle the alias was declared equal to, if any.
    pub fixed: Option<ElementHandle>,
    typed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    slots: Vec<AliasSlot>,
    by_name: HashMap<String, usize>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot_for(&mut self, name: &str) -> usize {
        if let Some(&i) = self.by_name.get(name) {
            return i;
        }
        let i = self.slots.len();
        self.slots.push(AliasSlot {
            name: Some(name.to_string()),
            constraint: Type::UNKNOWN,
            fixed: None,
            typed: false,
        });
        self.by_name.insert(name.to_string(), i);
        i
    }

    /// Declare a typed variable. Anonymous declarations always get a fresh slot.
    pub(crate) fn declare_typed(&mut self, name: Option<&str>, ty: Type) -> Result<usize> {
        let Some(name) = name else {
            self.slots.push(AliasSlot { name: None, constraint: ty, fixed: None, typed: true });
            return Ok(self.slots.len() - 1);
        };

        let i = self.slot_for(name);
        let slot = &mut self.slots[i];
        if slot.fixed.is_some() {
            return Err(Error::MalformedTemplate(format!(
                "alias '{name}' is declared both as a fixed element and as a variable"
            )));
        }
        slot.constraint = slot.constraint.compose(ty).map_err(|e| {
            Error::MalformedTemplate(format!("alias '{name}' has incompatible constraints: {e}"))
        })?;
        slot.typed = true;
        Ok(i)
    }

    /// Declare `name` to stand for `el`.
    pub(crate) fn declare_fixed(&mut self, name: &str, el: ElementHandle) -> Result<usize> {
        let i = self.slot_for(name);
        let slot = &mut self.slots[i];
        if slot.typed {
            return Err(Error::MalformedTemplate(format!(
                "alias '{name}' is declared both as a variable and as a fixed element"
            )));
        }
        match slot.fixed {
            Some(prev) if prev != el => Err(Error::MalformedTemplate(format!(
                "alias '{name}' is fixed to both {prev} and {el}"
            ))),
            _ => {
                slot.fixed = Some(el);
                Ok(i)
            }
        }
    }

    /// Reference an alias; an alias never declared elsewhere is a wildcard.
    pub(crate) fn reference(&mut self, name: &str) -> usize {
        self.slot_for(name)
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn slot(&self, i: usize) -> Option<&AliasSlot> {
        self.slots.get(i)
    }

    pub fn slots(&self) -> &[AliasSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Named aliases in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().filter_map(|s| s.name.as_deref())
    }

    pub(crate) fn layout(&self) -> Arc<RowLayout> {
        let mut layout = RowLayout::default();
        for (slot, s) in self.slots.iter().enumerate() {
            if let Some(name) = &s.name {
                layout.by_name.insert(name.clone(), layout.names.len());
                layout.names.push(name.clone());
                layout.slots.push(slot);
            }
        }
        Arc::new(layout)
    }
}

/// Column layout shared by every row of one result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowLayout {
    pub(crate) names: Vec<String>,
    pub(crate) by_name: HashMap<String, usize>,
    /// Column → alias slot.
    pub(crate) slots: Vec<usize>,
}
