//! Result rows, result sets and Generate parameters.

use std::sync::Arc;

use hashbrown::HashMap;

use super::alias::RowLayout;
use crate::model::ElementHandle;

// ============================================================================
// ResultRow
// ============================================================================

/// One consistent binding of a template.
///
/// Addressable three ways: by alias name, by alias index (declaration order
/// of named aliases) and by triple position (`triple * 3 + slot`).
#[derive(Debug, Clone)]
pub struct ResultRow {
    layout: Arc<RowLayout>,
    values: Vec<Option<ElementHandle>>,
    positions: Vec<Option<ElementHandle>>,
}

impl ResultRow {
    /// Project full slot bindings onto the named columns.
    pub(crate) fn from_bindings(
        layout: Arc<RowLayout>,
        bindings: &[Option<ElementHandle>],
        positions: Vec<Option<ElementHandle>>,
    ) -> Self {
        let values = layout.slots.iter().map(|&slot| bindings.get(slot).copied().flatten()).collect();
        Self { layout, values, positions }
    }

    /// Handle bound to `alias`. `None` for unknown aliases and for aliases
    /// of optional triples that found no witness.
    pub fn get(&self, alias: &str) -> Option<ElementHandle> {
        self.layout.by_name.get(alias).and_then(|&i| self.values[i])
    }

    pub fn get_index(&self, index: usize) -> Option<ElementHandle> {
        self.values.get(index).copied().flatten()
    }

    /// Handle found at position `pos` (`triple * 3 + slot`).
    pub fn at_position(&self, pos: usize) -> Option<ElementHandle> {
        self.positions.get(pos).copied().flatten()
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.layout.by_name.contains_key(alias)
    }

    pub fn aliases(&self) -> &[String] {
        &self.layout.names
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(alias, binding)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<ElementHandle>)> {
        self.layout.names.iter().map(String::as_str).zip(self.values.iter().copied())
    }

    /// Every handle this row touches, fixed positions included.
    pub fn handles(&self) -> impl Iterator<Item = ElementHandle> + '_ {
        self.positions.iter().chain(self.values.iter()).filter_map(|h| *h)
    }
}

/// Rows are equal when they bind the same aliases to the same handles.
impl PartialEq for ResultRow {
    fn eq(&self, other: &Self) -> bool {
        self.layout.names == other.layout.names && self.values == other.values
    }
}

impl Eq for ResultRow {}

// ============================================================================
// ResultSet
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResultSet {
    layout: Arc<RowLayout>,
    rows: Vec<ResultRow>,
}

impl ResultSet {
    pub(crate) fn new(layout: Arc<RowLayout>, rows: Vec<ResultRow>) -> Self {
        Self { layout, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Zero rows: the required triples cannot be satisfied. Not an error.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn get(&self, i: usize) -> Option<&ResultRow> {
        self.rows.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResultRow> {
        self.rows.iter()
    }

    pub fn aliases(&self) -> &[String] {
        &self.layout.names
    }

    pub fn contains(&self, row: &ResultRow) -> bool {
        self.rows.contains(row)
    }
}

impl std::ops::Index<usize> for ResultSet {
    type Output = ResultRow;

    fn index(&self, i: usize) -> &ResultRow {
        &self.rows[i]
    }
}

impl IntoIterator for ResultSet {
    type Item = ResultRow;
    type IntoIter = std::vec::IntoIter<ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ResultRow;
    type IntoIter = std::slice::Iter<'a, ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

// ============================================================================
// TemplateParams
// ============================================================================

/// Pre-supplied alias bindings for Generate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateParams {
    values: HashMap<String, ElementHandle>,
}

impl TemplateParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, alias: impl Into<String>, el: ElementHandle) -> &mut Self {
        self.values.insert(alias.into(), el);
        self
    }

    pub fn with(mut self, alias: impl Into<String>, el: ElementHandle) -> Self {
        self.add(alias, el);
        self
    }

    pub fn get(&self, alias: &str) -> Option<ElementHandle> {
        self.values.get(alias).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ElementHandle)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, ElementHandle)> for TemplateParams {
    fn from_iter<I: IntoIterator<Item = (K, ElementHandle)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.add(k, v);
        }
        params
    }
}
