//! # Element Store Interface
//!
//! The contract between the query engines and whatever allocates elements.
//! Search, Generate, the keynode resolver and the SCs front-end only ever
//! talk to an [`ElementStore`].
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory reference store for testing/embedding |
//!
//! Failures of the store primitives surface as [`Error::InvalidHandle`]:
//! asking about a null or deleted handle is never a panic.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::{Error, Result};

pub use memory::MemoryStore;

// ============================================================================
// Store configuration
// ============================================================================

/// Configuration for the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Expected number of elements; pre-sizes the element table.
    pub initial_capacity: usize,
}

// ============================================================================
// ElementStore trait
// ============================================================================

/// Minimal element storage primitives.
///
/// Implementations must be internally synchronized: every method takes
/// `&self` and may be called from many threads at once. No isolation is
/// promised between a reader and concurrent writers.
pub trait ElementStore: Send + Sync {
    // ========================================================================
    // Creation
    // ========================================================================

    /// Create a node. `ty` may omit the node sort bit; any other sort is a
    /// [`Error::TypeConflict`].
    fn create_node(&self, ty: Type) -> Result<ElementHandle>;

    /// Create a link (const unless `ty` says otherwise) with no content.
    fn create_link(&self, ty: Type) -> Result<ElementHandle>;

    /// Create an edge. `ty` must carry exactly one edge sort; both ends
    /// must exist and may themselves be edges.
    fn create_edge(&self, ty: Type, source: ElementHandle, target: ElementHandle) -> Result<ElementHandle>;

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Delete an element together with every edge incident to it,
    /// recursively. Returns false if the handle did not name an element.
    fn delete_element(&self, el: ElementHandle) -> bool;

    // ========================================================================
    // Inspection
    // ========================================================================

    fn is_element(&self, el: ElementHandle) -> bool;

    fn element_type(&self, el: ElementHandle) -> Result<Type>;

    /// Source and target of an edge. [`Error::InvalidHandle`] for non-edges.
    fn edge_ends(&self, edge: ElementHandle) -> Result<EdgeEnds>;

    /// Edges that can be traversed *from* `el`: arcs whose source is `el`
    /// and undirected edges touching `el`.
    fn outgoing(&self, el: ElementHandle) -> Result<Vec<ElementHandle>>;

    /// Edges that can be traversed *into* `el`: arcs whose target is `el`
    /// and undirected edges touching `el`.
    fn incoming(&self, el: ElementHandle) -> Result<Vec<ElementHandle>>;

    /// Every edge in the store. Used when no position of a triple is fixed.
    fn edges(&self) -> Vec<ElementHandle>;

    fn element_count(&self) -> usize;

    // ========================================================================
    // Link content
    // ========================================================================

    fn set_link_content(&self, link: ElementHandle, content: LinkContent) -> Result<()>;

    fn link_content(&self, link: ElementHandle) -> Result<Option<LinkContent>>;

    fn find_links_by_content(&self, content: &LinkContent) -> Vec<ElementHandle>;

    // ========================================================================
    // Event holds
    // ========================================================================

    /// Buffer the calling thread's mutation events until the matching
    /// [`release_events`](Self::release_events). Holds nest. Stores without
    /// events ignore this.
    fn hold_events(&self) {}

    /// Close the innermost hold; `deliver` false drops what it buffered.
    fn release_events(&self, _deliver: bool) {}

    // ========================================================================
    // Provided helpers
    // ========================================================================

    /// Fetch a full element record.
    fn element(&self, el: ElementHandle) -> Result<Element> {
        let ty = self.element_type(el)?;
        if ty.is_edge() {
            Ok(Element::edge(el, ty, self.edge_ends(el)?))
        } else if ty.is_link() {
            let mut record = Element::link(el, ty);
            record.body = ElementBody::Link(self.link_content(el)?);
            Ok(record)
        } else {
            Ok(Element::node(el, ty))
        }
    }

    /// Is there an edge `source → target` whose type matches `ty`?
    fn has_edge(&self, source: ElementHandle, target: ElementHandle, ty: Type) -> Result<bool> {
        for edge in self.outgoing(source)? {
            let ends = self.edge_ends(edge)?;
            if ends.other_end(source) == Some(target) && ty.matches(self.element_type(edge)?) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Check that `ty` can be used to create an element of `sort`.
pub(crate) fn creation_type(ty: Type, sort: Type) -> Result<Type> {
    let composed = ty.compose(sort)?;
    if !composed.is_valid() {
        return Err(Error::TypeConflict {
            left: ty,
            right: sort,
            message: "creation needs exactly one element sort".into(),
        });
    }
    Ok(composed)
}
