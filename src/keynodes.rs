//! # Keynodes
//!
//! Well-known nodes resolved by a stable, human-readable system identifier.
//!
//! An identifier is stored in the graph itself:
//!
//! ```text
//! element ==(dcommon const)==> link "name"
//!                 ▲
//!   nrel_system_identifier ──(access const pos perm)──┘
//! ```
//!
//! The `nrel_system_identifier` relation node carries its own identifier,
//! so the first lookup on a fresh graph bootstraps itself. Lookups are
//! memoized per [`KeynodeCache`]; each graph owns its own cache.

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};

use crate::model::{ElementHandle, LinkContent, Type};
use crate::storage::ElementStore;
use crate::{Error, Result};

/// Identifier of the relation that attaches identifiers.
pub const NREL_SYSTEM_IDENTIFIER: &str = "nrel_system_identifier";

// ============================================================================
// System identifiers
// ============================================================================

/// Is `edge` attributed by `relation` with a const pos perm access arc?
fn has_attribute<S: ElementStore + ?Sized>(store: &S, relation: ElementHandle, edge: ElementHandle) -> Result<bool> {
    store.has_edge(relation, edge, Type::EDGE_ACCESS_CONST_POS_PERM)
}

/// Identifier arcs `element ==> link` for every link holding `name`.
fn identifier_arcs<S: ElementStore + ?Sized>(store: &S, name: &str) -> Result<Vec<(ElementHandle, ElementHandle)>> {
    let mut arcs = Vec::new();
    for link in store.find_links_by_content(&LinkContent::from(name)) {
        for edge in store.incoming(link)? {
            if !Type::EDGE_DCOMMON_CONST.matches(store.element_type(edge)?) {
                continue;
            }
            let ends = store.edge_ends(edge)?;
            if ends.target == link {
                arcs.push((ends.source, edge));
            }
        }
    }
    Ok(arcs)
}

/// The self-describing identifier relation, if the graph has one.
pub fn system_identifier_relation<S: ElementStore + ?Sized>(store: &S) -> Result<Option<ElementHandle>> {
    for (el, edge) in identifier_arcs(store, NREL_SYSTEM_IDENTIFIER)? {
        if has_attribute(store, el, edge)? {
            return Ok(Some(el));
        }
    }
    Ok(None)
}

fn ensure_relation<S: ElementStore + ?Sized>(store: &S) -> Result<ElementHandle> {
    if let Some(relation) = system_identifier_relation(store)? {
        return Ok(relation);
    }
    let relation = store.create_node(Type::NODE_CONST_NOROLE)?;
    attach_identifier(store, relation, relation, NREL_SYSTEM_IDENTIFIER)?;
    tracing::debug!(%relation, "identifier relation bootstrapped");
    Ok(relation)
}

fn attach_identifier<S: ElementStore + ?Sized>(
    store: &S,
    relation: ElementHandle,
    el: ElementHandle,
    name: &str,
) -> Result<ElementHandle> {
    let link = store.create_link(Type::LINK_CONST)?;
    store.set_link_content(link, LinkContent::from(name))?;
    let arc = store.create_edge(Type::EDGE_DCOMMON_CONST, el, link)?;
    store.create_edge(Type::EDGE_ACCESS_CONST_POS_PERM, relation, arc)?;
    Ok(link)
}

/// Element named `name`, if any.
pub fn find_by_system_identifier<S: ElementStore + ?Sized>(store: &S, name: &str) -> Result<Option<ElementHandle>> {
    let Some(relation) = system_identifier_relation(store)? else {
        return Ok(None);
    };
    if name == NREL_SYSTEM_IDENTIFIER {
        return Ok(Some(relation));
    }
    for (el, edge) in identifier_arcs(store, name)? {
        if has_attribute(store, relation, edge)? {
            return Ok(Some(el));
        }
    }
    Ok(None)
}

/// Name `el` as `name`. Returns the link holding the identifier.
///
/// Not synchronized: the check and the attach are separate store calls.
/// Callers serialize through [`KeynodeCache::set_system_identifier`].
fn name_element<S: ElementStore + ?Sized>(store: &S, el: ElementHandle, name: &str) -> Result<ElementHandle> {
    store.element_type(el)?;
    if name.is_empty() {
        return Err(Error::MalformedTemplate("empty system identifier".into()));
    }
    let relation = ensure_relation(store)?;
    match find_by_system_identifier(store, name)? {
        Some(owner) if owner != el => Err(Error::IdentifierTaken { name: name.to_string(), element: owner }),
        Some(_) => {
            let existing = identifier_arcs(store, name)?
                .into_iter()
                .find(|(owner, _)| *owner == el)
                .map(|(_, arc)| store.edge_ends(arc).map(|ends| ends.target));
            match existing {
                Some(link) => link,
                None => attach_identifier(store, relation, el, name),
            }
        }
        None => attach_identifier(store, relation, el, name),
    }
}

/// System identifier carried by `el`, if any.
pub fn system_identifier_of<S: ElementStore + ?Sized>(store: &S, el: ElementHandle) -> Result<Option<String>> {
    let Some(relation) = system_identifier_relation(store)? else {
        return Ok(None);
    };
    for edge in store.outgoing(el)? {
        if !Type::EDGE_DCOMMON_CONST.matches(store.element_type(edge)?) {
            continue;
        }
        let ends = store.edge_ends(edge)?;
        if ends.source != el || !store.element_type(ends.target)?.is_link() {
            continue;
        }
        if !has_attribute(store, relation, edge)? {
            continue;
        }
        if let Some(LinkContent::String(name)) = store.link_content(ends.target)? {
            return Ok(Some(name));
        }
    }
    Ok(None)
}

// ============================================================================
// KeynodeCache
// ============================================================================

/// Memoized name → handle resolver, one per graph.
///
/// Every write of a system identifier goes through the cache's naming lock,
/// so one name never ends up on two elements. A store shared by several
/// caches gets no such guarantee.
#[derive(Debug, Default)]
pub struct KeynodeCache {
    cache: RwLock<HashMap<String, ElementHandle>>,
    naming: Mutex<()>,
}

impl KeynodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle named `name`. Cached handles that were deleted since are
    /// looked up again.
    pub fn resolve<S: ElementStore + ?Sized>(&self, store: &S, name: &str) -> Result<ElementHandle> {
        if let Some(el) = self.lookup(store, name)? {
            return Ok(el);
        }
        Err(Error::KeynodeNotFound(name.to_string()))
    }

    /// Like [`resolve`](Self::resolve), creating a node of type `ty` and
    /// naming it when the graph has none.
    pub fn resolve_or_create<S: ElementStore + ?Sized>(&self, store: &S, name: &str, ty: Type) -> Result<ElementHandle> {
        if let Some(el) = self.lookup(store, name)? {
            return Ok(el);
        }

        let _naming = self.naming.lock();
        // Another thread may have created it while we waited.
        if let Some(el) = self.lookup(store, name)? {
            return Ok(el);
        }
        let el = store.create_node(ty)?;
        if let Err(e) = name_element(store, el, name) {
            store.delete_element(el);
            return Err(e);
        }
        tracing::debug!(name, %el, "keynode created");
        self.cache.write().insert(name.to_string(), el);
        Ok(el)
    }

    /// Name `el` as `name`. Returns the link holding the identifier.
    ///
    /// Fails with [`Error::IdentifierTaken`] if another element already carries
    /// that name; naming the same element twice is a no-op.
    pub fn set_system_identifier<S: ElementStore + ?Sized>(
        &self,
        store: &S,
        el: ElementHandle,
        name: &str,
    ) -> Result<ElementHandle> {
        let link = {
            let _naming = self.naming.lock();
            name_element(store, el, name)?
        };
        self.cache.write().insert(name.to_string(), el);
        Ok(link)
    }

    fn lookup<S: ElementStore + ?Sized>(&self, store: &S, name: &str) -> Result<Option<ElementHandle>> {
        let cached = self.cache.read().get(name).copied();
        if let Some(el) = cached {
            if store.is_element(el) {
                return Ok(Some(el));
            }
            self.invalidate(name);
        }
        let found = find_by_system_identifier(store, name)?;
        if let Some(el) = found {
            tracing::trace!(name, %el, "keynode resolved");
            self.cache.write().insert(name.to_string(), el);
        }
        Ok(found)
    }

    pub fn cached(&self, name: &str) -> Option<ElementHandle> {
        self.cache.read().get(name).copied()
    }

    pub fn invalidate(&self, name: &str) -> bool {
        self.cache.write().remove(name).is_some()
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
