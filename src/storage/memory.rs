//! In-memory element store.
//!
//! This is the reference implementation of `ElementStore`.
//! All structure (elements, adjacency, content index) lives behind one
//! `RwLock`, so every primitive is atomic on its own.
//!
//! ## Limitations
//!
//! - **No persistence**: dropping the store drops the graph.
//! - **No multi-step atomicity**: a Search running next to writers may see
//!   some of a Generate's elements and not others.
//! - **Handles are never reused**: ids come from a monotonic counter.
//!
//! - **Cross-thread event order**: events are collected while the lock is
//!   held and handed to the sink after it is released, so callbacks may call
//!   back into the store. Two threads mutating concurrently may therefore
//!   have their events delivered in a different order than their mutations
//!   took effect. Events from one thread always arrive in that thread's
//!   mutation order.
//!
//! A thread may hold its events (see [`ElementStore::hold_events`]); they are
//! buffered until released and dropped when released without delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::events::{EventData, EventKind, EventSink, NullSink, PendingSink};
use crate::model::*;
use crate::{Error, Result};
use super::{ElementStore, StoreConfig, creation_type};

type Adjacency = SmallVec<[ElementHandle; 4]>;

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory semantic graph storage. Cloning shares the same graph.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    table: RwLock<Table>,
    next_id: AtomicU32,
    events: PendingSink,
}

#[derive(Default)]
struct Table {
    elements: HashMap<ElementHandle, Element>,
    /// element → edges traversable from it
    outgoing: HashMap<ElementHandle, Adjacency>,
    /// element → edges traversable into it
    incoming: HashMap<ElementHandle, Adjacency>,
    /// content key → links carrying it
    content_index: HashMap<Vec<u8>, Adjacency>,
}

impl Table {
    fn get(&self, el: ElementHandle) -> Result<&Element> {
        self.elements.get(&el).ok_or(Error::InvalidHandle(el))
    }

    fn link_edge(&mut self, edge: ElementHandle, ty: Type, ends: EdgeEnds) {
        push_unique(self.outgoing.entry(ends.source).or_default(), edge);
        push_unique(self.incoming.entry(ends.target).or_default(), edge);
        if ty.is_undirected() {
            push_unique(self.outgoing.entry(ends.target).or_default(), edge);
            push_unique(self.incoming.entry(ends.source).or_default(), edge);
        }
    }

    fn unlink_edge(&mut self, edge: ElementHandle, ends: EdgeEnds) {
        for end in [ends.source, ends.target] {
            if let Some(list) = self.outgoing.get_mut(&end) {
                list.retain(|e| *e != edge);
            }
            if let Some(list) = self.incoming.get_mut(&end) {
                list.retain(|e| *e != edge);
            }
        }
    }

    fn unindex_content(&mut self, link: ElementHandle, content: &LinkContent) {
        let key = content.key();
        if let Some(list) = self.content_index.get_mut(&key) {
            list.retain(|l| *l != link);
            if list.is_empty() {
                self.content_index.remove(&key);
            }
        }
    }
}

fn push_unique(list: &mut Adjacency, edge: ElementHandle) {
    if !list.contains(&edge) {
        list.push(edge);
    }
}

/// Arc events for both ends of an edge.
fn arc_events(added: bool, edge: ElementHandle, ty: Type, ends: EdgeEnds, out: &mut Vec<EventData>) {
    let (out_kind, in_kind) = if added {
        (EventKind::OutgoingArcAdded, EventKind::IncomingArcAdded)
    } else {
        (EventKind::OutgoingArcRemoved, EventKind::IncomingArcRemoved)
    };
    out.push(EventData::arc(out_kind, ends.source, edge, ends.target, ty));
    out.push(EventData::arc(in_kind, ends.target, edge, ends.source, ty));
    if ty.is_undirected() && ends.source != ends.target {
        out.push(EventData::arc(out_kind, ends.target, edge, ends.source, ty));
        out.push(EventData::arc(in_kind, ends.source, edge, ends.target, ty));
    }
}

impl MemoryStore {
    /// A store that reports mutations nowhere.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default(), Arc::new(NullSink))
    }

    /// A store reporting every mutation to `events`.
    pub fn with_event_sink(events: Arc<dyn EventSink>) -> Self {
        Self::with_config(StoreConfig::default(), events)
    }

    pub fn with_config(config: StoreConfig, events: Arc<dyn EventSink>) -> Self {
        let table = Table {
            elements: HashMap::with_capacity(config.initial_capacity),
            ..Table::default()
        };
        Self {
            inner: Arc::new(MemoryInner {
                table: RwLock::new(table),
                next_id: AtomicU32::new(1),
                events: PendingSink::new(events),
            }),
        }
    }

    fn allocate(&self) -> Result<ElementHandle> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        if id == 0 || id == u32::MAX {
            return Err(Error::Storage("element handle space exhausted".into()));
        }
        Ok(ElementHandle(id))
    }

    fn emit_all(&self, events: Vec<EventData>) {
        for event in events {
            self.inner.events.emit(event);
        }
    }

    /// Collect `root` and every edge that transitively depends on it.
    /// Edges come before the elements they are attached to.
    fn dependents(table: &Table, root: ElementHandle) -> Vec<ElementHandle> {
        let mut seen: HashSet<ElementHandle> = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root];
        seen.insert(root);
        while let Some(el) = stack.pop() {
            order.push(el);
            let attached = table.outgoing.get(&el).into_iter().flatten()
                .chain(table.incoming.get(&el).into_iter().flatten());
            for edge in attached {
                if seen.insert(*edge) {
                    stack.push(*edge);
                }
            }
        }
        // Discovery order puts every element before the edges found through it.
        order.reverse();
        order
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("elements", &self.element_count())
            .finish()
    }
}

// ============================================================================
// ElementStore impl
// ============================================================================

impl ElementStore for MemoryStore {
    // ========================================================================
    // Creation
    // ========================================================================

    fn create_node(&self, ty: Type) -> Result<ElementHandle> {
        let ty = creation_type(ty, Type::NODE)?;
        let id = self.allocate()?;
        self.inner.table.write().elements.insert(id, Element::node(id, ty));
        Ok(id)
    }

    fn create_link(&self, ty: Type) -> Result<ElementHandle> {
        let mut ty = creation_type(ty, Type::LINK)?;
        if !ty.has_constancy() {
            ty = ty.union(Type::CONST);
        }
        let id = self.allocate()?;
        self.inner.table.write().elements.insert(id, Element::link(id, ty));
        Ok(id)
    }

    fn create_edge(&self, ty: Type, source: ElementHandle, target: ElementHandle) -> Result<ElementHandle> {
        if !ty.is_edge() || !ty.is_valid() {
            return Err(Error::TypeConflict {
                left: ty,
                right: Type::UNKNOWN,
                message: "edge creation needs exactly one edge sort".into(),
            });
        }

        let ends = EdgeEnds::new(source, target);
        let mut events = Vec::with_capacity(4);
        let id = {
            let mut table = self.inner.table.write();
            table.get(source)?;
            table.get(target)?;
            let id = self.allocate()?;
            table.elements.insert(id, Element::edge(id, ty, ends));
            table.link_edge(id, ty, ends);
            id
        };
        arc_events(true, id, ty, ends, &mut events);
        self.emit_all(events);
        Ok(id)
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    fn delete_element(&self, el: ElementHandle) -> bool {
        let mut events = Vec::new();
        {
            let mut table = self.inner.table.write();
            if !table.elements.contains_key(&el) {
                return false;
            }

            let doomed = Self::dependents(&table, el);
            let mut erased = Vec::with_capacity(doomed.len());
            for handle in doomed {
                let Some(element) = table.elements.remove(&handle) else { continue };
                match &element.body {
                    ElementBody::Edge(ends) => {
                        table.unlink_edge(handle, *ends);
                        arc_events(false, handle, element.ty, *ends, &mut events);
                    }
                    ElementBody::Link(Some(content)) => table.unindex_content(handle, content),
                    _ => {}
                }
                table.outgoing.remove(&handle);
                table.incoming.remove(&handle);
                erased.push(EventData::element(EventKind::ElementErased, handle, element.ty));
            }
            events.extend(erased);
        }
        tracing::trace!(%el, events = events.len(), "element deleted");
        self.emit_all(events);
        true
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    fn is_element(&self, el: ElementHandle) -> bool {
        self.inner.table.read().elements.contains_key(&el)
    }

    fn element_type(&self, el: ElementHandle) -> Result<Type> {
        Ok(self.inner.table.read().get(el)?.ty)
    }

    fn edge_ends(&self, edge: ElementHandle) -> Result<EdgeEnds> {
        self.inner.table.read().get(edge)?.ends().ok_or(Error::InvalidHandle(edge))
    }

    fn outgoing(&self, el: ElementHandle) -> Result<Vec<ElementHandle>> {
        let table = self.inner.table.read();
        table.get(el)?;
        Ok(table.outgoing.get(&el).map(|l| l.to_vec()).unwrap_or_default())
    }

    fn incoming(&self, el: ElementHandle) -> Result<Vec<ElementHandle>> {
        let table = self.inner.table.read();
        table.get(el)?;
        Ok(table.incoming.get(&el).map(|l| l.to_vec()).unwrap_or_default())
    }

    fn edges(&self) -> Vec<ElementHandle> {
        let table = self.inner.table.read();
        let mut edges: Vec<ElementHandle> = table.elements.values()
            .filter(|e| e.ty.is_edge())
            .map(|e| e.handle)
            .collect();
        edges.sort_unstable();
        edges
    }

    fn element_count(&self) -> usize {
        self.inner.table.read().elements.len()
    }

    // ========================================================================
    // Link content
    // ========================================================================

    fn set_link_content(&self, link: ElementHandle, content: LinkContent) -> Result<()> {
        let ty = {
            let mut table = self.inner.table.write();
            let element = table.get(link)?;
            let ty = element.ty;
            if !ty.is_link() {
                return Err(Error::InvalidHandle(link));
            }
            if let Some(old) = element.content().cloned() {
                table.unindex_content(link, &old);
            }
            push_unique(table.content_index.entry(content.key()).or_default(), link);
            if let Some(element) = table.elements.get_mut(&link) {
                element.body = ElementBody::Link(Some(content));
            }
            ty
        };
        self.inner.events.emit(EventData::element(EventKind::LinkContentChanged, link, ty));
        Ok(())
    }

    fn link_content(&self, link: ElementHandle) -> Result<Option<LinkContent>> {
        let table = self.inner.table.read();
        let element = table.get(link)?;
        if !element.ty.is_link() {
            return Err(Error::InvalidHandle(link));
        }
        Ok(element.content().cloned())
    }

    fn find_links_by_content(&self, content: &LinkContent) -> Vec<ElementHandle> {
        self.inner.table.read()
            .content_index
            .get(&content.key())
            .map(|l| l.to_vec())
            .unwrap_or_default()
    }

    // ========================================================================
    // Event holds
    // ========================================================================

    fn hold_events(&self) {
        self.inner.events.hold();
    }

    fn release_events(&self, deliver: bool) {
        self.inner.events.release(deliver);
    }
}

// ============================================================================
// Tests
// ============================================================================
