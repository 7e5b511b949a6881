//! # semgraph: Semantic Graph Knowledge Store
//!
//! A typed multigraph in which edges are addressable elements, queried and
//! mutated through declarative pattern templates.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `ElementStore` is the contract between the engines and storage
//! 2. **Explicit types**: `Type` is a tagged bitmask with named `compose`/`matches`
//! 3. **No singletons**: every `Graph` owns its event registry and keynode cache
//! 4. **No recursion**: search backtracks over an explicit choice-point stack
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use semgraph::{ElementStore, Graph, GraphConfig, Template, TemplateItem, TemplateParams, Type};
//!
//! # fn example() -> semgraph::Result<()> {
//! let graph = Graph::open_memory(GraphConfig::default())?;
//! let class = graph.resolve_keynode_or_create("concept_city", Type::NODE_CONST_CLASS)?;
//!
//! let mut t = Template::new();
//! t.triple(class, Type::EDGE_ACCESS_VAR_POS_PERM, TemplateItem::var_as(Type::NODE_VAR, "_city"))?;
//! graph.generate(&t, &TemplateParams::new())?;
//!
//! for row in &graph.search(&t)? {
//!     println!("{:?}", row.get("_city"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage Backends
//!
//! | Backend | Description |
//! |---------|-------------|
//! | `MemoryStore` | In-memory graph for testing/embedding |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod iterator;
pub mod template;
pub mod search;
pub mod generate;
pub mod keynodes;
pub mod events;
pub mod scs;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{EdgeEnds, Element, ElementBody, ElementHandle, LinkContent, Type};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{ElementStore, MemoryStore, StoreConfig};

// ============================================================================
// Re-exports: Templates & engines
// ============================================================================

pub use iterator::{Fact3, Fact5, Param};
pub use template::{ResultRow, ResultSet, Slot, Template, TemplateItem, TemplateParams};
pub use search::SearchControl;
pub use keynodes::KeynodeCache;

// ============================================================================
// Re-exports: Events
// ============================================================================

pub use events::{
    DispatchMode, EventCallback, EventConfig, EventData, EventKind, EventSink, SubscriptionId,
};

// ============================================================================
// Configuration
// ============================================================================

/// Per-graph configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub events: EventConfig,
    pub store: StoreConfig,
}

// ============================================================================
// Top-level Graph handle
// ============================================================================

/// The primary entry point: a store plus the event registry and keynode
/// cache scoped to it.
pub struct Graph<S: ElementStore = MemoryStore> {
    store: S,
    keynodes: KeynodeCache,
    // Declared last: the dispatcher is joined after the store is gone.
    events: events::EventHub,
}

impl<S: ElementStore> Graph<S> {
    /// Build a graph around a store. `make_store` receives the sink the
    /// store must report its mutations to.
    pub fn with_store<F>(config: &GraphConfig, make_store: F) -> Result<Self>
    where
        F: FnOnce(Arc<dyn EventSink>) -> S,
    {
        let events = events::EventHub::new(&config.events)?;
        let store = make_store(events.sink());
        tracing::debug!(mode = ?events.mode(), "graph opened");
        Ok(Self { store, keynodes: KeynodeCache::new(), events })
    }

    /// Access the underlying store (for element-level primitives).
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn keynodes(&self) -> &KeynodeCache {
        &self.keynodes
    }

    pub fn events(&self) -> &events::EventHub {
        &self.events
    }

    // ========================================================================
    // Search / Generate
    // ========================================================================

    pub fn search(&self, template: &Template) -> Result<ResultSet> {
        search::search(&self.store, template)
    }

    pub fn search_with<F>(&self, template: &Template, on_row: F) -> Result<()>
    where
        F: FnMut(&ResultRow) -> SearchControl,
    {
        search::search_with(&self.store, template, on_row)
    }

    /// Search using only facts `check` accepts; rejected facts prune the
    /// backtracking below them.
    pub fn search_checked<C>(&self, template: &Template, check: C) -> Result<ResultSet>
    where
        C: FnMut(&Fact3) -> bool,
    {
        search::search_checked(&self.store, template, check)
    }

    pub fn search_in_structure(&self, template: &Template, structure: ElementHandle) -> Result<ResultSet> {
        search::search_in_structure(&self.store, template, structure)
    }

    /// Compile the structure `structure` stored in this graph into a template.
    pub fn build_template(&self, structure: ElementHandle, params: &TemplateParams) -> Result<Template> {
        Template::from_structure(&self.store, structure, params)
    }

    pub fn generate(&self, template: &Template, params: &TemplateParams) -> Result<ResultSet> {
        generate::generate(&self.store, template, params)
    }

    /// Compile SCs text against this graph's keynodes.
    pub fn parse_scs(&self, text: &str) -> Result<Template> {
        scs::build_template(text, &self.store, &self.keynodes)
    }

    pub fn search_scs(&self, text: &str) -> Result<ResultSet> {
        self.search(&self.parse_scs(text)?)
    }

    /// Is there an edge `source → target` whose type matches `ty`?
    pub fn check_edge(&self, source: ElementHandle, target: ElementHandle, ty: Type) -> Result<bool> {
        self.store.has_edge(source, target, ty)
    }

    // ========================================================================
    // Keynodes
    // ========================================================================

    pub fn resolve_keynode(&self, name: &str) -> Result<ElementHandle> {
        self.keynodes.resolve(&self.store, name)
    }

    pub fn resolve_keynode_or_create(&self, name: &str, ty: Type) -> Result<ElementHandle> {
        self.keynodes.resolve_or_create(&self.store, name, ty)
    }

    /// Name `el`. Serialized with every other naming on this graph.
    pub fn set_system_identifier(&self, el: ElementHandle, name: &str) -> Result<ElementHandle> {
        self.keynodes.set_system_identifier(&self.store, el, name)
    }

    pub fn system_identifier_of(&self, el: ElementHandle) -> Result<Option<String>> {
        keynodes::system_identifier_of(&self.store, el)
    }

    pub fn find_by_system_identifier(&self, name: &str) -> Result<Option<ElementHandle>> {
        keynodes::find_by_system_identifier(&self.store, name)
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Call `callback` for every `kind` event on `target`.
    pub fn subscribe<F>(&self, target: ElementHandle, kind: EventKind, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&EventData) + Send + Sync + 'static,
    {
        self.subscribe_callback(target, kind, Arc::new(callback))
    }

    pub fn subscribe_callback(
        &self,
        target: ElementHandle,
        kind: EventKind,
        callback: Arc<dyn EventCallback>,
    ) -> Result<SubscriptionId> {
        if !self.store.is_element(target) {
            return Err(Error::InvalidHandle(target));
        }
        self.events.registry().subscribe_callback(target, kind, callback)
    }

    /// Idempotent: returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.registry().unsubscribe(id)
    }

    /// Block until every event caused so far has been delivered.
    pub fn flush_events(&self) -> Result<()> {
        self.events.flush()
    }
}

/// In-memory graph for testing and embedding.
impl Graph<MemoryStore> {
    pub fn open_memory(config: GraphConfig) -> Result<Self> {
        let store_config = config.store.clone();
        Self::with_store(&config, move |sink| MemoryStore::with_config(store_config, sink))
    }
}

impl<S: ElementStore> std::fmt::Debug for Graph<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("elements", &self.store.element_count())
            .field("keynodes", &self.keynodes.len())
            .field("events", &self.events)
            .finish()
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid element handle {0}")]
    InvalidHandle(ElementHandle),

    #[error("Type conflict between {left} and {right}: {message}")]
    TypeConflict { left: Type, right: Type, message: String },

    #[error("Malformed template: {0}")]
    MalformedTemplate(String),

    #[error("Subscription {0} not found")]
    SubscriptionNotFound(SubscriptionId),

    #[error("SCs syntax error at position {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("Keynode not found: {0}")]
    KeynodeNotFound(String),

    #[error("System identifier '{name}' already names {element}")]
    IdentifierTaken { name: String, element: ElementHandle },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Event queue closed")]
    EventQueueClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
