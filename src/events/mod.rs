//! # Mutation Events
//!
//! Subscribers register a callback for one element and one [`EventKind`];
//! the store reports every mutation as an [`EventData`] record to an
//! [`EventSink`], which either dispatches immediately or hands the record to
//! a background [`EventQueue`].
//!
//! ```text
//! MemoryStore ──emit──▶ EventSink ──┬─ Inline ─────────▶ EventRegistry::notify ─▶ callbacks
//!                                   └─ Background ─▶ EventQueue thread ─▶ notify ─▶ callbacks
//! ```
//!
//! Every registry and queue belongs to one graph instance; nothing here is
//! process-global.

pub mod registry;
pub mod queue;
pub mod pending;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::{ElementHandle, Type};
use crate::Result;

pub use pending::PendingSink;
pub use queue::EventQueue;
pub use registry::{EventRegistry, Subscription};

// ============================================================================
// Event kinds and payload
// ============================================================================

/// The six mutation event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// An edge leaving the subject was created.
    OutgoingArcAdded,
    /// An edge entering the subject was created.
    IncomingArcAdded,
    /// An edge leaving the subject was deleted.
    OutgoingArcRemoved,
    /// An edge entering the subject was deleted.
    IncomingArcRemoved,
    /// The subject is a link and its content was replaced.
    LinkContentChanged,
    /// The subject itself was deleted.
    ElementErased,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::OutgoingArcAdded,
        EventKind::IncomingArcAdded,
        EventKind::OutgoingArcRemoved,
        EventKind::IncomingArcRemoved,
        EventKind::LinkContentChanged,
        EventKind::ElementErased,
    ];
}

/// One notification.
///
/// For arc events `edge` is the edge and `other` its opposite end; for the
/// other kinds both are [`ElementHandle::NULL`]. `ty` is the edge's type for
/// arc events and the subject's type otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventData {
    pub kind: EventKind,
    pub subject: ElementHandle,
    pub edge: ElementHandle,
    pub other: ElementHandle,
    pub ty: Type,
}

impl EventData {
    pub fn arc(kind: EventKind, subject: ElementHandle, edge: ElementHandle, other: ElementHandle, ty: Type) -> Self {
        Self { kind, subject, edge, other, ty }
    }

    pub fn element(kind: EventKind, subject: ElementHandle, ty: Type) -> Self {
        Self { kind, subject, edge: ElementHandle::NULL, other: ElementHandle::NULL, ty }
    }
}

// ============================================================================
// Callback / sink abstractions
// ============================================================================

/// Unique id of a live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Typed callback registered per subscription.
///
/// Invoked on the dispatcher's thread with no registry lock held, so the
/// callback may itself subscribe, unsubscribe or mutate the graph.
pub trait EventCallback: Send + Sync {
    fn on_event(&self, event: &EventData);
}

impl<F> EventCallback for F
where
    F: Fn(&EventData) + Send + Sync,
{
    fn on_event(&self, event: &EventData) {
        self(event)
    }
}

/// Where a store reports its mutations.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EventData);
}

/// Sink that discards everything. Used by stores created without events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: EventData) {}
}

// ============================================================================
// Configuration
// ============================================================================

/// Execution context for event delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DispatchMode {
    /// Callbacks run on the mutating thread, after the store lock is released.
    Inline,
    /// Callbacks run on one dedicated dispatcher thread, in FIFO order.
    #[default]
    Background,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    pub mode: DispatchMode,
    /// Bound of the background queue; `None` means unbounded.
    pub queue_capacity: Option<usize>,
    pub thread_name: String,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Background,
            queue_capacity: None,
            thread_name: "semgraph-events".into(),
        }
    }
}

// ============================================================================
// EventHub: registry plus delivery, owned by one graph
// ============================================================================

/// The per-graph event state: registry plus the chosen delivery path.
pub struct EventHub {
    registry: Arc<EventRegistry>,
    queue: Option<EventQueue>,
}

impl EventHub {
    pub fn new(config: &EventConfig) -> Result<Self> {
        let registry = Arc::new(EventRegistry::new());
        let queue = match config.mode {
            DispatchMode::Inline => None,
            DispatchMode::Background => Some(EventQueue::start(Arc::clone(&registry), config)?),
        };
        Ok(Self { registry, queue })
    }

    /// The sink a store should report to.
    pub fn sink(&self) -> Arc<dyn EventSink> {
        match &self.queue {
            Some(queue) => Arc::new(queue.sink()),
            None => Arc::clone(&self.registry) as Arc<dyn EventSink>,
        }
    }

    pub fn registry(&self) -> &Arc<EventRegistry> {
        &self.registry
    }

    pub fn mode(&self) -> DispatchMode {
        if self.queue.is_some() { DispatchMode::Background } else { DispatchMode::Inline }
    }

    /// Block until every event emitted before this call has been dispatched.
    /// A no-op for inline delivery.
    pub fn flush(&self) -> Result<()> {
        match &self.queue {
            Some(queue) => queue.flush(),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("mode", &self.mode())
            .field("subscriptions", &self.registry.len())
            .finish()
    }
}
