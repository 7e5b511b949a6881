//! Subscription registry.
//!
//! Maps subscription id → (target, kind, callback) and keeps a reverse index
//! `(target, kind) → ids` for fan-out. All operations are safe under
//! concurrent access; callbacks never run while the registry lock is held.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;

use super::{EventCallback, EventData, EventKind, EventSink, SubscriptionId};
use crate::model::ElementHandle;
use crate::{Error, Result};

/// A live subscription.
#[derive(Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub target: ElementHandle,
    pub kind: EventKind,
    callback: Arc<dyn EventCallback>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("kind", &self.kind)
            .finish()
    }
}

#[derive(Default)]
struct RegistryInner {
    subscriptions: HashMap<SubscriptionId, Subscription>,
    by_target: HashMap<(ElementHandle, EventKind), SmallVec<[SubscriptionId; 4]>>,
}

impl RegistryInner {
    fn detach(&mut self, id: SubscriptionId) -> Option<Subscription> {
        let sub = self.subscriptions.remove(&id)?;
        let key = (sub.target, sub.kind);
        if let Some(ids) = self.by_target.get_mut(&key) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.by_target.remove(&key);
            }
        }
        Some(sub)
    }
}

/// Thread-safe subscription table of one graph.
pub struct EventRegistry {
    inner: RwLock<RegistryInner>,
    next_id: AtomicU64,
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a closure for `kind` events on `target`.
    pub fn subscribe<F>(&self, target: ElementHandle, kind: EventKind, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&EventData) + Send + Sync + 'static,
    {
        self.subscribe_callback(target, kind, Arc::new(callback))
    }

    /// Register a typed callback object for `kind` events on `target`.
    pub fn subscribe_callback(
        &self,
        target: ElementHandle,
        kind: EventKind,
        callback: Arc<dyn EventCallback>,
    ) -> Result<SubscriptionId> {
        if target.is_null() {
            return Err(Error::InvalidHandle(target));
        }
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut inner = self.inner.write();
        inner.subscriptions.insert(id, Subscription { id, target, kind, callback });
        inner.by_target.entry((target, kind)).or_default().push(id);
        tracing::debug!(%id, %target, ?kind, "subscribed");
        Ok(id)
    }

    /// Remove a subscription. Unknown or already removed ids are a no-op;
    /// returns whether something was removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.inner.write().detach(id).is_some();
        if removed {
            tracing::debug!(%id, "unsubscribed");
        }
        removed
    }

    /// Invoke one subscription's callback synchronously on the calling thread.
    ///
    /// An unknown id is logged and reported as [`Error::SubscriptionNotFound`];
    /// callers are free to ignore it.
    pub fn dispatch(&self, id: SubscriptionId, event: &EventData) -> Result<()> {
        let callback = self.inner.read().subscriptions.get(&id).map(|s| Arc::clone(&s.callback));
        match callback {
            Some(callback) => {
                invoke(id, callback.as_ref(), event);
                Ok(())
            }
            None => {
                tracing::warn!(%id, kind = ?event.kind, subject = %event.subject, "dispatch to unknown subscription ignored");
                Err(Error::SubscriptionNotFound(id))
            }
        }
    }

    /// Deliver `event` to every subscription on `(event.subject, event.kind)`.
    /// Returns the number of callbacks invoked.
    ///
    /// After an [`EventKind::ElementErased`] event has been delivered, all
    /// subscriptions targeting the erased element are dropped.
    pub fn notify(&self, event: &EventData) -> usize {
        let targets: SmallVec<[SubscriptionId; 4]> = self
            .inner
            .read()
            .by_target
            .get(&(event.subject, event.kind))
            .cloned()
            .unwrap_or_default();

        let mut delivered = 0;
        for id in targets {
            // A callback earlier in this loop may have unsubscribed `id`.
            if self.dispatch_quiet(id, event) {
                delivered += 1;
            }
        }

        if event.kind == EventKind::ElementErased {
            let dropped = self.drop_target(event.subject);
            if dropped > 0 {
                tracing::debug!(subject = %event.subject, dropped, "subscriptions of erased element dropped");
            }
        }
        delivered
    }

    fn dispatch_quiet(&self, id: SubscriptionId, event: &EventData) -> bool {
        let callback = self.inner.read().subscriptions.get(&id).map(|s| Arc::clone(&s.callback));
        match callback {
            Some(callback) => {
                invoke(id, callback.as_ref(), event);
                true
            }
            None => false,
        }
    }

    fn drop_target(&self, target: ElementHandle) -> usize {
        let mut inner = self.inner.write();
        let ids: Vec<SubscriptionId> = inner
            .subscriptions
            .values()
            .filter(|s| s.target == target)
            .map(|s| s.id)
            .collect();
        for id in &ids {
            inner.detach(*id);
        }
        ids.len()
    }

    pub fn get(&self, id: SubscriptionId) -> Option<Subscription> {
        self.inner.read().subscriptions.get(&id).cloned()
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.inner.read().subscriptions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for EventRegistry {
    fn emit(&self, event: EventData) {
        self.notify(&event);
    }
}

fn invoke(id: SubscriptionId, callback: &dyn EventCallback, event: &EventData) {
    if catch_unwind(AssertUnwindSafe(|| callback.on_event(event))).is_err() {
        tracing::warn!(%id, kind = ?event.kind, subject = %event.subject, "event callback panicked");
    }
}
