//! Held events.
//!
//! A [`PendingSink`] sits between a store and the real sink. While a thread
//! holds events, everything that thread emits is buffered; closing the hold
//! either forwards the buffer in order or drops it. Other threads are not
//! affected.
//!
//! Holds nest. Dropping an inner hold drops only what was emitted since it
//! was opened; delivery happens when the outermost hold closes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::ThreadId;

use hashbrown::HashMap;
use parking_lot::Mutex;

use super::{EventData, EventSink};

#[derive(Default)]
struct Held {
    /// Buffer length at each open hold, innermost last.
    marks: Vec<usize>,
    events: Vec<EventData>,
}

/// Sink wrapper buffering per-thread held events.
pub struct PendingSink {
    inner: Arc<dyn EventSink>,
    held: Mutex<HashMap<ThreadId, Held>>,
    /// Number of threads with an open hold; skips the map when zero.
    holders: AtomicUsize,
}

impl PendingSink {
    pub fn new(inner: Arc<dyn EventSink>) -> Self {
        Self { inner, held: Mutex::new(HashMap::new()), holders: AtomicUsize::new(0) }
    }

    /// Open a hold for the calling thread.
    pub fn hold(&self) {
        let mut held = self.held.lock();
        let entry = held.entry(std::thread::current().id()).or_default();
        if entry.marks.is_empty() {
            self.holders.fetch_add(1, Ordering::AcqRel);
        }
        entry.marks.push(entry.events.len());
    }

    /// Close the calling thread's innermost hold. With `deliver` false the
    /// events emitted since it opened are dropped. Returns the number of
    /// events forwarded.
    pub fn release(&self, deliver: bool) -> usize {
        let id = std::thread::current().id();
        let flushed = {
            let mut held = self.held.lock();
            let Some(entry) = held.get_mut(&id) else { return 0 };
            let Some(mark) = entry.marks.pop() else { return 0 };
            if !deliver {
                let dropped = entry.events.len() - mark;
                entry.events.truncate(mark);
                if dropped > 0 {
                    tracing::debug!(dropped, "held events dropped");
                }
            }
            if !entry.marks.is_empty() {
                return 0;
            }
            self.holders.fetch_sub(1, Ordering::AcqRel);
            held.remove(&id).map(|h| h.events).unwrap_or_default()
        };
        let count = flushed.len();
        for event in flushed {
            self.inner.emit(event);
        }
        count
    }

    /// Does the calling thread hold events?
    pub fn is_holding(&self) -> bool {
        self.holders.load(Ordering::Acquire) > 0
            && self.held.lock().get(&std::thread::current().id()).is_some_and(|h| !h.marks.is_empty())
    }
}

impl EventSink for PendingSink {
    fn emit(&self, event: EventData) {
        if self.holders.load(Ordering::Acquire) > 0 {
            let mut held = self.held.lock();
            if let Some(entry) = held.get_mut(&std::thread::current().id()) {
                if !entry.marks.is_empty() {
                    entry.events.push(event);
                    return;
                }
            }
        }
        self.inner.emit(event);
    }
}

impl std::fmt::Debug for PendingSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingSink")
            .field("holders", &self.holders.load(Ordering::Relaxed))
            .finish()
    }
}
