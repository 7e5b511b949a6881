//! Background event dispatch.
//!
//! A single dispatcher thread drains a `crossbeam-channel` queue and hands
//! each record to [`EventRegistry::notify`]. One consumer means FIFO, which
//! is what gives per-subscription in-order delivery.

use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use super::{EventConfig, EventData, EventRegistry, EventSink};
use crate::{Error, Result};

enum QueueMessage {
    Event(EventData),
    /// Barrier: acknowledged once everything queued before it was dispatched.
    Flush(Sender<()>),
    Shutdown,
}

/// Owner of the dispatcher thread. Dropping it stops and joins the thread.
pub struct EventQueue {
    tx: Sender<QueueMessage>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl EventQueue {
    pub fn start(registry: Arc<EventRegistry>, config: &EventConfig) -> Result<Self> {
        let (tx, rx) = match config.queue_capacity {
            Some(cap) => crossbeam_channel::bounded(cap.max(1)),
            None => crossbeam_channel::unbounded(),
        };

        let worker = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run(registry, rx))
            .map_err(|e| {
                tracing::error!(error = %e, "failed to start event dispatcher");
                Error::Storage(format!("event dispatcher thread: {e}"))
            })?;
        let worker_id = worker.thread().id();

        Ok(Self { tx, worker: Some(worker), worker_id })
    }

    /// A cloneable sink feeding this queue.
    pub fn sink(&self) -> QueueSink {
        QueueSink { tx: self.tx.clone(), worker_id: self.worker_id }
    }

    /// Wait until all events enqueued before this call were dispatched.
    ///
    /// Called from inside a callback (i.e. on the dispatcher thread) it
    /// returns immediately, since waiting there could never finish.
    pub fn flush(&self) -> Result<()> {
        if std::thread::current().id() == self.worker_id {
            return Ok(());
        }
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.tx.send(QueueMessage::Flush(ack_tx)).map_err(|_| Error::EventQueueClosed)?;
        ack_rx.recv().map_err(|_| Error::EventQueueClosed)
    }

    pub fn pending(&self) -> usize {
        self.tx.len()
    }
}

impl Drop for EventQueue {
    fn drop(&mut self) {
        let _ = self.tx.send(QueueMessage::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("event dispatcher thread panicked");
            }
        }
    }
}

fn run(registry: Arc<EventRegistry>, rx: Receiver<QueueMessage>) {
    tracing::debug!("event dispatcher started");
    while let Ok(msg) = rx.recv() {
        match msg {
            QueueMessage::Event(event) => {
                let delivered = registry.notify(&event);
                tracing::trace!(kind = ?event.kind, subject = %event.subject, delivered, "event dispatched");
            }
            QueueMessage::Flush(ack) => {
                let _ = ack.send(());
            }
            QueueMessage::Shutdown => break,
        }
    }
    tracing::debug!("event dispatcher stopped");
}

/// Producer side of an [`EventQueue`].
#[derive(Clone)]
pub struct QueueSink {
    tx: Sender<QueueMessage>,
    worker_id: ThreadId,
}

impl EventSink for QueueSink {
    fn emit(&self, event: EventData) {
        // A callback mutating the graph runs on the dispatcher itself; blocking
        // on a full bounded queue there would wait on our own thread.
        if std::thread::current().id() == self.worker_id {
            match self.tx.try_send(QueueMessage::Event(event)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(kind = ?event.kind, subject = %event.subject, "event queue full, event dropped");
                }
                Err(TrySendError::Disconnected(_)) => {
                    tracing::trace!("event queue closed");
                }
            }
            return;
        }
        if self.tx.send(QueueMessage::Event(event)).is_err() {
            tracing::trace!(kind = ?event.kind, "event queue closed, event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::model::{ElementHandle, Type};
    use parking_lot::Mutex;

    #[test]
    fn test_background_delivery_in_order() {
        let registry = Arc::new(EventRegistry::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        registry
            .subscribe(ElementHandle(1), EventKind::OutgoingArcAdded, move |e| s.lock().push(e.edge))
            .unwrap();

        let queue = EventQueue::start(Arc::clone(&registry), &EventConfig::default()).unwrap();
        let sink = queue.sink();
        for i in 0..50u32 {
            sink.emit(EventData::arc(
                EventKind::OutgoingArcAdded,
                ElementHandle(1),
                ElementHandle(1000 + i),
                ElementHandle(2),
                Type::EDGE_ACCESS_CONST_POS_PERM,
            ));
        }
        queue.flush().unwrap();

        let expected: Vec<ElementHandle> = (0..50u32).map(|i| ElementHandle(1000 + i)).collect();
        assert_eq!(*seen.lock(), expected);
    }

    #[test]
    fn test_bounded_queue() {
        let registry = Arc::new(EventRegistry::new());
        let config = EventConfig { queue_capacity: Some(2), ..EventConfig::default() };
        let queue = EventQueue::start(registry, &config).unwrap();
        let sink = queue.sink();
        for _ in 0..10 {
            sink.emit(EventData::element(EventKind::ElementErased, ElementHandle(3), Type::NODE_CONST));
        }
        queue.flush().unwrap();
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_emit_after_drop_is_silent() {
        let registry = Arc::new(EventRegistry::new());
        let queue = EventQueue::start(registry, &EventConfig::default()).unwrap();
        let sink = queue.sink();
        drop(queue);
        sink.emit(EventData::element(EventKind::ElementErased, ElementHandle(3), Type::NODE_CONST));
    }
}
