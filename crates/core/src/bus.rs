// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pub/sub event bus with per-subscriber queues.
//!
//! Fan-out to multiple subscribers, each with its own unbounded FIFO so a
//! slow subscriber never blocks publishers or other subscribers. Closing the
//! bus enqueues a [`Event::Shutdown`] sentinel on every queue; publishes
//! after close are dropped silently.

use crate::event::Event;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Default)]
struct BusInner {
    subscribers: Vec<mpsc::UnboundedSender<Event>>,
    closed: bool,
}

/// Process-local event bus.
///
/// Cloning is cheap; all clones share the subscriber list. Delivery order is
/// preserved per subscriber; no cross-subscriber ordering is guaranteed.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new subscriber queue.
    ///
    /// The queue receives all events published after subscription, then the
    /// shutdown sentinel when the bus closes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().subscribers.push(tx);
        rx
    }

    /// Publish an event to every subscriber queue without blocking.
    ///
    /// Dropped silently if the bus is closed. Subscribers whose receiver has
    /// been dropped are pruned.
    pub fn publish(&self, event: Event) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        inner
            .subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Signal subscribers to drain and exit.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        for tx in &inner.subscribers {
            let _ = tx.send(Event::Shutdown);
        }
        inner.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
