//! Bounded readiness event queue
//!
//! Written by the socket notifier from inside multiplexer calls and drained by
//! the I/O task. The queue never grows past its capacity: an event pushed into
//! a full queue is dropped and counted.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::engine::event::ReadinessEvent;

/// Default number of events the queue holds.
pub const DEFAULT_CAPACITY: usize = 64;

/// Order in which queued events are handed to the I/O task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueOrder {
    /// Oldest event first.
    #[default]
    Fifo,
    /// Most recently pushed event first (stack order).
    Lifo,
}

/// Fixed-capacity queue of [`ReadinessEvent`]s.
#[derive(Debug)]
pub struct EventQueue {
    events: VecDeque<ReadinessEvent>,
    capacity: usize,
    order: QueueOrder,
    dropped: u64,
}

impl EventQueue {
    pub fn new(capacity: usize, order: QueueOrder) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            order,
            dropped: 0,
        }
    }

    /// Append an event.
    ///
    /// Returns `false` when the queue is full; the event is discarded and the
    /// queued events are left untouched.
    pub fn push(&mut self, event: ReadinessEvent) -> bool {
        if self.events.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.events.push_back(event);
        true
    }

    /// Take the next event according to the queue order.
    pub fn pop(&mut self) -> Option<ReadinessEvent> {
        match self.order {
            QueueOrder::Fifo => self.events.pop_front(),
            QueueOrder::Lifo => self.events.pop_back(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.events.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
