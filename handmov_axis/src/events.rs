//! Event queue and cancellation.
//!
//! Producers on other threads (GPIO interrupt handlers, a command socket,
//! the signal handler) push [`AxisEvent`]s; the controller drains them on its
//! own thread at step boundaries and between commands, so axis state is only
//! ever mutated from one execution context.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use handmov_common::consts::EVENT_QUEUE_CAPACITY;
use handmov_common::io::Edge;
use heapless::Deque;
use parking_lot::Mutex;
use tracing::warn;

use crate::motion::{StepControl, StepHook};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisEvent {
    /// Raw edge from a button line, not yet debounced.
    ButtonEdge { id: String, edge: Edge, at: Duration },
    /// Absolute move with the configured speed profile.
    MoveTo { target: i64 },
    /// Relative move with the configured speed profile.
    Jog { steps: i64 },
    /// Move to a stored slot.
    Recall { slot: String },
    /// Home with the configured direction and stall predicate.
    Home,
    /// Stop the scheduler loop after the current step.
    Shutdown,
}

/// Bounded multi-producer queue. Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    inner: Arc<Mutex<Deque<AxisEvent, EVENT_QUEUE_CAPACITY>>>,
    dropped: Arc<AtomicU64>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `event`. When full the event is dropped and returned.
    pub fn push(&self, event: AxisEvent) -> Result<(), AxisEvent> {
        self.inner.lock().push_back(event).map_err(|event| {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!("Event queue full, dropping {:?}", event);
            event
        })
    }

    pub fn pop(&self) -> Option<AxisEvent> {
        self.inner.lock().pop_front()
    }

    /// Take every queued event in arrival order.
    pub fn drain(&self) -> Vec<AxisEvent> {
        let mut queue = self.inner.lock();
        let mut out = Vec::with_capacity(queue.len());
        while let Some(event) = queue.pop_front() {
            out.push(event);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Events lost to a full queue since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Abort flag for the current move and anything queued behind it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag, returning whether it was set.
    pub fn reset(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

impl StepHook for CancelToken {
    fn at_boundary(&mut self, _position: i64) -> StepControl {
        if self.is_cancelled() {
            StepControl::Cancel
        } else {
            StepControl::Continue
        }
    }
}
