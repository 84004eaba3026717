//! Deferred event queue, the only sanctioned path for state transitions.
//!
//! States cannot reach the `StateManager` through their context, so replacing
//! the active state mid-`update` is impossible by construction. Instead a
//! state pushes a closure here; the frame driver drains the queue at the start
//! of the next frame, strictly before the state update, and hands each entry
//! the manager plus a fresh context. Entries run in FIFO order exactly once.
//! An entry that enqueues further entries sees them run on a later frame,
//! never the same drain.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::state::{StateContext, StateManager};

pub type DeferredEvent = Box<dyn FnOnce(&mut StateManager, &mut StateContext<'_>)>;

#[derive(Clone, Default)]
pub struct DeferredQueue {
    inner: Arc<Mutex<VecDeque<DeferredEvent>>>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: DeferredEvent) {
        self.inner
            .lock()
            .expect("deferred queue lock poisoned")
            .push_back(event);
    }

    pub fn defer<F>(&self, event: F)
    where
        F: FnOnce(&mut StateManager, &mut StateContext<'_>) + 'static,
    {
        self.push(Box::new(event));
    }

    /// Takes every queued entry in one snapshot. Entries pushed while the
    /// snapshot is being executed stay queued for the next drain.
    pub fn drain(&self) -> VecDeque<DeferredEvent> {
        let mut queue = self.inner.lock().expect("deferred queue lock poisoned");
        std::mem::take(&mut *queue)
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("deferred queue lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
