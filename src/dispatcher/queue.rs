//! Requests waiting for the outstanding failover probe.

use std::collections::VecDeque;

use crate::request::WeakRequest;

/// FIFO of weak request handles queued while a probe is outstanding.
#[derive(Debug, Default)]
pub struct PendingQueue {
    inner: VecDeque<WeakRequest>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, request: WeakRequest) {
        self.inner.push_back(request);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Snapshot and clear, so entries re-queued while draining land in a fresh queue.
    pub fn take_all(&mut self) -> VecDeque<WeakRequest> {
        std::mem::take(&mut self.inner)
    }
}
