//! Deferred reclamation of deleted node records.
//!
//! Deletion clears the bucket slot immediately, so no lookup returns the
//! node afterwards, but the record itself may still be borrowed by query
//! results in flight. Deleted records queue here; the sweep frees the
//! ones whose last borrow is gone and leaves the rest for a later cycle.

use tracing::{debug, trace};

use crate::node::NodeRef;

pub(crate) struct ReclaimQueue {
    pending: Vec<NodeRef>,
    reclaimed_total: u64,
}

impl ReclaimQueue {
    pub(crate) fn new() -> Self {
        Self {
            pending: Vec::new(),
            reclaimed_total: 0,
        }
    }

    pub(crate) fn push(&mut self, node: NodeRef) {
        trace!(id = %node.id(), borrows = node.borrows(), "node queued for reclaim");
        self.pending.push(node);
    }

    /// Drop every queued record with no borrows outside this queue.
    /// Returns how many were reclaimed.
    pub(crate) fn drain(&mut self) -> usize {
        let before = self.pending.len();
        self.pending.retain(|node| node.borrows() > 1);
        let reclaimed = before - self.pending.len();
        if reclaimed > 0 {
            self.reclaimed_total += reclaimed as u64;
            debug!(reclaimed, pending = self.pending.len(), "reclaim queue drained");
        }
        reclaimed
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn reclaimed_total(&self) -> u64 {
        self.reclaimed_total
    }
}
