//! Fixed-capacity buckets: the slot arrays hanging off trie leaves.

use kestrel_types::{AddrFamily, NodeId, NodeKind};

use crate::node::{Liveness, NodeRef};
use crate::K;

/// One occupied bucket slot.
///
/// Carries a copy of the node id so scans stay inside the slot array, plus
/// the per-peer liveness bookkeeping the sweep operates on.
pub(crate) struct Slot {
    pub(crate) id: NodeId,
    pub(crate) node: NodeRef,
    pub(crate) kind: NodeKind,
    pub(crate) family: AddrFamily,
    pub(crate) last_seen: u64,
    pub(crate) outstanding_pings: u8,
    pub(crate) touched: bool,
    pub(crate) liveness: Liveness,
}

/// A bucket of at most [`K`] peers sharing a trie leaf.
///
/// Invariant: `expired` always equals the number of occupied slots whose
/// liveness is [`Liveness::Expired`]. Every liveness change goes through
/// [`transition`] to keep that true.
pub(crate) struct Bucket {
    pub(crate) slots: [Option<Slot>; K],
    pub(crate) len: u8,
    pub(crate) expired: u8,
}

/// Outcome of offering a node to a bucket.
pub(crate) enum InsertOutcome {
    /// A slot was taken; `evicted` carries the expired occupant that was
    /// replaced, if any, for the reclamation queue.
    Inserted { evicted: Option<NodeRef> },
    /// The id was already present; only its timestamp advanced.
    Refreshed(NodeRef),
    /// No free slot and no expired slot to replace.
    Full,
}

/// Change a slot's liveness while keeping the bucket's expired counter
/// exact.
pub(crate) fn transition(liveness: &mut Liveness, expired: &mut u8, to: Liveness) {
    match (*liveness, to) {
        (Liveness::Expired, Liveness::Expired) => {}
        (Liveness::Expired, _) => *expired -= 1,
        (_, Liveness::Expired) => *expired += 1,
        _ => {}
    }
    *liveness = to;
}

impl Bucket {
    pub(crate) fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            len: 0,
            expired: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len as usize
    }

    pub(crate) fn expired_len(&self) -> usize {
        self.expired as usize
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().flatten()
    }

    pub(crate) fn slot(&self, id: &NodeId) -> Option<&Slot> {
        self.iter().find(|s| s.id == *id)
    }

    /// Refresh path of `create_or_touch`: the id is already here, so only
    /// advance its timestamp; a peer that has acknowledged us before is
    /// promoted back to active.
    pub(crate) fn refresh(&mut self, id: &NodeId, now: u64) -> Option<NodeRef> {
        let Bucket { slots, expired, .. } = self;
        let slot = slots.iter_mut().flatten().find(|s| s.id == *id)?;
        slot.last_seen = now;
        if slot.touched {
            transition(&mut slot.liveness, expired, Liveness::Active);
        }
        Some(slot.node.clone())
    }

    /// Offer a node to this bucket: reuse a duplicate, else take a free
    /// slot, else replace an expired occupant. New slots start dubious and
    /// untouched.
    pub(crate) fn insert(&mut self, node: &NodeRef, now: u64) -> InsertOutcome {
        let mut free = None;
        let mut expired_at = None;

        for (i, entry) in self.slots.iter_mut().enumerate() {
            match entry {
                None => {
                    if free.is_none() {
                        free = Some(i);
                    }
                }
                Some(slot) if slot.id == *node.id() => {
                    // Duplicate insert leaves the liveness flags untouched.
                    slot.last_seen = now;
                    return InsertOutcome::Refreshed(slot.node.clone());
                }
                Some(slot) => {
                    if expired_at.is_none() && slot.liveness == Liveness::Expired {
                        expired_at = Some(i);
                    }
                }
            }
        }

        let slot = Slot {
            id: *node.id(),
            node: node.clone(),
            kind: node.kind(),
            family: node.family(),
            last_seen: now,
            outstanding_pings: 0,
            touched: false,
            liveness: Liveness::Dubious,
        };

        if let Some(i) = free {
            self.slots[i] = Some(slot);
            self.len += 1;
            debug_assert!(self.len() <= K);
            return InsertOutcome::Inserted { evicted: None };
        }

        if let Some(i) = expired_at {
            // Replacement: the occupant count stays the same.
            self.expired -= 1;
            let old = self.slots[i].replace(slot);
            return InsertOutcome::Inserted {
                evicted: old.map(|s| s.node),
            };
        }

        InsertOutcome::Full
    }

    pub(crate) fn touch(&mut self, id: &NodeId, now: u64) -> bool {
        let Bucket { slots, expired, .. } = self;
        let Some(slot) = slots.iter_mut().flatten().find(|s| s.id == *id) else {
            return false;
        };
        slot.last_seen = now;
        slot.outstanding_pings = 0;
        slot.touched = true;
        transition(&mut slot.liveness, expired, Liveness::Active);
        true
    }

    pub(crate) fn expire(&mut self, id: &NodeId) -> bool {
        let Bucket { slots, expired, .. } = self;
        let Some(slot) = slots.iter_mut().flatten().find(|s| s.id == *id) else {
            return false;
        };
        transition(&mut slot.liveness, expired, Liveness::Expired);
        true
    }

    /// Clear the slot for `id`, returning the table's owning handle so the
    /// caller can queue it for reclamation.
    pub(crate) fn remove(&mut self, id: &NodeId) -> Option<NodeRef> {
        let Bucket { slots, len, expired } = self;
        for entry in slots.iter_mut() {
            if entry.as_ref().is_some_and(|s| s.id == *id) {
                if let Some(slot) = entry.take() {
                    *len -= 1;
                    if slot.liveness == Liveness::Expired {
                        *expired -= 1;
                    }
                    return Some(slot.node);
                }
            }
        }
        None
    }

    /// Pull out every slot matching `pred`, compacting nothing: the holes
    /// become free slots. Used by the split to populate the new left child.
    pub(crate) fn drain_matching(
        &mut self,
        pred: impl Fn(&NodeId) -> bool,
    ) -> Vec<Slot> {
        let mut out = Vec::new();
        let Bucket { slots, len, expired } = self;
        for entry in slots.iter_mut() {
            if entry.as_ref().is_some_and(|s| pred(&s.id)) {
                if let Some(slot) = entry.take() {
                    *len -= 1;
                    if slot.liveness == Liveness::Expired {
                        *expired -= 1;
                    }
                    out.push(slot);
                }
            }
        }
        out
    }

    /// Place a slot moved over by a split, liveness metadata intact.
    pub(crate) fn adopt(&mut self, slot: Slot) {
        debug_assert!(self.len() < K);
        if slot.liveness == Liveness::Expired {
            self.expired += 1;
        }
        for entry in self.slots.iter_mut() {
            if entry.is_none() {
                *entry = Some(slot);
                self.len += 1;
                return;
            }
        }
        debug_assert!(false, "adopt called on a full bucket");
    }
}
