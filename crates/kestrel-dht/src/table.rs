//! The routing table façade: the trie behind a table-level lock, plus the
//! reclamation queue and sweep bookkeeping.
//!
//! Lock hierarchy, always in this order: table guard, then one bucket
//! lock, then node handles. Structural changes (splits) run under the
//! table write guard, so shared-guard holders never observe a trie
//! pointer move.

use std::net::SocketAddr;
use std::sync::Arc;

use kestrel_types::{Distance, NodeId, NodeKind, NODE_ID_LEN};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::bucket::InsertOutcome;
use crate::node::{NodeRecord, NodeRef};
use crate::query::{self, QueryFilter};
use crate::reclaim::ReclaimQueue;
use crate::sweep::SweepGate;
use crate::trie::Trie;
use crate::{Clock, Pinger, Result, RoutingError, SystemClock};

/// Split retries before insertion gives up; the trie is at most one leaf
/// per bit of the identifier deep.
const MAX_SPLIT_ATTEMPTS: usize = NODE_ID_LEN * 8 + 1;

/// Kademlia routing table parameterised by the local node identifier.
///
/// All operations take `&self`; the table is shared across application
/// threads and one maintenance thread driving [`RoutingTable::sweep`].
pub struct RoutingTable {
    local_id: NodeId,
    pub(crate) trie: RwLock<Trie>,
    pub(crate) reclaim: Mutex<ReclaimQueue>,
    pub(crate) gate: Mutex<SweepGate>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) pinger: Arc<dyn Pinger>,
}

/// Point-in-time counters, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    /// Occupied slots across all buckets.
    pub nodes: usize,
    /// Leaves in the trie.
    pub leaves: usize,
    /// Occupied slots currently classified expired.
    pub expired: usize,
    /// Deleted records still awaiting reclamation.
    pub pending_reclaim: usize,
    /// Records reclaimed since the table was created.
    pub reclaimed_total: u64,
}

impl RoutingTable {
    /// New table around the local identifier, using the host clock.
    pub fn new(local_id: NodeId, pinger: Arc<dyn Pinger>) -> Self {
        Self::with_clock(local_id, pinger, Arc::new(SystemClock::new()))
    }

    /// New table with an explicit clock; tests wind it by hand.
    pub fn with_clock(
        local_id: NodeId,
        pinger: Arc<dyn Pinger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            local_id,
            trie: RwLock::new(Trie::root()),
            reclaim: Mutex::new(ReclaimQueue::new()),
            gate: Mutex::new(SweepGate::new()),
            clock,
            pinger,
        }
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    /// Register a peer, or refresh it if already present.
    ///
    /// A refresh advances the slot's timestamp and, once the peer has ever
    /// acknowledged us, promotes it back to active; liveness of a
    /// never-acknowledged slot is left for the sweep to assess. A new peer
    /// lands dubious. Fails with [`RoutingError::BucketFull`] when the
    /// target bucket is full on the non-splittable side and holds no
    /// expired slot to replace.
    pub fn create_or_touch(
        &self,
        id: NodeId,
        kind: NodeKind,
        addr: SocketAddr,
    ) -> Result<NodeRef> {
        let d = id.distance(&self.local_id);
        let now = self.clock.now_secs();

        {
            let trie = self.trie.read();
            let leaf = trie.leaf_for(&d);
            let mut bucket = leaf.bucket.write();
            if let Some(existing) = bucket.refresh(&id, now) {
                return Ok(existing);
            }
        }

        let node = NodeRef::new(NodeRecord::new(id, kind, addr));
        self.insert(node, &d, now)
    }

    /// Insert path: allocate done, now place the record under the table
    /// write guard, splitting the target leaf as long as it is allowed to.
    fn insert(&self, node: NodeRef, d: &Distance, now: u64) -> Result<NodeRef> {
        let mut trie = self.trie.write();

        for _ in 0..MAX_SPLIT_ATTEMPTS {
            let leaf_node = trie.leaf_node_mut(d);
            let outcome = match &mut *leaf_node {
                Trie::Leaf(leaf) => leaf.bucket.get_mut().insert(&node, now),
                Trie::Branch(_) => unreachable!("descent ends at a leaf"),
            };

            match outcome {
                InsertOutcome::Inserted { evicted } => {
                    debug!(id = %node.id(), "node inserted");
                    drop(trie);
                    if let Some(old) = evicted {
                        self.reclaim.lock().push(old);
                    }
                    return Ok(node);
                }
                InsertOutcome::Refreshed(existing) => {
                    // Another thread created it between our two descents.
                    return Ok(existing);
                }
                InsertOutcome::Full => {
                    if !leaf_node.split(&self.local_id) {
                        debug!(id = %node.id(), "node not inserted: bucket full");
                        return Err(RoutingError::BucketFull { id: *node.id() });
                    }
                    // Re-descend: the moved slots may all have landed on
                    // the inserted id's side.
                }
            }
        }

        debug_assert!(false, "split retries exhausted");
        Err(RoutingError::BucketFull { id: *node.id() })
    }

    /// Exact-id lookup. Liveness is not filtered: dubious and expired
    /// peers still route.
    pub fn find(&self, id: &NodeId) -> Option<NodeRef> {
        let d = id.distance(&self.local_id);
        let trie = self.trie.read();
        let bucket = trie.leaf_for(&d).bucket.read();
        bucket.slot(id).map(|slot| slot.node.clone())
    }

    /// Record an acknowledgement from the peer: timestamp refreshed,
    /// outstanding pings cleared, slot active.
    pub fn touch(&self, id: &NodeId) -> Result<()> {
        let d = id.distance(&self.local_id);
        let now = self.clock.now_secs();
        let trie = self.trie.read();
        let mut bucket = trie.leaf_for(&d).bucket.write();
        if bucket.touch(id, now) {
            Ok(())
        } else {
            Err(RoutingError::NotFound { id: *id })
        }
    }

    /// Hint from the host that the peer is gone; its slot becomes
    /// replaceable.
    pub fn expire(&self, id: &NodeId) -> Result<()> {
        let d = id.distance(&self.local_id);
        let trie = self.trie.read();
        let mut bucket = trie.leaf_for(&d).bucket.write();
        if bucket.expire(id) {
            Ok(())
        } else {
            Err(RoutingError::NotFound { id: *id })
        }
    }

    /// Remove a peer. Consumes the caller's handle; the record itself is
    /// queued and reclaimed by a later sweep once no other borrows remain.
    pub fn remove(&self, node: NodeRef) -> Result<()> {
        let id = *node.id();
        let d = id.distance(&self.local_id);

        let removed = {
            let trie = self.trie.read();
            let mut bucket = trie.leaf_for(&d).bucket.write();
            bucket.remove(&id)
        };
        // From here no find or query returns the node.
        drop(node);

        match removed {
            Some(owned) => {
                self.reclaim.lock().push(owned);
                Ok(())
            }
            None => Err(RoutingError::NotFound { id }),
        }
    }

    /// Up to `n` active peers closest to `target` by XOR distance,
    /// ascending, after kind and family filtering. `n` is capped at
    /// [`crate::QUERY_MAX`].
    pub fn closest(&self, target: &NodeId, n: usize, filter: QueryFilter) -> Vec<NodeRef> {
        let trie = self.trie.read();
        query::run(&trie, &self.local_id, target, n, &filter)
    }

    /// Run the maintenance pass if the sweep interval has elapsed: age
    /// slots, dispatch pings, reclaim deleted records. Never blocks on a
    /// busy bucket.
    pub fn sweep(&self) {
        crate::sweep::run(self);
    }

    /// Occupied slots across the table.
    pub fn len(&self) -> usize {
        let trie = self.trie.read();
        trie.leaves().map(|leaf| leaf.bucket.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> TableStats {
        let (nodes, leaves, expired) = {
            let trie = self.trie.read();
            let mut nodes = 0;
            let mut leaves = 0;
            let mut expired = 0;
            for leaf in trie.leaves() {
                let bucket = leaf.bucket.read();
                nodes += bucket.len();
                expired += bucket.expired_len();
                leaves += 1;
            }
            (nodes, leaves, expired)
        };
        let reclaim = self.reclaim.lock();
        TableStats {
            nodes,
            leaves,
            expired,
            pending_reclaim: reclaim.pending(),
            reclaimed_total: reclaim.reclaimed_total(),
        }
    }

    /// Log the table layout at debug level; `verbose` adds per-slot
    /// detail.
    pub fn dump(&self, verbose: bool) {
        let trie = self.trie.read();
        for leaf in trie.leaves() {
            let bucket = leaf.bucket.read();
            debug!(
                mask = %leaf.mask,
                len = bucket.len(),
                expired = bucket.expired_len(),
                splittable = leaf.splittable,
                "bucket"
            );
            if verbose {
                for slot in bucket.iter() {
                    debug!(
                        id = %slot.id,
                        liveness = ?slot.liveness,
                        pings = slot.outstanding_pings,
                        touched = slot.touched,
                        last_seen = slot.last_seen,
                        kind = ?slot.kind,
                        family = ?slot.family,
                        "slot"
                    );
                }
            }
        }
        drop(trie);
        let reclaim = self.reclaim.lock();
        debug!(
            pending = reclaim.pending(),
            reclaimed = reclaim.reclaimed_total(),
            "reclaim queue"
        );
    }
}

#[cfg(test)]
impl RoutingTable {
    /// Structural audit used by the tests: bounds, counters, id
    /// uniqueness.
    pub(crate) fn check_invariants(&self) {
        use std::collections::HashSet;

        let trie = self.trie.read();
        let mut seen = HashSet::new();
        for leaf in trie.leaves() {
            let bucket = leaf.bucket.read();
            let mut occupied = 0;
            let mut expired = 0;
            for slot in bucket.iter() {
                occupied += 1;
                if slot.liveness == crate::node::Liveness::Expired {
                    expired += 1;
                }
                assert!(
                    leaf.mask.contains(&slot.id.distance(&self.local_id)),
                    "slot {} escapes bound {}",
                    slot.id,
                    leaf.mask
                );
                assert!(seen.insert(slot.id), "duplicate id {}", slot.id);
                assert_eq!(slot.id, *slot.node.id());
            }
            assert_eq!(occupied, bucket.len());
            assert_eq!(expired, bucket.expired_len());
            assert!(bucket.len() <= crate::K);
        }
    }
}
