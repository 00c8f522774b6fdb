//! The maintenance sweep: slot aging, ping dispatch, reclamation.
//!
//! The sweep never blocks application threads. Bucket locks are taken
//! with `try_write`; a busy bucket is simply skipped until the next
//! cycle. Reclamation frees only records with no outstanding borrows.

use tracing::{debug, trace};

use crate::bucket::{transition, Bucket, Slot};
use crate::node::Liveness;
use crate::table::RoutingTable;
use crate::{
    Pinger, EXPIRED_AGE_SECS, INACTIVE_AGE_SECS, PING_MAX, SWEEP_INTERVAL_SECS,
    SWEEP_SHORT_INTERVAL_SECS,
};

use kestrel_types::NodeKind;

/// Interval gate: the sweep is a no-op until its cadence elapses.
pub(crate) struct SweepGate {
    last_sweep: u64,
    interval: u64,
}

impl SweepGate {
    pub(crate) fn new() -> Self {
        Self {
            last_sweep: 0,
            interval: SWEEP_INTERVAL_SECS,
        }
    }
}

pub(crate) fn run(table: &RoutingTable) {
    let now = table.clock.now_secs();
    {
        let mut gate = table.gate.lock();
        if now.saturating_sub(gate.last_sweep) < gate.interval {
            return;
        }
        gate.last_sweep = now;
    }
    debug!(now, "sweep started");

    let mut pings = 0u32;
    {
        let trie = table.trie.read();
        for leaf in trie.leaves() {
            let Some(mut bucket) = leaf.bucket.try_write() else {
                debug!(mask = %leaf.mask, "sweep: bucket busy, skipped");
                continue;
            };
            pings += age_bucket(&mut bucket, now, table.pinger.as_ref());
        }
    }

    let reclaimed = table.reclaim.lock().drain();

    let mut gate = table.gate.lock();
    gate.interval = if pings > 0 {
        SWEEP_SHORT_INTERVAL_SECS
    } else {
        SWEEP_INTERVAL_SECS
    };
    debug!(pings, reclaimed, next_interval = gate.interval, "sweep finished");
}

/// Age every occupied slot of one bucket, dispatching pings as needed.
/// Returns the number of pings sent.
///
/// Per slot, first match wins:
/// 1. Local slots and expired slots are left alone; the former never age,
///    the latter wait for a touch or for replacement.
/// 2. Too many unanswered pings: the slot expires, with no further retry.
/// 3. A ping is in flight: send another.
/// 4. Silent past the expiry age: demote active to dubious, ping as a
///    final effort.
/// 5. Silent past the inactive age: ping.
fn age_bucket(bucket: &mut Bucket, now: u64, pinger: &dyn Pinger) -> u32 {
    let mut pings = 0;
    let Bucket { slots, expired, .. } = bucket;

    for slot in slots.iter_mut().flatten() {
        if slot.kind.contains(NodeKind::LOCAL) {
            continue;
        }
        if slot.liveness == Liveness::Expired {
            continue;
        }

        if slot.outstanding_pings >= PING_MAX {
            transition(&mut slot.liveness, expired, Liveness::Expired);
            slot.outstanding_pings = 0;
            debug!(id = %slot.id, "sweep: node expired");
            continue;
        }

        if slot.outstanding_pings > 0 {
            send_ping(slot, pinger);
            pings += 1;
            continue;
        }

        let age = now.saturating_sub(slot.last_seen);
        if age > EXPIRED_AGE_SECS {
            if slot.liveness == Liveness::Active {
                transition(&mut slot.liveness, expired, Liveness::Dubious);
            }
            send_ping(slot, pinger);
            pings += 1;
            continue;
        }
        if age > INACTIVE_AGE_SECS {
            send_ping(slot, pinger);
            pings += 1;
        }
    }

    pings
}

fn send_ping(slot: &mut Slot, pinger: &dyn Pinger) {
    slot.outstanding_pings += 1;
    trace!(id = %slot.id, pending = slot.outstanding_pings, "ping dispatched");
    pinger.ping(&slot.node);
}
