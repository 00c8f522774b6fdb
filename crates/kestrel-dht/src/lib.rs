//! # kestrel-dht
//!
//! Kademlia routing table for the Kestrel cluster trust overlay.
//!
//! This crate implements:
//! - A binary trie of fixed-capacity buckets that refines adaptively along
//!   the local node's side of the identifier space
//! - Closest-N peer queries ordered by XOR distance, with kind and address
//!   family filters
//! - A per-slot liveness state machine (dubious / active / expired) driven
//!   by a periodic maintenance sweep and an injected ping capability
//! - Deferred reclamation of deleted node records while borrowed handles
//!   remain outstanding
//!
//! Transport, the wire codec, identifier derivation, and the timer thread
//! that invokes [`RoutingTable::sweep`] all live outside this crate.
//!
//! ## Key Parameters
//!
//! | Parameter | Value |
//! |---|---|
//! | K (bucket size) | 20 |
//! | Node ID width | 20 bytes |
//! | Query result cap | 8 |
//! | Max outstanding pings | 3 |
//! | Inactive age | 600 s |
//! | Expired age | 900 s |
//! | Sweep interval (long / short) | 300 s / 120 s |

mod bucket;
mod mask;
mod reclaim;
mod sweep;
mod trie;

pub mod node;
pub mod query;
pub mod table;

#[cfg(test)]
pub(crate) mod testutil;

use std::time::Instant;

pub use node::{Liveness, NodeRef};
pub use query::{FamilySelector, QueryFilter};
pub use table::{RoutingTable, TableStats};

use kestrel_types::NodeId;

/// Bucket size: maximum peers per trie leaf.
pub const K: usize = 20;

/// Upper bound on the result count of a closest-N query.
pub const QUERY_MAX: usize = 8;

/// Outstanding unanswered pings after which a slot is expired.
pub const PING_MAX: u8 = 3;

/// Seconds of silence after which a peer is pinged.
pub const INACTIVE_AGE_SECS: u64 = 600;

/// Seconds of silence after which an active peer is demoted to dubious.
pub const EXPIRED_AGE_SECS: u64 = 900;

/// Sweep cadence while the table is quiet.
pub const SWEEP_INTERVAL_SECS: u64 = 300;

/// Sweep cadence while pings are in flight.
pub const SWEEP_SHORT_INTERVAL_SECS: u64 = 120;

/// Error types for routing-table operations.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// The target bucket is full and sits on the non-splittable side of the
    /// trie (or its mask cannot narrow further).
    #[error("bucket full for {id}: not splittable")]
    BucketFull { id: NodeId },

    /// The identifier is not present in the table. Routine outcome, not a
    /// fault.
    #[error("node {id} not in table")]
    NotFound { id: NodeId },
}

/// Convenience result type for routing-table operations.
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Monotonic clock in seconds, injected so the host (and tests) control
/// time.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

/// Default clock: seconds elapsed since table construction.
#[derive(Debug)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

/// Ping dispatch capability supplied by the transport layer.
///
/// Implementations must not block: the sweep calls this with bucket locks
/// held. The eventual outcome of the ping is reported back through
/// [`RoutingTable::touch`] or [`RoutingTable::expire`].
pub trait Pinger: Send + Sync {
    fn ping(&self, node: &NodeRef);
}

/// Pinger that drops every request, for hosts without transport wired up.
#[derive(Debug, Default)]
pub struct NullPinger;

impl Pinger for NullPinger {
    fn ping(&self, _node: &NodeRef) {}
}
