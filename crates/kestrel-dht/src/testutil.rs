//! Shared helpers for the unit tests in this crate.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use kestrel_types::{NodeId, NodeKind, NODE_ID_LEN};
use parking_lot::Mutex;

use crate::node::{NodeRecord, NodeRef};
use crate::{Clock, Pinger};

/// Identifier with the given leading bytes, zero-filled to full width.
pub(crate) fn id_with_lead(lead: &[u8]) -> NodeId {
    let mut bytes = [0u8; NODE_ID_LEN];
    bytes[..lead.len()].copy_from_slice(lead);
    NodeId::from_bytes(bytes)
}

/// Distinct identifier in the low half of the id space.
pub(crate) fn seq_id(n: u8) -> NodeId {
    id_with_lead(&[0x01, n])
}

pub(crate) fn test_addr(n: u8) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, n], 5060 + u16::from(n)))
}

/// Standalone remote node record, for bucket-level tests.
pub(crate) fn remote(id: NodeId) -> NodeRef {
    NodeRef::new(NodeRecord::new(id, NodeKind::REMOTE, test_addr(id.as_bytes()[1])))
}

/// Clock the tests wind forward by hand.
pub(crate) struct TestClock {
    secs: AtomicU64,
}

impl TestClock {
    pub(crate) fn new(start: u64) -> Arc<Self> {
        Arc::new(Self {
            secs: AtomicU64::new(start),
        })
    }

    pub(crate) fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now_secs(&self) -> u64 {
        self.secs.load(Ordering::SeqCst)
    }
}

/// Pinger that records every dispatched target.
#[derive(Default)]
pub(crate) struct RecordingPinger {
    sent: Mutex<Vec<NodeId>>,
}

impl RecordingPinger {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn sent(&self) -> Vec<NodeId> {
        self.sent.lock().clone()
    }

    pub(crate) fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl Pinger for RecordingPinger {
    fn ping(&self, node: &NodeRef) {
        self.sent.lock().push(*node.id());
    }
}
