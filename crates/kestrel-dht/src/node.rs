//! Node records and the borrowed handles the table hands out.

use std::fmt;
use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;

use kestrel_types::{AddrFamily, NodeId, NodeKind};

/// Immutable identity of a peer as held by the routing table.
///
/// A record is reachable from at most one bucket slot; query results and
/// lookups additionally hold it through [`NodeRef`] borrows.
#[derive(Debug)]
pub struct NodeRecord {
    id: NodeId,
    addr: SocketAddr,
    family: AddrFamily,
    kind: NodeKind,
}

impl NodeRecord {
    pub(crate) fn new(id: NodeId, kind: NodeKind, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            family: AddrFamily::from(&addr),
            kind,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn family(&self) -> AddrFamily {
        self.family
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }
}

/// Borrowed, reference-counted handle to a [`NodeRecord`].
///
/// Cloning takes another borrow; dropping releases one. A record deleted
/// from the table stays allocated until every handle is gone, at which
/// point the maintenance sweep reclaims it.
#[derive(Clone)]
pub struct NodeRef(Arc<NodeRecord>);

impl NodeRef {
    pub(crate) fn new(record: NodeRecord) -> Self {
        Self(Arc::new(record))
    }

    /// Number of live borrows, the table's own included.
    pub(crate) fn borrows(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl Deref for NodeRef {
    type Target = NodeRecord;

    fn deref(&self) -> &NodeRecord {
        &self.0
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", self.id())
            .field("addr", &self.addr())
            .field("borrows", &self.borrows())
            .finish()
    }
}

/// Liveness classification of a bucket slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Newly learned or aged out of active; awaiting a first (or fresh)
    /// acknowledgement.
    Dubious,
    /// The peer has acknowledged us and answers pings.
    Active,
    /// The peer stopped answering; its slot may be replaced.
    Expired,
}
