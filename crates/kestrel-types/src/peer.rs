//! Peer classification: address families and the node-kind bitset.

use std::net::SocketAddr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// IP address family of a peer endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddrFamily {
    V4,
    V6,
}

impl From<&SocketAddr> for AddrFamily {
    fn from(addr: &SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(_) => AddrFamily::V4,
            SocketAddr::V6(_) => AddrFamily::V6,
        }
    }
}

bitflags! {
    /// Classification bits for an overlay peer.
    ///
    /// `LOCAL` marks nodes that belong to this host; they are exempt from
    /// liveness expiry. Queries filter on the intersection of these bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeKind: u8 {
        const LOCAL  = 0b0000_0001;
        const REMOTE = 0b0000_0010;
    }
}
