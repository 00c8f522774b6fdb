//! Node identifiers and the XOR distance metric.
//!
//! Identifiers are 160-bit byte strings compared big-endian. The distance
//! between two identifiers is their bitwise XOR, ordered lexicographically:
//! a smaller distance value means a closer peer.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::TypeError;

/// Width of a node identifier in bytes.
pub const NODE_ID_LEN: usize = 20;

/// A 160-bit overlay node identifier.
///
/// Derivation from peer credentials happens in the identity layer; this
/// type only carries the bytes and the distance algebra.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(#[serde_as(as = "serde_with::hex::Hex")] [u8; NODE_ID_LEN]);

impl NodeId {
    /// Construct an identifier from raw bytes.
    pub const fn from_bytes(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// The raw identifier bytes, big-endian.
    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }

    /// A uniformly random identifier.
    pub fn random() -> Self {
        Self(rand::thread_rng().gen())
    }

    /// XOR distance between this identifier and another.
    pub fn distance(&self, other: &NodeId) -> Distance {
        let mut d = [0u8; NODE_ID_LEN];
        for (i, byte) in d.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }
        Distance(d)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", hex::encode(self.0))
    }
}

impl FromStr for NodeId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidNodeId(e.to_string()))?;
        let bytes: [u8; NODE_ID_LEN] = bytes
            .try_into()
            .map_err(|_| TypeError::InvalidNodeId(format!("expected {NODE_ID_LEN} bytes")))?;
        Ok(Self(bytes))
    }
}

/// XOR distance between two node identifiers.
///
/// Ordering is big-endian lexicographic, so `Ord` ranks peers by closeness.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Distance([u8; NODE_ID_LEN]);

impl Distance {
    /// Construct a distance-space value from raw bytes.
    pub const fn from_bytes(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// The raw distance bytes, big-endian.
    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }

    /// True for the distance of an identifier to itself.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; NODE_ID_LEN]
    }
}

impl fmt::Debug for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Distance({})", hex::encode(self.0))
    }
}
