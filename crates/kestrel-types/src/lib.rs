//! # kestrel-types
//!
//! Shared domain types for the Kestrel cluster overlay: the fixed-width
//! node identifier with its XOR distance metric, peer address families,
//! and the node-kind bitset used to classify overlay peers.

pub mod id;
pub mod peer;

pub use id::{Distance, NodeId, NODE_ID_LEN};
pub use peer::{AddrFamily, NodeKind};

/// Error types for domain type construction and parsing.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// The input does not describe a valid node identifier.
    #[error("invalid node id: {0}")]
    InvalidNodeId(String),
}
