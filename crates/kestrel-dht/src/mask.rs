//! Subtree bound masks for the routing trie.
//!
//! A mask is a distance-space upper bound of the form `0…01…1`: a node
//! belongs to a subtree iff its distance to the local identifier is
//! lexicographically at most the subtree's mask. Narrowing a mask by one
//! bit produces the bound of a left child after a split; widening moves
//! the query walk outward by one prefix class.

use std::fmt;

use kestrel_types::{Distance, NODE_ID_LEN};

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct Mask([u8; NODE_ID_LEN]);

impl Mask {
    /// The all-ones bound of the trie root: every distance matches.
    pub(crate) const FULL: Mask = Mask([0xff; NODE_ID_LEN]);

    /// Whether a distance-space value falls under this bound.
    pub(crate) fn contains(&self, d: &Distance) -> bool {
        d.as_bytes() <= &self.0
    }

    /// Halve the bound: the mask a left child receives on split.
    ///
    /// Returns `None` once the low byte is already zero, i.e. the bound
    /// cannot narrow further and the owning bucket must not split again.
    pub(crate) fn narrow(self) -> Option<Mask> {
        if self.0[NODE_ID_LEN - 1] == 0 {
            return None;
        }
        let mut out = [0u8; NODE_ID_LEN];
        let mut carry = 0u8;
        for (i, byte) in self.0.iter().enumerate() {
            out[i] = (byte >> 1) | carry;
            carry = (byte & 1) << 7;
        }
        Some(Mask(out))
    }

    /// Widen the bound by one bit: shift the lowest non-0xff byte left and
    /// set its least significant bit.
    pub(crate) fn widen(self) -> Mask {
        let mut out = self.0;
        for byte in out.iter_mut().rev() {
            if *byte == 0xff {
                continue;
            }
            *byte = (*byte << 1) | 1;
            break;
        }
        Mask(out)
    }

    /// Whether this is the all-ones bound. Masks are `0…01…1`, so checking
    /// the top byte suffices.
    pub(crate) fn is_full(&self) -> bool {
        self.0[0] == 0xff
    }

    /// This bound as a distance-space point, for trie descent.
    pub(crate) fn to_distance(self) -> Distance {
        Distance::from_bytes(self.0)
    }
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mask({})", hex::encode(self.0))
    }
}
