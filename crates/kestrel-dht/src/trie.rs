//! The routing trie: leaves hold buckets, branches hold two children.
//!
//! Membership is evaluated in distance space relative to the local
//! identifier, so the side of the trie containing the local node keeps
//! refining while the far side stays a single bucket per prefix class.
//! Only left children (and the root) may split.

use kestrel_types::{Distance, NodeId};
use parking_lot::RwLock;
use tracing::debug;

use crate::bucket::Bucket;
use crate::mask::Mask;

pub(crate) enum Trie {
    Leaf(Leaf),
    Branch(Branch),
}

pub(crate) struct Leaf {
    pub(crate) mask: Mask,
    pub(crate) splittable: bool,
    pub(crate) bucket: RwLock<Bucket>,
}

pub(crate) struct Branch {
    pub(crate) mask: Mask,
    pub(crate) left: Box<Trie>,
    pub(crate) right: Box<Trie>,
}

impl Trie {
    /// A fresh table: one splittable leaf covering the whole space.
    pub(crate) fn root() -> Trie {
        Trie::Leaf(Leaf {
            mask: Mask::FULL,
            splittable: true,
            bucket: RwLock::new(Bucket::new()),
        })
    }

    /// The bound this subtree covers.
    pub(crate) fn mask(&self) -> Mask {
        match self {
            Trie::Leaf(leaf) => leaf.mask,
            Trie::Branch(branch) => branch.mask,
        }
    }

    /// Leaf owning the given distance-space point. The root bound is
    /// all-ones, so descent always terminates at a leaf.
    pub(crate) fn leaf_for(&self, d: &Distance) -> &Leaf {
        let mut cur = self;
        loop {
            match cur {
                Trie::Leaf(leaf) => return leaf,
                Trie::Branch(branch) => {
                    // The left side is the more restrictive bound; try it first.
                    cur = if branch.left.mask().contains(d) {
                        &branch.left
                    } else {
                        &branch.right
                    };
                }
            }
        }
    }

    /// Like [`leaf_for`], also yielding the leaf's parent branch and which
    /// side the descent took, for the query engine's sibling step.
    pub(crate) fn leaf_with_parent<'a>(
        &'a self,
        d: &Distance,
    ) -> (&'a Leaf, Option<(&'a Branch, bool)>) {
        let mut parent = None;
        let mut cur = self;
        loop {
            match cur {
                Trie::Leaf(leaf) => return (leaf, parent),
                Trie::Branch(branch) => {
                    let went_left = branch.left.mask().contains(d);
                    parent = Some((branch, went_left));
                    cur = if went_left {
                        &branch.left
                    } else {
                        &branch.right
                    };
                }
            }
        }
    }

    /// Mutable descent for the insert path; returns the trie node that is
    /// the leaf, so the caller can split it in place.
    pub(crate) fn leaf_node_mut(&mut self, d: &Distance) -> &mut Trie {
        match self {
            Trie::Branch(branch) => {
                if branch.left.mask().contains(d) {
                    branch.left.leaf_node_mut(d)
                } else {
                    branch.right.leaf_node_mut(d)
                }
            }
            leaf => leaf,
        }
    }

    /// Split this leaf: the narrowed bound becomes a new left child taking
    /// the matching slots (liveness metadata intact), the existing bucket
    /// moves to a right child that will never split again.
    ///
    /// Returns `false` when this node is not a splittable leaf or its
    /// bound cannot narrow further.
    pub(crate) fn split(&mut self, local_id: &NodeId) -> bool {
        let left_mask = match self {
            Trie::Leaf(leaf) if leaf.splittable => match leaf.mask.narrow() {
                Some(mask) => mask,
                None => return false,
            },
            _ => return false,
        };

        let old = std::mem::replace(self, Trie::root());
        let Trie::Leaf(leaf) = old else {
            unreachable!("checked above");
        };

        let mut right_bucket = leaf.bucket.into_inner();
        let mut left_bucket = Bucket::new();
        for slot in
            right_bucket.drain_matching(|id| left_mask.contains(&id.distance(local_id)))
        {
            left_bucket.adopt(slot);
        }

        debug!(
            mask = %leaf.mask,
            left = %left_mask,
            left_len = left_bucket.len(),
            right_len = right_bucket.len(),
            "bucket split"
        );

        *self = Trie::Branch(Branch {
            mask: leaf.mask,
            left: Box::new(Trie::Leaf(Leaf {
                mask: left_mask,
                splittable: true,
                bucket: RwLock::new(left_bucket),
            })),
            right: Box::new(Trie::Leaf(Leaf {
                mask: leaf.mask,
                splittable: false,
                bucket: RwLock::new(right_bucket),
            })),
        });
        true
    }

    /// Depth-first iterator over the leaves, left side first.
    pub(crate) fn leaves(&self) -> LeafIter<'_> {
        LeafIter { stack: vec![self] }
    }
}

pub(crate) struct LeafIter<'a> {
    stack: Vec<&'a Trie>,
}

impl<'a> Iterator for LeafIter<'a> {
    type Item = &'a Leaf;

    fn next(&mut self) -> Option<&'a Leaf> {
        loop {
            let node = self.stack.pop()?;
            match node {
                Trie::Leaf(leaf) => return Some(leaf),
                Trie::Branch(branch) => {
                    self.stack.push(&branch.right);
                    self.stack.push(&branch.left);
                }
            }
        }
    }
}
