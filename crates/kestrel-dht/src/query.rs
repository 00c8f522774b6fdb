//! Closest-N queries: trie traversal in XOR-distance band order.
//!
//! The walk starts at the leaf owning the target, visits the sibling
//! subtree (the nearest distance band outside that leaf), then steps
//! outward one prefix class at a time with a widening mask cursor. A
//! narrowing cursor covers the deeper leaves of the sibling subtree.
//! Early exit is only taken on band boundaries, which keeps the result
//! exactly the N nearest active peers.

use kestrel_types::{AddrFamily, Distance, NodeId, NodeKind};

use crate::mask::Mask;
use crate::node::{Liveness, NodeRef};
use crate::trie::{Leaf, Trie};
use crate::QUERY_MAX;

/// Address-family admission for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FamilySelector {
    V4,
    V6,
    #[default]
    Any,
}

impl FamilySelector {
    fn admits(self, family: AddrFamily) -> bool {
        match self {
            FamilySelector::V4 => family == AddrFamily::V4,
            FamilySelector::V6 => family == AddrFamily::V6,
            FamilySelector::Any => true,
        }
    }
}

/// Filters applied to every candidate slot of a closest-N query.
#[derive(Debug, Clone, Copy)]
pub struct QueryFilter {
    /// Candidate kind bits must intersect these.
    pub kinds: NodeKind,
    pub family: FamilySelector,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            kinds: NodeKind::all(),
            family: FamilySelector::Any,
        }
    }
}

struct Collector<'a> {
    target: &'a NodeId,
    filter: &'a QueryFilter,
    visited: Vec<Mask>,
    candidates: Vec<(Distance, NodeRef)>,
}

impl Collector<'_> {
    /// Gather the admissible slots of one leaf. Revisits are no-ops.
    fn collect(&mut self, leaf: &Leaf) {
        if self.visited.contains(&leaf.mask) {
            return;
        }
        self.visited.push(leaf.mask);

        let bucket = leaf.bucket.read();
        for slot in bucket.iter() {
            if slot.liveness != Liveness::Active {
                continue;
            }
            if !self.filter.family.admits(slot.family) {
                continue;
            }
            if !slot.kind.intersects(self.filter.kinds) {
                continue;
            }
            self.candidates
                .push((slot.id.distance(self.target), slot.node.clone()));
        }
    }

    fn seen(&self, mask: Mask) -> bool {
        self.visited.contains(&mask)
    }

    /// Globally sort by distance and keep the closest `n`. The sort is
    /// stable, so equal distances keep their collection order.
    fn finish(mut self, n: usize) -> Vec<NodeRef> {
        self.candidates.sort_by(|a, b| a.0.cmp(&b.0));
        self.candidates.truncate(n);
        self.candidates.into_iter().map(|(_, node)| node).collect()
    }
}

/// Leaf of a sibling subtree nearest to the split point: right children
/// never split, so keep taking the right child until a leaf shows up.
fn sibling_leaf(node: &Trie) -> &Leaf {
    match node {
        Trie::Leaf(leaf) => leaf,
        Trie::Branch(branch) => sibling_leaf(&branch.right),
    }
}

pub(crate) fn run(
    trie: &Trie,
    local_id: &NodeId,
    target: &NodeId,
    n: usize,
    filter: &QueryFilter,
) -> Vec<NodeRef> {
    let n = n.min(QUERY_MAX);
    if n == 0 {
        return Vec::new();
    }

    let target_d = target.distance(local_id);
    let mut collector = Collector {
        target,
        filter,
        visited: Vec::new(),
        candidates: Vec::new(),
    };

    // Stage 1: the leaf owning the target. Everything here is strictly
    // closer than anything outside it.
    let (home, parent) = trie.leaf_with_parent(&target_d);
    collector.collect(home);
    let Some((branch, went_left)) = parent else {
        return collector.finish(n);
    };
    if collector.candidates.len() >= n {
        return collector.finish(n);
    }

    // Stage 2: the sibling subtree, the nearest band outside the home
    // leaf. Its first leaf, then the rest via the narrowing cursor.
    let sibling = if went_left {
        &branch.right
    } else {
        &branch.left
    };
    let first_sibling = sibling_leaf(sibling);
    collector.collect(first_sibling);

    let mut right_cursor = first_sibling.mask;
    while let Some(narrowed) = right_cursor.narrow() {
        right_cursor = narrowed;
        let leaf = trie.leaf_for(&right_cursor.to_distance());
        if collector.seen(leaf.mask) {
            break;
        }
        collector.collect(leaf);
    }
    if collector.candidates.len() >= n {
        return collector.finish(n);
    }

    // Stage 3: widen outward one prefix class per step; each step is a
    // strictly farther band, so the count check between steps is safe.
    let mut left_cursor = home.mask;
    while !left_cursor.is_full() {
        left_cursor = left_cursor.widen();
        let leaf = trie.leaf_for(&left_cursor.to_distance());
        collector.collect(leaf);
        if collector.candidates.len() >= n {
            break;
        }
    }

    collector.finish(n)
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use super::*;
    use crate::table::RoutingTable;
    use crate::testutil::{id_with_lead, test_addr};
    use crate::NullPinger;

    fn table_with(ids: &[NodeId]) -> RoutingTable {
        let table = RoutingTable::new(id_with_lead(&[]), Arc::new(NullPinger));
        for (i, id) in ids.iter().enumerate() {
            table
                .create_or_touch(*id, NodeKind::REMOTE, test_addr(i as u8))
                .expect("insert");
            table.touch(id).expect("activate");
        }
        table
    }

    #[test]
    fn test_orders_by_xor_distance() {
        let ids = [
            id_with_lead(&[0x01]),
            id_with_lead(&[0x02]),
            id_with_lead(&[0x40]),
        ];
        let table = table_with(&ids);

        let got = table.closest(&id_with_lead(&[0x03]), 2, QueryFilter::default());
        let got_ids: Vec<NodeId> = got.iter().map(|n| *n.id()).collect();
        assert_eq!(got_ids, vec![id_with_lead(&[0x02]), id_with_lead(&[0x01])]);
    }

    #[test]
    fn test_dubious_and_expired_are_skipped() {
        let table = RoutingTable::new(id_with_lead(&[]), Arc::new(NullPinger));
        let dubious = id_with_lead(&[0x01]);
        let active = id_with_lead(&[0x02]);
        let expired = id_with_lead(&[0x03]);
        for (i, id) in [dubious, active, expired].iter().enumerate() {
            table
                .create_or_touch(*id, NodeKind::REMOTE, test_addr(i as u8))
                .expect("insert");
        }
        table.touch(&active).expect("activate");
        table.touch(&expired).expect("activate");
        table.expire(&expired).expect("expire");

        let got = table.closest(&id_with_lead(&[0x01]), 8, QueryFilter::default());
        let got_ids: Vec<NodeId> = got.iter().map(|n| *n.id()).collect();
        assert_eq!(got_ids, vec![active]);
    }

    #[test]
    fn test_family_filter() {
        let table = RoutingTable::new(id_with_lead(&[]), Arc::new(NullPinger));
        let v4_id = id_with_lead(&[0x01]);
        let v6_id = id_with_lead(&[0x02]);
        let v6_addr: SocketAddr = "[fd00::1]:5060".parse().expect("v6 addr");
        table
            .create_or_touch(v4_id, NodeKind::REMOTE, test_addr(1))
            .expect("insert");
        table
            .create_or_touch(v6_id, NodeKind::REMOTE, v6_addr)
            .expect("insert");
        table.touch(&v4_id).expect("activate");
        table.touch(&v6_id).expect("activate");

        let only_v6 = QueryFilter {
            family: FamilySelector::V6,
            ..QueryFilter::default()
        };
        let got = table.closest(&v4_id, 8, only_v6);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id(), &v6_id);

        let any = table.closest(&v4_id, 8, QueryFilter::default());
        assert_eq!(any.len(), 2);
    }

    #[test]
    fn test_kind_filter() {
        let table = RoutingTable::new(id_with_lead(&[]), Arc::new(NullPinger));
        let local_id = id_with_lead(&[0x01]);
        let remote_id = id_with_lead(&[0x02]);
        table
            .create_or_touch(local_id, NodeKind::LOCAL, test_addr(1))
            .expect("insert");
        table
            .create_or_touch(remote_id, NodeKind::REMOTE, test_addr(2))
            .expect("insert");
        table.touch(&local_id).expect("activate");
        table.touch(&remote_id).expect("activate");

        let remotes_only = QueryFilter {
            kinds: NodeKind::REMOTE,
            ..QueryFilter::default()
        };
        let got = table.closest(&local_id, 8, remotes_only);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id(), &remote_id);
    }

    #[test]
    fn test_result_count_is_capped() {
        let ids: Vec<NodeId> = (0..12u8).map(|i| id_with_lead(&[0x01, i])).collect();
        let table = table_with(&ids);
        let got = table.closest(&id_with_lead(&[0x01]), 64, QueryFilter::default());
        assert_eq!(got.len(), QUERY_MAX);

        let none = table.closest(&id_with_lead(&[0x01]), 0, QueryFilter::default());
        assert!(none.is_empty());
    }

    #[test]
    fn test_walk_crosses_split_boundaries() {
        // Enough peers on the near side to force splits, a few on the far
        // side, and a query that needs all of them.
        let mut ids: Vec<NodeId> = (0..24u8).map(|i| id_with_lead(&[i & 0x3f, i])).collect();
        ids.push(id_with_lead(&[0xf0]));
        ids.push(id_with_lead(&[0xf1]));
        let table = table_with(&ids);
        assert!(table.stats().leaves > 1);

        let got = table.closest(&id_with_lead(&[0xf0, 0x01]), 8, QueryFilter::default());
        assert_eq!(got.len(), 8);
        // The two far-side peers are the closest to a far-side target.
        assert_eq!(got[0].id(), &id_with_lead(&[0xf0]));
        assert_eq!(got[1].id(), &id_with_lead(&[0xf1]));
    }

    #[test]
    fn test_matches_brute_force() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0x6b657374);
        let local = NodeId::from_bytes(rng.gen());
        let table = RoutingTable::new(local, Arc::new(NullPinger));

        let mut present: Vec<NodeId> = Vec::new();
        for i in 0..50u8 {
            let id = NodeId::from_bytes(rng.gen());
            if table
                .create_or_touch(id, NodeKind::REMOTE, test_addr(i))
                .is_ok()
            {
                table.touch(&id).expect("activate");
                present.push(id);
            }
        }

        for _ in 0..250 {
            let target = NodeId::from_bytes(rng.gen());
            let got: Vec<NodeId> = table
                .closest(&target, 8, QueryFilter::default())
                .iter()
                .map(|n| *n.id())
                .collect();

            let mut expect = present.clone();
            expect.sort_by_key(|id| id.distance(&target));
            expect.truncate(8.min(expect.len()));
            assert_eq!(got, expect, "target {target}");
        }
    }
}
