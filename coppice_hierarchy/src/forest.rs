// Copyright 2025 the Coppice Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The flattened forest array and its structural edit primitives.
//!
//! A [`Forest`] stores one rooted tree of items as a single contiguous array
//! of [`Node`] slots in strict level order: slot 0 is the root, all slots of
//! depth `d` precede all slots of depth `d + 1`, and within a level the child
//! runs are ordered by their parent's index. Level order is what makes every
//! edit a bounded splice: a node's direct children are always one contiguous
//! run, so attaching, detaching, and moving subtrees only rewrites the slots
//! at and after the affected position, never the whole array.
//!
//! Every primitive that relocates a slot also rewrites the owning item's
//! [`Location`] attribute in the [`Store`], keeping the back-reference table
//! exact between operations. That bookkeeping is the contract the external
//! value-propagation layer depends on.

use core::ops::Range;
use std::collections::VecDeque;

use coppice_store::{ItemId, Store};
use smallvec::SmallVec;

use crate::types::{Location, Node, NodeFlags, NO_PARENT, UNSET_CHILD};

/// Rewrite one item's back-reference, skipping items the store has already
/// reclaimed (their slots can linger in a tombstone mirror).
pub(crate) fn write_location(store: &mut Store, owner: ItemId, root: ItemId, index: u32) {
    if store.exists(owner) {
        store.set_attribute(owner, Location { root, index });
    }
}

/// One forest: a flattened, level-ordered parent/child array.
///
/// Invariants, true between operations:
///
/// 1. Slot 0 is the only root (`parent == NO_PARENT`).
/// 2. Every other slot's parent index is smaller than its own.
/// 3. A slot's children occupy `first_child .. first_child + child_count`,
///    entirely after the slot itself; a childless slot carries
///    [`UNSET_CHILD`].
/// 4. Child counts sum to `len - 1`.
/// 5. Sibling order is insertion order; child runs are ordered by parent
///    index, which pins the whole array into level order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Forest {
    nodes: Vec<Node>,
}

impl Forest {
    /// A one-slot forest holding only its root item.
    #[must_use]
    pub fn new_root(owner: ItemId) -> Self {
        Self {
            nodes: vec![Node::leaf(owner, NodeFlags::empty())],
        }
    }

    pub(crate) fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    /// Number of slots. Always at least 1: a forest holds its root.
    #[allow(
        clippy::len_without_is_empty,
        reason = "a forest is never empty, so the predicate would be a constant"
    )]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// The slot at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[must_use]
    pub fn node(&self, index: u32) -> &Node {
        &self.nodes[index as usize]
    }

    /// All slots, in level order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The item owning slot 0.
    #[must_use]
    pub fn root_owner(&self) -> ItemId {
        self.nodes[0].owner
    }

    /// Owners of all slots, in level order.
    pub fn owners(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.nodes.iter().map(|n| n.owner)
    }

    /// Indices of the direct children of `index`, in sibling order.
    #[must_use]
    pub fn children(&self, index: u32) -> Range<u32> {
        let n = &self.nodes[index as usize];
        if n.child_count == 0 {
            0..0
        } else {
            n.first_child..n.first_child + n.child_count
        }
    }

    /// Level-order traversal of the subtree below `index` (excluding `index`).
    #[must_use]
    pub fn descendants(&self, index: u32) -> Descendants<'_> {
        Descendants {
            forest: self,
            queue: self.children(index).collect(),
        }
    }

    /// Whether `ancestor` is `index` itself or one of its ancestors.
    #[must_use]
    pub fn is_ancestor_or_self(&self, ancestor: u32, index: u32) -> bool {
        let mut at = index;
        loop {
            if at == ancestor {
                return true;
            }
            let p = self.nodes[at as usize].parent;
            if p == NO_PARENT {
                return false;
            }
            at = p;
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        reason = "slot indices are 32-bit by design"
    )]
    fn len_u32(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// Where a new last child of `parent` must be placed.
    ///
    /// For a parent with children this is the slot just past its run. For a
    /// first child, the run opens where the next child run in the array
    /// starts (or at the end), which keeps runs ordered by parent index.
    fn insertion_point(&self, parent: u32) -> u32 {
        let p = &self.nodes[parent as usize];
        if p.child_count > 0 {
            return p.first_child + p.child_count;
        }
        self.nodes[(parent as usize + 1)..]
            .iter()
            .find(|n| n.child_count > 0)
            .map_or(self.len_u32(), |n| n.first_child)
    }

    /// Level boundaries `(start, end)` of the array, root level first.
    fn level_ranges(&self) -> SmallVec<[(u32, u32); 8]> {
        let mut out = SmallVec::new();
        let mut start = 0_u32;
        let mut count = 1_u32;
        while count > 0 {
            let end = start + count;
            out.push((start, end));
            count = self.nodes[start as usize..end as usize]
                .iter()
                .map(|n| n.child_count)
                .sum();
            start = end;
        }
        debug_assert_eq!(start, self.len_u32(), "levels must partition the array");
        out
    }

    fn depth(&self, index: u32) -> usize {
        let mut d = 0;
        let mut at = index;
        while self.nodes[at as usize].parent != NO_PARENT {
            at = self.nodes[at as usize].parent;
            d += 1;
        }
        d
    }

    /// Append one leaf as the last child of `parent`.
    ///
    /// O(1) when the insertion point is the end of the array; otherwise every
    /// slot from the insertion point on shifts right by one and has its
    /// back-reference rewritten.
    pub(crate) fn attach_single(
        &mut self,
        store: &mut Store,
        root: ItemId,
        parent: u32,
        owner: ItemId,
        flags: NodeFlags,
    ) -> u32 {
        let ip = self.insertion_point(parent);
        let len = self.len_u32();
        debug_assert!(parent < ip, "a child run opens after its parent");
        let mut node = Node::leaf(owner, flags);
        node.parent = parent;
        if ip == len {
            self.nodes.push(node);
        } else {
            self.nodes.insert(ip as usize, node);
            for (i, n) in self.nodes.iter_mut().enumerate() {
                if i == ip as usize {
                    continue;
                }
                if n.parent != NO_PARENT && n.parent >= ip {
                    n.parent += 1;
                }
                if n.child_count > 0 && n.first_child >= ip {
                    n.first_child += 1;
                }
            }
            for i in (ip + 1)..=len {
                write_location(store, self.nodes[i as usize].owner, root, i);
            }
        }
        let p = &mut self.nodes[parent as usize];
        if p.child_count == 0 {
            p.first_child = ip;
        }
        p.child_count += 1;
        write_location(store, owner, root, ip);
        #[cfg(debug_assertions)]
        self.assert_consistent();
        ip
    }

    /// Remove the childless slot at `index`, closing the gap.
    ///
    /// Every following slot shifts left by one and has its back-reference
    /// rewritten.
    pub(crate) fn remove_single(&mut self, store: &mut Store, root: ItemId, index: u32) {
        debug_assert!(index > 0, "the root slot cannot be removed");
        debug_assert_eq!(
            self.nodes[index as usize].child_count, 0,
            "single removal requires a childless slot"
        );
        let parent = self.nodes[index as usize].parent;
        let p = &mut self.nodes[parent as usize];
        p.child_count -= 1;
        if p.child_count == 0 {
            p.first_child = UNSET_CHILD;
        }
        self.nodes.remove(index as usize);
        for n in &mut self.nodes {
            if n.parent != NO_PARENT && n.parent > index {
                n.parent -= 1;
            }
            if n.child_count > 0 && n.first_child > index {
                n.first_child -= 1;
            }
        }
        for i in (index as usize)..self.nodes.len() {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "slot indices are 32-bit by design"
            )]
            write_location(store, self.nodes[i].owner, root, i as u32);
        }
        #[cfg(debug_assertions)]
        self.assert_consistent();
    }

    /// Copy the subtree rooted at `index` into a fresh, compact, re-rooted
    /// array built on `buf`.
    ///
    /// Pure read: neither the source array nor any back-reference changes.
    /// The copy walks the subtree level by level, appending each already
    /// copied slot's children in their original order; first-child offsets
    /// start as the [`UNSET_CHILD`] sentinel and are resolved afterwards by a
    /// single backward minimum pass.
    pub(crate) fn extract_subtree(&self, index: u32, mut buf: Vec<Node>) -> Self {
        buf.clear();
        let src = &self.nodes[index as usize];
        buf.push(Node {
            owner: src.owner,
            parent: NO_PARENT,
            first_child: UNSET_CHILD,
            child_count: src.child_count,
            flags: src.flags,
        });
        let mut src_of: SmallVec<[u32; 32]> = SmallVec::new();
        src_of.push(index);
        let mut q = 0_usize;
        while q < buf.len() {
            let s = &self.nodes[src_of[q] as usize];
            if s.child_count > 0 {
                for c in s.first_child..s.first_child + s.child_count {
                    let cn = &self.nodes[c as usize];
                    #[allow(
                        clippy::cast_possible_truncation,
                        reason = "slot indices are 32-bit by design"
                    )]
                    buf.push(Node {
                        owner: cn.owner,
                        parent: q as u32,
                        first_child: UNSET_CHILD,
                        child_count: cn.child_count,
                        flags: cn.flags,
                    });
                    src_of.push(c);
                }
            }
            q += 1;
        }
        // Resolve each parent's first child as the minimum output index among
        // its children; the sentinel is the identity for the minimum.
        for q in (1..buf.len()).rev() {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "slot indices are 32-bit by design"
            )]
            let q32 = q as u32;
            let p = buf[q].parent as usize;
            if buf[p].first_child > q32 {
                buf[p].first_child = q32;
            }
        }
        Self { nodes: buf }
    }

    /// Delete the already-extracted subtree rooted at `index` in place.
    ///
    /// A filter-compact over the tail: the extracted slots appear in the
    /// source in the same relative order as in the copy (both are level
    /// order), so one identity-matched cursor tells removals from survivors.
    /// Survivors slide left, their pointers are rewritten through a remap
    /// table, and their back-references are updated.
    pub(crate) fn remove_subtree(
        &mut self,
        store: &mut Store,
        root: ItemId,
        index: u32,
        extracted: &Self,
    ) {
        debug_assert!(index > 0, "the root slot cannot be removed");
        debug_assert_eq!(
            extracted.root_owner(),
            self.nodes[index as usize].owner,
            "extracted copy must match the removal point"
        );
        let i = index as usize;
        let len = self.nodes.len();
        let parent = self.nodes[i].parent as usize;
        self.nodes[parent].child_count -= 1;
        if self.nodes[parent].child_count == 0 {
            self.nodes[parent].first_child = UNSET_CHILD;
        }

        // Pass 1: final position of every surviving tail slot. A removed
        // slot maps to the position its next survivor takes, which is
        // exactly what a parent pointing at a removed first child needs.
        let mut remap: Vec<u32> = Vec::with_capacity(len - i);
        {
            let mut dst = index;
            let mut matched = 0_usize;
            for src in i..len {
                remap.push(dst);
                if matched < extracted.len()
                    && self.nodes[src].owner == extracted.nodes[matched].owner
                {
                    matched += 1;
                } else {
                    dst += 1;
                }
            }
            debug_assert_eq!(
                matched,
                extracted.len(),
                "extracted slots must appear, in order, in the source tail"
            );
        }

        // Slots before the removal point keep their indices but may point
        // forward into the tail.
        for j in 0..i {
            let n = &mut self.nodes[j];
            if n.child_count > 0 && n.first_child >= index {
                n.first_child = remap[(n.first_child - index) as usize];
            }
        }

        // Pass 2: compact, rewriting pointers and back-references.
        let mut matched = 0_usize;
        let mut dst = i;
        for src in i..len {
            if matched < extracted.len() && self.nodes[src].owner == extracted.nodes[matched].owner
            {
                matched += 1;
                continue;
            }
            let mut n = self.nodes[src];
            if n.parent != NO_PARENT && n.parent >= index {
                n.parent = remap[(n.parent - index) as usize];
            }
            if n.child_count > 0 {
                n.first_child = remap[(n.first_child - index) as usize];
            }
            self.nodes[dst] = n;
            #[allow(
                clippy::cast_possible_truncation,
                reason = "slot indices are 32-bit by design"
            )]
            write_location(store, n.owner, root, dst as u32);
            dst += 1;
        }
        self.nodes.truncate(dst);
        #[cfg(debug_assertions)]
        self.assert_consistent();
    }

    /// Graft an extracted subtree as the new last child of `parent`.
    ///
    /// The subtree root's flags are replaced by `flags`; every grafted slot's
    /// back-reference is written. Appending past the end of the array is a
    /// straight copy with an index offset. An interior insertion point takes
    /// the general path: the existing tail and the incoming subtree are two
    /// level-ordered sequences, and their merged positions are computed
    /// level by level from child counts alone — the tail slots that stay
    /// ahead of each grafted level shift by the grafted slots already placed,
    /// the rest additionally by the current grafted level.
    pub(crate) fn insert_subtree(
        &mut self,
        store: &mut Store,
        root: ItemId,
        parent: u32,
        sub: &Self,
        flags: NodeFlags,
    ) -> u32 {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "slot indices are 32-bit by design"
        )]
        let m = sub.len() as u32;
        let ip = self.insertion_point(parent);
        let old_len = self.len_u32();

        if ip == old_len {
            // Fast path: append with offset.
            for (q, s) in sub.nodes.iter().enumerate() {
                let mut n = *s;
                if q == 0 {
                    n.parent = parent;
                    n.flags = flags;
                } else {
                    n.parent += ip;
                }
                if n.child_count > 0 {
                    n.first_child += ip;
                }
                self.nodes.push(n);
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "slot indices are 32-bit by design"
                )]
                write_location(store, n.owner, root, ip + q as u32);
            }
        } else {
            self.insert_subtree_interior(store, root, parent, sub, flags, ip, old_len, m);
        }

        let p = &mut self.nodes[parent as usize];
        if p.child_count == 0 {
            p.first_child = ip;
        }
        p.child_count += 1;
        #[cfg(debug_assertions)]
        self.assert_consistent();
        ip
    }

    /// The level-synchronized merge behind [`Self::insert_subtree`].
    #[allow(
        clippy::too_many_arguments,
        reason = "internal continuation of insert_subtree"
    )]
    fn insert_subtree_interior(
        &mut self,
        store: &mut Store,
        root: ItemId,
        parent: u32,
        sub: &Self,
        flags: NodeFlags,
        ip: u32,
        old_len: u32,
        m: u32,
    ) {
        let levels = self.level_ranges();
        let sub_levels = sub.level_ranges();
        let d = self.depth(parent);
        debug_assert!(
            d + 1 < levels.len(),
            "an interior insertion point implies a populated child level"
        );
        let (l1_start, l1_end) = levels[d + 1];
        debug_assert!(l1_start <= ip && ip <= l1_end, "insertion point sits in the parent's child level");

        // remap[i]: final index of old slot ip + i.
        // sub_remap[q]: final index of subtree slot q.
        let mut remap: Vec<u32> = vec![0; (old_len - ip) as usize];
        let mut sub_remap: Vec<u32> = vec![0; m as usize];
        // Grafted slots placed at levels before the current one.
        let mut cum = 0_u32;
        // Existing slots of the current level that stay ahead of the graft:
        // at the first level, the siblings before the insertion point; below
        // that, their descendants.
        let mut pre = ip - l1_start;
        let mut k = 0_usize;
        loop {
            let s_k = sub_levels
                .get(k)
                .map_or(0, |&(s, e)| e - s);
            match levels.get(d + 1 + k) {
                Some(&(lv_start, lv_end)) => {
                    let prefix_end = lv_start + pre;
                    for idx in lv_start.max(ip)..prefix_end {
                        remap[(idx - ip) as usize] = idx + cum;
                    }
                    if s_k > 0 {
                        let (ss, _) = sub_levels[k];
                        let start = prefix_end + cum;
                        for t in 0..s_k {
                            sub_remap[(ss + t) as usize] = start + t;
                        }
                    }
                    for idx in prefix_end..lv_end {
                        remap[(idx - ip) as usize] = idx + cum + s_k;
                    }
                    pre = self.nodes[lv_start as usize..prefix_end as usize]
                        .iter()
                        .map(|n| n.child_count)
                        .sum();
                    cum += s_k;
                }
                None => {
                    if s_k == 0 {
                        break;
                    }
                    let (ss, _) = sub_levels[k];
                    let start = old_len + cum;
                    for t in 0..s_k {
                        sub_remap[(ss + t) as usize] = start + t;
                    }
                    cum += s_k;
                }
            }
            k += 1;
        }
        debug_assert_eq!(cum, m, "every grafted slot must be placed");

        let filler = sub.nodes[0];
        self.nodes.resize((old_len + m) as usize, filler);

        // Relocate the existing tail back to front; shifts are non-negative
        // and non-decreasing toward the tail, so a target never overlaps a
        // source that has not been read yet.
        for src in (ip..old_len).rev() {
            let dst = remap[(src - ip) as usize];
            let mut n = self.nodes[src as usize];
            debug_assert!(n.parent != NO_PARENT, "tail slots are never the root");
            if n.parent >= ip {
                n.parent = remap[(n.parent - ip) as usize];
            }
            if n.child_count > 0 {
                debug_assert!(n.first_child >= ip, "children live at or after their run");
                n.first_child = remap[(n.first_child - ip) as usize];
            }
            self.nodes[dst as usize] = n;
            if dst != src {
                write_location(store, n.owner, root, dst);
            }
        }

        // Slots before the insertion point keep their indices but may point
        // forward into the relocated tail.
        for j in 0..ip {
            let n = &mut self.nodes[j as usize];
            if n.child_count > 0 && n.first_child >= ip {
                n.first_child = remap[(n.first_child - ip) as usize];
            }
        }

        // Write the grafted slots into the holes left by the merge.
        for (q, s) in sub.nodes.iter().enumerate() {
            let mut n = *s;
            if q == 0 {
                n.parent = parent;
                n.flags = flags;
            } else {
                n.parent = sub_remap[n.parent as usize];
            }
            if n.child_count > 0 {
                n.first_child = sub_remap[n.first_child as usize];
            }
            let dst = sub_remap[q];
            self.nodes[dst as usize] = n;
            write_location(store, n.owner, root, dst);
        }
    }

    /// Check every structural invariant, panicking on the first violation.
    ///
    /// Disagreement here is a defect in the edit primitives, not a caller
    /// error; the mutating primitives run this automatically in debug builds.
    pub fn assert_consistent(&self) {
        assert!(!self.nodes.is_empty(), "a forest always holds its root");
        assert_eq!(self.nodes[0].parent, NO_PARENT, "slot 0 must be the root");
        let len = self.len_u32();
        let mut child_sum = 0_u64;
        let mut prev_run: Option<u32> = None;
        for (i, n) in self.nodes.iter().enumerate() {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "slot indices are 32-bit by design"
            )]
            let i = i as u32;
            if i > 0 {
                assert!(n.parent < i, "parent must precede child at slot {i}");
            }
            child_sum += u64::from(n.child_count);
            if n.child_count > 0 {
                assert!(n.first_child > i, "child run must follow slot {i}");
                assert!(
                    n.first_child + n.child_count <= len,
                    "child run of slot {i} must stay in bounds"
                );
                for c in n.first_child..n.first_child + n.child_count {
                    assert_eq!(
                        self.nodes[c as usize].parent, i,
                        "child run of slot {i} must be contiguous"
                    );
                }
                if let Some(prev) = prev_run {
                    assert!(
                        n.first_child > prev,
                        "child runs must stay ordered by parent index (slot {i})"
                    );
                }
                prev_run = Some(n.first_child);
            } else {
                // Keeps derived equality meaningful: an emptied parent must
                // compare equal to a slot that never had children.
                assert_eq!(
                    n.first_child, UNSET_CHILD,
                    "an empty child run carries the sentinel (slot {i})"
                );
            }
        }
        assert_eq!(
            child_sum,
            u64::from(len) - 1,
            "child counts must cover every non-root slot"
        );
    }
}

/// Level-order iterator over a subtree's slot indices, excluding the subtree
/// root itself. See [`Forest::descendants`].
#[derive(Debug)]
pub struct Descendants<'a> {
    forest: &'a Forest,
    queue: VecDeque<u32>,
}

impl Iterator for Descendants<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let at = self.queue.pop_front()?;
        self.queue.extend(self.forest.children(at));
        Some(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attach(forest: &mut Forest, store: &mut Store, parent: u32) -> (ItemId, u32) {
        let root = forest.root_owner();
        let id = store.create();
        let at = forest.attach_single(store, root, parent, id, NodeFlags::empty());
        (id, at)
    }

    fn location(store: &Store, id: ItemId) -> Location {
        *store.attribute::<Location>(id).expect("item should be located")
    }

    /// root -> [a, b]; a -> [c, d]; b -> [e]; c -> [f]
    fn sample(store: &mut Store) -> (Forest, Vec<ItemId>) {
        let root_id = store.create();
        let mut f = Forest::new_root(root_id);
        write_location(store, root_id, root_id, 0);
        let (a, _) = attach(&mut f, store, 0); // index 1
        let (b, _) = attach(&mut f, store, 0); // index 2
        let (c, _) = attach(&mut f, store, 1); // index 3
        let (d, _) = attach(&mut f, store, 1); // index 4
        let (e, _) = attach(&mut f, store, 2); // index 5
        let (g, _) = attach(&mut f, store, 3); // index 6
        (f, vec![root_id, a, b, c, d, e, g])
    }

    #[test]
    fn attach_appends_and_opens_runs() {
        let mut store = Store::new();
        let (f, ids) = sample(&mut store);
        f.assert_consistent();
        let owners: Vec<ItemId> = f.owners().collect();
        assert_eq!(owners, ids);
        assert_eq!(f.node(0).child_count, 2);
        assert_eq!(f.node(0).first_child, 1);
        assert_eq!(f.node(1).first_child, 3);
        assert_eq!(f.node(2).first_child, 5);
        assert_eq!(f.node(3).first_child, 6);
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(
                location(&store, *id),
                Location {
                    root: ids[0],
                    index: i as u32
                }
            );
        }
    }

    #[test]
    fn interior_attach_shifts_only_the_tail() {
        let mut store = Store::new();
        let (mut f, ids) = sample(&mut store);
        // A third child of slot 1 (a) must land right after d (old index 4),
        // shifting e and f's child g but leaving earlier slots alone.
        let (x, at) = attach(&mut f, &mut store, 1);
        assert_eq!(at, 5);
        let owners: Vec<ItemId> = f.owners().collect();
        assert_eq!(
            owners,
            vec![ids[0], ids[1], ids[2], ids[3], ids[4], x, ids[5], ids[6]]
        );
        // Slots before the insertion point kept their indices.
        for (i, id) in ids[..5].iter().enumerate() {
            assert_eq!(location(&store, *id).index, i as u32);
        }
        // Shifted slots were re-referenced.
        assert_eq!(location(&store, ids[5]).index, 6);
        assert_eq!(location(&store, ids[6]).index, 7);
        assert_eq!(f.node(2).first_child, 6);
        assert_eq!(f.node(3).first_child, 7);
        f.assert_consistent();
    }

    #[test]
    fn remove_single_closes_the_gap() {
        let mut store = Store::new();
        let (mut f, ids) = sample(&mut store);
        let root = f.root_owner();
        // Remove d (index 4, childless).
        f.remove_single(&mut store, root, 4);
        let owners: Vec<ItemId> = f.owners().collect();
        assert_eq!(owners, vec![ids[0], ids[1], ids[2], ids[3], ids[5], ids[6]]);
        assert_eq!(f.node(1).child_count, 1);
        assert_eq!(f.node(1).first_child, 3);
        assert_eq!(f.node(2).first_child, 4);
        assert_eq!(f.node(3).first_child, 5);
        assert_eq!(location(&store, ids[5]).index, 4);
        assert_eq!(location(&store, ids[6]).index, 5);
    }

    #[test]
    fn extract_is_a_pure_level_order_copy() {
        let mut store = Store::new();
        let (f, ids) = sample(&mut store);
        let before = f.clone();
        let sub = f.extract_subtree(1, Vec::new());
        assert_eq!(f, before, "extraction must not touch the source");
        // Subtree of a: [a, c, d, g].
        let owners: Vec<ItemId> = sub.owners().collect();
        assert_eq!(owners, vec![ids[1], ids[3], ids[4], ids[6]]);
        assert_eq!(sub.node(0).parent, NO_PARENT);
        assert_eq!(sub.node(0).child_count, 2);
        assert_eq!(sub.node(0).first_child, 1);
        assert_eq!(sub.node(1).parent, 0);
        assert_eq!(sub.node(1).first_child, 3);
        assert_eq!(sub.node(2).parent, 0);
        assert_eq!(sub.node(3).parent, 1);
        sub.assert_consistent();
    }

    #[test]
    fn remove_subtree_filters_and_compacts() {
        let mut store = Store::new();
        let (mut f, ids) = sample(&mut store);
        let root = f.root_owner();
        let sub = f.extract_subtree(1, Vec::new());
        f.remove_subtree(&mut store, root, 1, &sub);
        let owners: Vec<ItemId> = f.owners().collect();
        assert_eq!(owners, vec![ids[0], ids[2], ids[5]]);
        assert_eq!(f.node(0).child_count, 1);
        assert_eq!(f.node(0).first_child, 1);
        assert_eq!(f.node(1).first_child, 2);
        assert_eq!(location(&store, ids[2]).index, 1);
        assert_eq!(location(&store, ids[5]).index, 2);
    }

    #[test]
    fn insert_subtree_append_fast_path() {
        let mut store = Store::new();
        let (mut f, ids) = sample(&mut store);
        let root = f.root_owner();
        let sub = f.extract_subtree(1, Vec::new());
        f.remove_subtree(&mut store, root, 1, &sub);
        // Grafting under e (last slot, childless) appends past the end.
        f.insert_subtree(&mut store, root, 2, &sub, NodeFlags::empty());
        let owners: Vec<ItemId> = f.owners().collect();
        assert_eq!(
            owners,
            vec![ids[0], ids[2], ids[5], ids[1], ids[3], ids[4], ids[6]]
        );
        assert_eq!(f.node(2).child_count, 1);
        assert_eq!(f.node(2).first_child, 3);
        assert_eq!(f.node(3).parent, 2);
        assert_eq!(f.node(3).first_child, 4);
        assert_eq!(f.node(6).parent, 4);
        assert_eq!(location(&store, ids[6]).index, 6);
        f.assert_consistent();
    }

    #[test]
    fn insert_subtree_interior_merge() {
        let mut store = Store::new();
        let (mut f, ids) = sample(&mut store);
        let root = f.root_owner();
        let sub = f.extract_subtree(1, Vec::new());
        f.remove_subtree(&mut store, root, 1, &sub);
        // [root, b, e]; grafting back under the root is an interior insert:
        // the subtree's levels interleave with b's subtree level by level.
        let at = f.insert_subtree(&mut store, root, 0, &sub, NodeFlags::empty());
        assert_eq!(at, 2);
        let owners: Vec<ItemId> = f.owners().collect();
        assert_eq!(
            owners,
            vec![ids[0], ids[2], ids[1], ids[5], ids[3], ids[4], ids[6]]
        );
        // root -> [b, a]; b -> [e]; a -> [c, d]; c -> [g]
        assert_eq!(f.node(0).child_count, 2);
        assert_eq!(f.node(0).first_child, 1);
        assert_eq!(f.node(1).first_child, 3);
        assert_eq!(f.node(2).parent, 0);
        assert_eq!(f.node(2).first_child, 4);
        assert_eq!(f.node(3).parent, 1);
        assert_eq!(f.node(4).parent, 2);
        assert_eq!(f.node(4).first_child, 6);
        assert_eq!(f.node(5).parent, 2);
        assert_eq!(f.node(6).parent, 4);
        for (id, at) in [
            (ids[2], 1),
            (ids[1], 2),
            (ids[5], 3),
            (ids[3], 4),
            (ids[4], 5),
            (ids[6], 6),
        ] {
            assert_eq!(location(&store, id).index, at);
        }
        f.assert_consistent();
    }

    #[test]
    fn extract_remove_insert_round_trip_restores_the_array() {
        let mut store = Store::new();
        let (mut f, _) = sample(&mut store);
        let root = f.root_owner();
        let before = f.clone();
        // b (index 2) is the root's last child, so removing and re-grafting
        // it under the root lands it back in its original position.
        let sub = f.extract_subtree(2, Vec::new());
        f.remove_subtree(&mut store, root, 2, &sub);
        f.insert_subtree(&mut store, root, 0, &sub, f.node(0).flags);
        assert_eq!(f, before);
    }

    #[test]
    fn removal_resets_an_emptied_parents_child_run() {
        let mut store = Store::new();
        let (mut f, _) = sample(&mut store);
        let root = f.root_owner();
        // g (index 6) is c's only child.
        f.remove_single(&mut store, root, 6);
        assert_eq!(f.node(3).child_count, 0);
        assert_eq!(f.node(3).first_child, UNSET_CHILD);
        // e (index 5) is b's whole subtree.
        let sub = f.extract_subtree(5, Vec::new());
        f.remove_subtree(&mut store, root, 5, &sub);
        assert_eq!(f.node(2).child_count, 0);
        assert_eq!(f.node(2).first_child, UNSET_CHILD);
        f.assert_consistent();
    }

    #[test]
    fn attach_then_remove_restores_exact_equality() {
        let mut store = Store::new();
        let (mut f, _) = sample(&mut store);
        let root = f.root_owner();
        let before = f.clone();
        // d (index 4) becomes a parent and is emptied again; no stale run
        // offset may survive to break structural comparison.
        let (_, at) = attach(&mut f, &mut store, 4);
        f.remove_single(&mut store, root, at);
        assert_eq!(f, before);
    }

    #[test]
    fn descendants_walk_in_level_order() {
        let mut store = Store::new();
        let (f, _) = sample(&mut store);
        let below_root: Vec<u32> = f.descendants(0).collect();
        assert_eq!(below_root, vec![1, 2, 3, 4, 5, 6]);
        let below_a: Vec<u32> = f.descendants(1).collect();
        assert_eq!(below_a, vec![3, 4, 6]);
        assert!(f.is_ancestor_or_self(1, 6));
        assert!(!f.is_ancestor_or_self(2, 6));
    }
}
