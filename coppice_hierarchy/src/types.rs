// Copyright 2025 the Coppice Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the hierarchy core: node slots, flags, and back-references.

use coppice_store::ItemId;

/// Sentinel parent index carried by the root node of a [`crate::Forest`].
pub const NO_PARENT: u32 = u32::MAX;

/// Sentinel first-child index for a node whose child run has not been placed.
///
/// `first_child` holds this value whenever `child_count == 0`: freshly
/// attached leaves carry it, a parent returns to it when its last child
/// leaves, and subtree extraction uses it as the "unknown, take the minimum"
/// seed before its resolution pass.
pub const UNSET_CHILD: u32 = u32::MAX;

bitflags::bitflags! {
    /// Per-node flags describing how the node inherits from its parent.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// Copy the parent's value onto this node when it is attached, instead
        /// of keeping the node's own value. Consumed by the value-propagation
        /// layer; the structural core only stores and moves it.
        const VALUE_FROM_PARENT = 0b0000_0001;
    }
}

/// One slot of a [`crate::Forest`]: an item reference plus parent/child
/// offsets into the same array.
///
/// Offsets are plain indices, never references; reparenting is array-splice
/// arithmetic on these fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Node {
    /// The item this slot represents.
    pub owner: ItemId,
    /// Index of the parent slot; [`NO_PARENT`] only at index 0.
    pub parent: u32,
    /// Index of the first child slot; meaningful only while `child_count > 0`.
    pub first_child: u32,
    /// Number of direct children. Children occupy the contiguous run
    /// `first_child .. first_child + child_count`.
    pub child_count: u32,
    /// Attach-inheritance flags.
    pub flags: NodeFlags,
}

impl Node {
    /// A fresh leaf slot with no parent and no children.
    #[must_use]
    pub(crate) const fn leaf(owner: ItemId, flags: NodeFlags) -> Self {
        Self {
            owner,
            parent: NO_PARENT,
            first_child: UNSET_CHILD,
            child_count: 0,
            flags,
        }
    }
}

/// Back-reference from an item to its slot: "you live at `index` of the
/// forest rooted at `root`".
///
/// Stored as a [`coppice_store::Store`] attribute on every item currently
/// represented in some forest, and rewritten by every structural primitive
/// that relocates the item's slot. This is the pair the external
/// value-propagation layer consumes; it is a lookup aid, not ownership — the
/// forest owns its slots.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Location {
    /// Root item of the forest holding this item.
    pub root: ItemId,
    /// The item's slot index within that forest.
    pub index: u32,
}

/// The tombstone mirror: a wholesale copy of a forest, kept on a root whose
/// item has been destroyed so that structural bookkeeping can finish one more
/// cycle against it.
///
/// The mirror is always refreshed as a full copy, never patched in place.
#[derive(Clone, Debug)]
pub struct Mirror(pub crate::Forest);
