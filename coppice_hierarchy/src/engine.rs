// Copyright 2025 the Coppice Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The reparenting engine: attach, detach, and destroy over store-owned
//! forests.
//!
//! The structural primitives in [`crate::forest`] edit one array at a time;
//! this module decides *which* arrays an edit touches. Both endpoints of an
//! attach are classified by their [`Location`] attribute into one of three
//! placements — solo (in no forest), root of a forest, or internal to one —
//! and each of the nine parent/child combinations reduces to a short sequence
//! of primitive calls:
//!
//! - a solo parent first gets a fresh one-slot forest of its own;
//! - a solo child is a single-leaf attach;
//! - a root child's whole forest is absorbed into the destination;
//! - an internal child is extracted from its source forest, removed there,
//!   and grafted into the destination (possibly the same array).
//!
//! Forests are stored as attributes on their root item, as is the tombstone
//! [`Mirror`] for roots that have been destroyed but not yet swept. Edits
//! against a tombstoned root run on the mirror, so cleanup passes can detach
//! the survivors of a destroyed tree one by one without resurrecting it.
//!
//! A forest whittled down to its lone root stops existing: the root item
//! reverts to solo and its forest attribute is dropped.

use coppice_store::{ItemId, Store};
use tracing::{debug, instrument, trace};

use crate::error::HierarchyError;
use crate::forest::{write_location, Forest};
use crate::scratch::ScratchArena;
use crate::types::{Location, Mirror, NodeFlags};

/// Options for [`Hierarchies::attach`].
#[derive(Clone, Copy, Debug, Default)]
pub struct AttachOptions {
    /// Flags stored on the attached node (or the grafted subtree's root).
    pub flags: NodeFlags,
    /// Move the moved items' group memberships from the source root's list to
    /// the destination root's list.
    pub transfer_group: bool,
}

/// Options for [`Hierarchies::detach`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DetachOptions {
    /// Withdraw the detached items' group memberships from the source root's
    /// list; a detached subtree keeps them on its own new root.
    pub transfer_group: bool,
}

/// Where an item currently stands relative to the forests in a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Placement {
    /// In no forest at all.
    Solo,
    /// Slot 0 of its own forest.
    Root,
    /// A non-root slot of some forest.
    Internal(Location),
}

fn classify(store: &Store, id: ItemId) -> Placement {
    match store.attribute::<Location>(id) {
        None => Placement::Solo,
        Some(loc) if loc.index == 0 => {
            debug_assert_eq!(loc.root, id, "a root's back-reference names itself");
            Placement::Root
        }
        Some(loc) => Placement::Internal(*loc),
    }
}

/// The forest a root currently answers for: its live array, or its tombstone
/// mirror once the root has been destroyed.
pub fn forest(store: &Store, root: ItemId) -> Option<&Forest> {
    store
        .attribute::<Forest>(root)
        .or_else(|| store.attribute::<Mirror>(root).map(|m| &m.0))
}

/// An item's back-reference, if it currently sits in any forest.
pub fn location(store: &Store, item: ItemId) -> Option<Location> {
    store.attribute::<Location>(item).copied()
}

fn take_forest(store: &mut Store, root: ItemId, mirrored: bool) -> Forest {
    if mirrored {
        store
            .take_attribute::<Mirror>(root)
            .expect("tombstoned root must carry its mirror")
            .0
    } else {
        store
            .take_attribute::<Forest>(root)
            .expect("located items imply a forest on their root")
    }
}

fn put_forest(store: &mut Store, root: ItemId, mirrored: bool, forest: Forest) {
    if mirrored {
        store.set_attribute(root, Mirror(forest));
    } else {
        store.set_attribute(root, forest);
    }
}

/// Drop a one-slot forest and revert its root item to solo placement.
fn collapse_to_solo(store: &mut Store, root: ItemId, mirrored: bool, forest: Forest) {
    debug_assert_eq!(forest.len(), 1, "only a lone root collapses");
    debug!(?root, "forest collapsed to solo");
    store.remove_attribute::<Location>(root);
    if !mirrored {
        // A live root's stale mirror (if any) dies with the forest.
        store.remove_attribute::<Mirror>(root);
    }
    drop(forest);
}

/// Refresh a root's tombstone mirror as a wholesale copy of its live forest.
///
/// No-op unless the root carries both. Mirrors are never patched in place;
/// after any edit of the live array the whole thing is copied over. The
/// engine calls this itself after every mutation of a mirrored live forest;
/// it is public for callers that edit group lists or attributes out of band
/// and want the mirror brought back in step.
pub fn resync_mirror(store: &mut Store, root: ItemId) {
    if store.has_attribute::<Mirror>(root)
        && let Some(live) = store.attribute::<Forest>(root).cloned()
    {
        trace!(?root, "mirror refreshed");
        store.set_attribute(root, Mirror(live));
    }
}

/// Remove each of `moved` from the group list on `src_root`, returning the
/// ones that were actually members. Removal is by swap; list order is not
/// meaningful.
fn withdraw_from_group(store: &mut Store, src_root: ItemId, moved: &[ItemId]) -> Vec<ItemId> {
    let mut withdrawn = Vec::new();
    let Some(list) = store.array_mut::<ItemId>(src_root) else {
        return withdrawn;
    };
    for id in moved {
        if let Some(at) = list.iter().position(|g| g == id) {
            list.swap_remove(at);
            withdrawn.push(*id);
        }
    }
    withdrawn
}

/// Move group memberships for `moved` from one root's list to another's.
///
/// A destination list is only created when there is something to put in it.
fn transfer_group(store: &mut Store, src_root: ItemId, dest_root: ItemId, moved: &[ItemId]) {
    let withdrawn = withdraw_from_group(store, src_root, moved);
    if withdrawn.is_empty() {
        return;
    }
    debug!(
        ?src_root,
        ?dest_root,
        count = withdrawn.len(),
        "group membership transferred"
    );
    store.add_array::<ItemId>(dest_root).extend(withdrawn);
}

/// Structural edit entry points plus the scratch state they share.
///
/// Holds no item data itself; every forest, back-reference, mirror, and group
/// list lives in the [`Store`] passed to each call.
#[derive(Debug, Default)]
pub struct Hierarchies {
    scratch: ScratchArena,
}

impl Hierarchies {
    /// Create an engine with an empty scratch pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `child` (and everything below it) as the new last child of
    /// `parent`.
    ///
    /// Both items must be live. All argument checking happens before the
    /// first mutation; on `Err` nothing has changed.
    ///
    /// # Errors
    ///
    /// - [`HierarchyError::SelfAttach`] when `parent == child`.
    /// - [`HierarchyError::NotFound`] / [`HierarchyError::Tombstoned`] when
    ///   either endpoint is missing or destroyed.
    /// - [`HierarchyError::WouldCycle`] when `parent` sits inside `child`'s
    ///   subtree.
    #[instrument(skip(self, store))]
    pub fn attach(
        &mut self,
        store: &mut Store,
        parent: ItemId,
        child: ItemId,
        options: AttachOptions,
    ) -> Result<(), HierarchyError> {
        if parent == child {
            return Err(HierarchyError::SelfAttach);
        }
        for id in [parent, child] {
            if !store.exists(id) {
                return Err(HierarchyError::NotFound(id));
            }
            if store.is_tombstoned(id) {
                return Err(HierarchyError::Tombstoned(id));
            }
        }
        let parent_place = classify(store, parent);
        let child_place = classify(store, child);
        let (dest_root, parent_idx) = match parent_place {
            Placement::Solo | Placement::Root => (parent, 0),
            Placement::Internal(loc) => (loc.root, loc.index),
        };

        // Cycle guards, before any mutation.
        match child_place {
            Placement::Root if dest_root == child => {
                return Err(HierarchyError::WouldCycle { parent, child });
            }
            Placement::Internal(loc) if loc.root == dest_root => {
                let f = forest(store, dest_root).expect("located items imply a forest");
                if f.is_ancestor_or_self(loc.index, parent_idx) {
                    return Err(HierarchyError::WouldCycle { parent, child });
                }
            }
            _ => {}
        }

        if parent_place == Placement::Solo {
            debug!(?parent, "created forest for solo parent");
            store.set_attribute(parent, Forest::new_root(parent));
            write_location(store, parent, parent, 0);
        }
        let dest_mirrored = store.is_tombstoned(dest_root);

        match child_place {
            Placement::Solo => {
                let mut dest = take_forest(store, dest_root, dest_mirrored);
                dest.attach_single(store, dest_root, parent_idx, child, options.flags);
                put_forest(store, dest_root, dest_mirrored, dest);
            }
            Placement::Root => {
                let sub = store
                    .take_attribute::<Forest>(child)
                    .expect("a live root owns its forest");
                store.remove_attribute::<Mirror>(child);
                let mut dest = take_forest(store, dest_root, dest_mirrored);
                dest.insert_subtree(store, dest_root, parent_idx, &sub, options.flags);
                put_forest(store, dest_root, dest_mirrored, dest);
                if options.transfer_group && !dest_mirrored {
                    let moved: Vec<ItemId> = sub.owners().collect();
                    transfer_group(store, child, dest_root, &moved);
                }
                self.scratch.release(sub.into_nodes());
            }
            Placement::Internal(loc) => {
                let src_root = loc.root;
                let src_mirrored = store.is_tombstoned(src_root);
                let mut src = take_forest(store, src_root, src_mirrored);
                let sub = src.extract_subtree(loc.index, self.scratch.acquire());
                src.remove_subtree(store, src_root, loc.index, &sub);
                if src_root == dest_root {
                    // Same array: the removal may have shifted the parent.
                    let parent_idx = store
                        .attribute::<Location>(parent)
                        .expect("parent stays located during a same-forest move")
                        .index;
                    src.insert_subtree(store, dest_root, parent_idx, &sub, options.flags);
                    put_forest(store, dest_root, dest_mirrored, src);
                } else {
                    if src.len() == 1 {
                        collapse_to_solo(store, src_root, src_mirrored, src);
                    } else {
                        put_forest(store, src_root, src_mirrored, src);
                        if !src_mirrored {
                            resync_mirror(store, src_root);
                        }
                    }
                    let mut dest = take_forest(store, dest_root, dest_mirrored);
                    dest.insert_subtree(store, dest_root, parent_idx, &sub, options.flags);
                    put_forest(store, dest_root, dest_mirrored, dest);
                    if options.transfer_group && !src_mirrored && !dest_mirrored {
                        let moved: Vec<ItemId> = sub.owners().collect();
                        transfer_group(store, src_root, dest_root, &moved);
                    }
                }
                self.scratch.release(sub.into_nodes());
            }
        }
        if !dest_mirrored {
            resync_mirror(store, dest_root);
        }
        Ok(())
    }

    /// Detach `child` from its parent.
    ///
    /// A childless item simply leaves its forest and reverts to solo. An item
    /// with descendants becomes the root of a new forest holding its whole
    /// subtree. Detaching a solo item or a root is a no-op. The source forest
    /// collapses if only its root remains.
    ///
    /// # Errors
    ///
    /// [`HierarchyError::NotFound`] / [`HierarchyError::Tombstoned`] when
    /// `child` is missing or destroyed; nothing has changed on `Err`.
    #[instrument(skip(self, store))]
    pub fn detach(
        &mut self,
        store: &mut Store,
        child: ItemId,
        options: DetachOptions,
    ) -> Result<(), HierarchyError> {
        if !store.exists(child) {
            return Err(HierarchyError::NotFound(child));
        }
        if store.is_tombstoned(child) {
            return Err(HierarchyError::Tombstoned(child));
        }
        let Placement::Internal(loc) = classify(store, child) else {
            trace!(?child, "detach of an unattached item is a no-op");
            return Ok(());
        };
        let src_root = loc.root;
        let src_mirrored = store.is_tombstoned(src_root);
        let mut src = take_forest(store, src_root, src_mirrored);

        if src.node(loc.index).child_count == 0 {
            src.remove_single(store, src_root, loc.index);
            store.remove_attribute::<Location>(child);
            if options.transfer_group && !src_mirrored {
                let _ = withdraw_from_group(store, src_root, &[child]);
            }
        } else {
            // The subtree leaves as a forest of its own, rooted at `child`.
            let sub = src.extract_subtree(loc.index, self.scratch.acquire());
            src.remove_subtree(store, src_root, loc.index, &sub);
            for (q, n) in sub.nodes().iter().enumerate() {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "slot indices are 32-bit by design"
                )]
                write_location(store, n.owner, child, q as u32);
            }
            if options.transfer_group && !src_mirrored {
                let moved: Vec<ItemId> = sub.owners().collect();
                transfer_group(store, src_root, child, &moved);
            }
            debug!(?child, slots = sub.len(), "subtree detached into new forest");
            store.set_attribute(child, sub);
        }

        if src.len() == 1 {
            collapse_to_solo(store, src_root, src_mirrored, src);
        } else {
            put_forest(store, src_root, src_mirrored, src);
            if !src_mirrored {
                resync_mirror(store, src_root);
            }
        }
        Ok(())
    }

    /// Mark `item` destroyed, moving its live forest (if it roots one) into a
    /// tombstone [`Mirror`] so structural cleanup can keep running against it
    /// until the next sweep.
    ///
    /// # Errors
    ///
    /// [`HierarchyError::NotFound`] when `item` is missing,
    /// [`HierarchyError::Tombstoned`] when it has already been destroyed.
    #[instrument(skip(self, store))]
    pub fn tombstone(&mut self, store: &mut Store, item: ItemId) -> Result<(), HierarchyError> {
        if !store.exists(item) {
            return Err(HierarchyError::NotFound(item));
        }
        if store.is_tombstoned(item) {
            return Err(HierarchyError::Tombstoned(item));
        }
        if let Some(live) = store.take_attribute::<Forest>(item) {
            debug!(?item, slots = live.len(), "root tombstoned behind a mirror");
            store.set_attribute(item, Mirror(live));
        }
        store.tombstone(item);
        Ok(())
    }
}
