// Copyright 2025 the Coppice Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error taxonomy for structural edits.

use coppice_store::ItemId;
use thiserror::Error;

/// Why a structural edit was refused.
///
/// All variants are detected before the first mutation: a failed call leaves
/// every forest exactly as it was, and the caller may retry with different
/// arguments. Internal index-arithmetic corruption is not represented here —
/// it would be a defect, and is caught by debug assertions instead.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HierarchyError {
    /// An item cannot be attached to itself.
    #[error("cannot attach an item to itself")]
    SelfAttach,
    /// The edit would make an item its own ancestor.
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    WouldCycle {
        /// Requested parent.
        parent: ItemId,
        /// Requested child.
        child: ItemId,
    },
    /// A referenced item has no record in the store.
    #[error("item {0:?} does not exist")]
    NotFound(ItemId),
    /// A referenced item exists only as a cleanup record.
    #[error("item {0:?} is tombstoned")]
    Tombstoned(ItemId),
}
