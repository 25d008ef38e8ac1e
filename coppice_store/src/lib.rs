// Copyright 2025 the Coppice Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Coppice Store: a generational item store with typed attributes.
//!
//! The store is the ownership root for everything in a coppice world. Items
//! are opaque generational handles ([`ItemId`]); all interesting state hangs
//! off an item as either
//!
//! - a **typed attribute** — at most one value per Rust type per item, set and
//!   read with [`Store::set_attribute`] / [`Store::attribute`], or
//! - a **typed growable array** — at most one `Vec<T>` per element type per
//!   item, managed with [`Store::add_array`] / [`Store::array_mut`].
//!
//! Destruction is two-phase: [`Store::tombstone`] marks an item destroyed but
//! keeps its record (and attributes) readable as a cleanup record, and
//! [`Store::sweep`] reclaims all tombstoned records at a safe point. Higher
//! layers rely on the tombstone window to finish structural bookkeeping for
//! items that logically no longer exist.
//!
//! ## Example
//!
//! ```rust
//! use coppice_store::Store;
//!
//! let mut store = Store::new();
//! let item = store.create();
//! store.set_attribute(item, 7_u64);
//! assert_eq!(store.attribute::<u64>(item), Some(&7));
//!
//! store.tombstone(item);
//! assert!(store.exists(item));
//! assert!(store.is_tombstoned(item));
//! store.sweep();
//! assert!(!store.exists(item));
//! ```

use core::any::{Any, TypeId};

use hashbrown::HashMap;

/// Identifier for an item in the store (generational).
///
/// A stale `ItemId` (one whose item has been swept, or whose slot has been
/// reused) is harmless: every accessor checks the generation and treats stale
/// ids as absent.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ItemId(u32, u32);

impl ItemId {
    const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Marker wrapper distinguishing array storage from a scalar attribute of the
/// same element type.
struct ArraySlot<T>(Vec<T>);

#[derive(Default)]
struct Record {
    attrs: HashMap<TypeId, Box<dyn Any>>,
    tombstoned: bool,
}

/// A generational item store.
///
/// Slots are reused after [`Store::sweep`]; generation counters make sure a
/// handle from a previous occupant never resolves to the new one.
#[derive(Default)]
pub struct Store {
    records: Vec<Option<Record>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
}

impl core::fmt::Debug for Store {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.records.len();
        let alive = self.records.iter().filter(|r| r.is_some()).count();
        let tombstoned = self
            .records
            .iter()
            .filter(|r| r.as_ref().is_some_and(|r| r.tombstoned))
            .count();
        f.debug_struct("Store")
            .field("slots_total", &total)
            .field("items_alive", &alive)
            .field("items_tombstoned", &tombstoned)
            .field("free_list", &self.free_list.len())
            .finish()
    }
}

impl Store {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new item with no attributes.
    pub fn create(&mut self) -> ItemId {
        if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.records[idx] = Some(Record::default());
            #[allow(
                clippy::cast_possible_truncation,
                reason = "ItemId uses 32-bit indices by design."
            )]
            ItemId::new(idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.records.push(Some(Record::default()));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "ItemId uses 32-bit indices by design."
            )]
            ItemId::new((self.records.len() - 1) as u32, generation)
        }
    }

    /// Whether the item's record is present (live or tombstoned).
    #[must_use]
    pub fn exists(&self, id: ItemId) -> bool {
        self.record(id).is_some()
    }

    /// Whether the item has been marked destroyed but not yet swept.
    #[must_use]
    pub fn is_tombstoned(&self, id: ItemId) -> bool {
        self.record(id).is_some_and(|r| r.tombstoned)
    }

    /// Mark an item destroyed, keeping its record readable until [`Store::sweep`].
    pub fn tombstone(&mut self, id: ItemId) {
        if let Some(r) = self.record_mut(id) {
            r.tombstoned = true;
        }
    }

    /// Reclaim every tombstoned record. Handles to swept items become stale.
    pub fn sweep(&mut self) {
        for (idx, slot) in self.records.iter_mut().enumerate() {
            if slot.as_ref().is_some_and(|r| r.tombstoned) {
                *slot = None;
                self.free_list.push(idx);
            }
        }
    }

    /// Whether the item carries an attribute of type `T`.
    #[must_use]
    pub fn has_attribute<T: Any>(&self, id: ItemId) -> bool {
        self.record(id)
            .is_some_and(|r| r.attrs.contains_key(&TypeId::of::<T>()))
    }

    /// Read an attribute of type `T`, if present.
    #[must_use]
    pub fn attribute<T: Any>(&self, id: ItemId) -> Option<&T> {
        self.record(id)?
            .attrs
            .get(&TypeId::of::<T>())
            .and_then(|a| a.downcast_ref())
    }

    /// Read an attribute of type `T` mutably, if present.
    #[must_use]
    pub fn attribute_mut<T: Any>(&mut self, id: ItemId) -> Option<&mut T> {
        self.record_mut(id)?
            .attrs
            .get_mut(&TypeId::of::<T>())
            .and_then(|a| a.downcast_mut())
    }

    /// Set (or replace) the item's attribute of type `T`.
    ///
    /// Silently does nothing for a stale id; the caller is expected to have
    /// checked [`Store::exists`] where that matters.
    pub fn set_attribute<T: Any>(&mut self, id: ItemId, value: T) {
        if let Some(r) = self.record_mut(id) {
            r.attrs.insert(TypeId::of::<T>(), Box::new(value));
        }
    }

    /// Remove and return the item's attribute of type `T`.
    pub fn take_attribute<T: Any>(&mut self, id: ItemId) -> Option<T> {
        self.record_mut(id)?
            .attrs
            .remove(&TypeId::of::<T>())
            .and_then(|a| a.downcast().ok())
            .map(|b| *b)
    }

    /// Remove the item's attribute of type `T`, if present.
    pub fn remove_attribute<T: Any>(&mut self, id: ItemId) {
        if let Some(r) = self.record_mut(id) {
            r.attrs.remove(&TypeId::of::<T>());
        }
    }

    /// Whether the item carries a growable array with element type `T`.
    #[must_use]
    pub fn has_array<T: Any>(&self, id: ItemId) -> bool {
        self.has_attribute::<ArraySlot<T>>(id)
    }

    /// Read the item's array with element type `T`, if present.
    #[must_use]
    pub fn array<T: Any>(&self, id: ItemId) -> Option<&Vec<T>> {
        self.attribute::<ArraySlot<T>>(id).map(|s| &s.0)
    }

    /// Read the item's array with element type `T` mutably, if present.
    #[must_use]
    pub fn array_mut<T: Any>(&mut self, id: ItemId) -> Option<&mut Vec<T>> {
        self.attribute_mut::<ArraySlot<T>>(id).map(|s| &mut s.0)
    }

    /// Get the item's array with element type `T`, creating an empty one if
    /// the item has none.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    pub fn add_array<T: Any>(&mut self, id: ItemId) -> &mut Vec<T> {
        let r = self.record_mut(id).expect("stale ItemId in add_array");
        let slot = r
            .attrs
            .entry(TypeId::of::<ArraySlot<T>>())
            .or_insert_with(|| Box::new(ArraySlot::<T>(Vec::new())));
        &mut slot
            .downcast_mut::<ArraySlot<T>>()
            .expect("array slot holds its own type")
            .0
    }

    /// Remove and return the item's array with element type `T`.
    pub fn take_array<T: Any>(&mut self, id: ItemId) -> Option<Vec<T>> {
        self.take_attribute::<ArraySlot<T>>(id).map(|s| s.0)
    }

    /// Remove the item's array with element type `T`, if present.
    pub fn remove_array<T: Any>(&mut self, id: ItemId) {
        self.remove_attribute::<ArraySlot<T>>(id);
    }

    fn record(&self, id: ItemId) -> Option<&Record> {
        if self.generations.get(id.idx()) != Some(&id.1) {
            return None;
        }
        self.records.get(id.idx())?.as_ref()
    }

    fn record_mut(&mut self, id: ItemId) -> Option<&mut Record> {
        if self.generations.get(id.idx()) != Some(&id.1) {
            return None;
        }
        self.records.get_mut(id.idx())?.as_mut()
    }
}
