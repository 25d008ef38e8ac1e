// Copyright 2025 the Coppice Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Coppice Hierarchy: flattened, level-ordered parent/child forests.
//!
//! Items from a [`coppice_store::Store`] are arranged into trees, and every
//! tree is stored as one contiguous array of [`Node`] slots in level order —
//! slot 0 is the root, each level is a block, and each slot's direct children
//! occupy one contiguous run. That layout keeps sibling iteration a range
//! scan and turns every structural edit into bounded splice arithmetic over
//! a single allocation per forest.
//!
//! The library has three layers:
//!
//! - [`Forest`] — the array itself, with the splice primitives (single
//!   attach/remove, subtree extract/remove/insert) and the structural
//!   invariants they maintain;
//! - [`Hierarchies`] — the reparenting engine, which classifies both ends of
//!   an edit (solo item, forest root, or internal slot) and drives the
//!   primitives across one or two forests, including tombstone mirrors and
//!   group-membership transfer;
//! - the [`Store`](coppice_store::Store) attributes the two layers maintain:
//!   a [`Location`] back-reference on every placed item, the [`Forest`] on
//!   its root, and a [`Mirror`] on destroyed roots.
//!
//! Every failed operation reports a [`HierarchyError`] before mutating
//! anything; structural corruption cannot be reported, only prevented, and is
//! checked by debug assertions inside the primitives.
//!
//! ## Example
//!
//! ```rust
//! use coppice_hierarchy::{forest, location, AttachOptions, Hierarchies};
//! use coppice_store::Store;
//!
//! let mut store = Store::new();
//! let mut hierarchies = Hierarchies::new();
//! let folder = store.create();
//! let doc = store.create();
//!
//! hierarchies.attach(&mut store, folder, doc, AttachOptions::default())?;
//!
//! let f = forest(&store, folder).unwrap();
//! assert_eq!(f.len(), 2);
//! assert_eq!(f.node(1).owner, doc);
//! assert_eq!(location(&store, doc).unwrap().index, 1);
//! # Ok::<_, coppice_hierarchy::HierarchyError>(())
//! ```

mod engine;
mod error;
mod forest;
mod scratch;
mod types;

pub use engine::{forest, location, resync_mirror, AttachOptions, DetachOptions, Hierarchies};
pub use error::HierarchyError;
pub use forest::{Descendants, Forest};
pub use scratch::ScratchArena;
pub use types::{Location, Mirror, Node, NodeFlags, NO_PARENT, UNSET_CHILD};
