// Copyright 2025 the Coppice Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reusable scratch buffers for subtree extraction.

use crate::types::Node;

/// A pool of node buffers with stack discipline.
///
/// Subtree extraction needs a temporary array to hold the re-rooted copy while
/// it is cut out of the source and grafted into the destination. The arena
/// hands out cleared buffers and takes them back at the end of the enclosing
/// operation, so steady-state structural edits allocate nothing.
///
/// Every failure an operation can report is detected before a buffer is
/// acquired, so release is unconditional on the (single) mutating path.
#[derive(Debug, Default)]
pub struct ScratchArena {
    pool: Vec<Vec<Node>>,
}

impl ScratchArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a cleared buffer out of the pool, allocating one if none is free.
    pub(crate) fn acquire(&mut self) -> Vec<Node> {
        self.pool.pop().unwrap_or_default()
    }

    /// Return a buffer to the pool.
    pub(crate) fn release(&mut self, mut buf: Vec<Node>) {
        buf.clear();
        self.pool.push(buf);
    }

    /// Number of buffers currently parked in the pool.
    #[must_use]
    pub fn pooled(&self) -> usize {
        self.pool.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_are_reused() {
        let mut arena = ScratchArena::new();
        let mut buf = arena.acquire();
        buf.reserve(64);
        let cap = buf.capacity();
        arena.release(buf);
        assert_eq!(arena.pooled(), 1);

        let buf = arena.acquire();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), cap);
        assert_eq!(arena.pooled(), 0);
        arena.release(buf);
    }
}
