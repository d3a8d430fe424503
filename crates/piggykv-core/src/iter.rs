//! Host-side iterator emulation state.
//!
//! Used when the device lacks a native iterator: the key space is
//! modeled as dense unsigned integers and iteration becomes linear
//! probing with point lookups. This module only owns the cursor table;
//! the probing itself lives in the client.

use crate::{Error, Result};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Handle for one emulated iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IterId(pub u32);

/// Table of live iterator cursors, keyed by id.
///
/// Ids are allocated sequentially and never reused within one table's
/// lifetime; operations on unknown ids fail instead of touching stale
/// state.
#[derive(Debug, Default)]
pub struct IterTable {
    inner: Mutex<TableInner>,
}

#[derive(Debug, Default)]
struct TableInner {
    next_id: u32,
    cursors: FxHashMap<u32, u32>,
}

impl IterTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new iterator with its cursor at key 0.
    pub fn create(&self) -> IterId {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.cursors.insert(id, 0);
        IterId(id)
    }

    /// Read an iterator's cursor.
    pub fn cursor(&self, iter: IterId) -> Result<u32> {
        self.inner
            .lock()
            .cursors
            .get(&iter.0)
            .copied()
            .ok_or(Error::UnknownIterator(iter.0))
    }

    /// Store an iterator's cursor.
    pub fn set_cursor(&self, iter: IterId, cursor: u32) -> Result<()> {
        match self.inner.lock().cursors.get_mut(&iter.0) {
            Some(slot) => {
                *slot = cursor;
                Ok(())
            }
            None => Err(Error::UnknownIterator(iter.0)),
        }
    }

    /// Remove an iterator.
    pub fn destroy(&self, iter: IterId) -> Result<()> {
        if self.inner.lock().cursors.remove(&iter.0).is_some() {
            Ok(())
        } else {
            Err(Error::UnknownIterator(iter.0))
        }
    }

    /// Number of live iterators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().cursors.len()
    }

    /// True when no iterators are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
