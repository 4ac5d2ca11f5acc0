//! Ordered in-memory key-value store with atomic write batches.
//!
//! Keys are raw bytes compared lexicographically, so every index built on
//! top of the store gets its ordering purely from its key encoding. Writes
//! go through a [`WriteBatch`]: a batch is applied all-or-nothing.
//!
//! A [`Checkpoint`] captures the whole store so a block (or one pass of it)
//! can be rolled back when a later step fails.

use std::collections::BTreeMap;
use std::ops::Bound;

#[derive(Debug, Clone, PartialEq, Eq)]
enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// A set of writes applied atomically by [`KvStore::write`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put(key.into(), value.into()));
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete(key.into()));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Snapshot of a [`KvStore`] taken by [`KvStore::checkpoint`].
#[derive(Debug, Clone)]
pub struct Checkpoint {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

/// Byte-ordered key-value store.
#[derive(Debug, Clone, Default)]
pub struct KvStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl KvStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.data.contains_key(key)
    }

    /// Apply a batch. Operations are applied in insertion order; nothing in
    /// here can fail half-way.
    pub fn write(&mut self, batch: WriteBatch) {
        for op in batch.ops {
            match op {
                BatchOp::Put(key, value) => {
                    self.data.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    self.data.remove(&key);
                }
            }
        }
    }

    /// All entries whose key starts with `prefix`, in ascending key order.
    /// Reverse with `.rev()`.
    pub fn prefix<'a>(
        &'a self,
        prefix: &[u8],
    ) -> impl DoubleEndedIterator<Item = (&'a [u8], &'a [u8])> + use<'a> {
        let end = prefix_end(prefix);
        let upper = match &end {
            Some(end) => Bound::Excluded(end.as_slice()),
            None => Bound::Unbounded,
        };
        self.data
            .range::<[u8], _>((Bound::Included(prefix), upper))
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// All entries with `start <= key < end`, in ascending key order.
    pub fn range<'a>(
        &'a self,
        start: &[u8],
        end: &[u8],
    ) -> impl DoubleEndedIterator<Item = (&'a [u8], &'a [u8])> + use<'a> {
        let upper = if end < start { start } else { end };
        self.data
            .range::<[u8], _>((Bound::Included(start), Bound::Excluded(upper)))
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Capture the current contents.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            data: self.data.clone(),
        }
    }

    /// Roll back to a previously captured checkpoint.
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.data = checkpoint.data;
    }
}

/// Smallest key greater than every key starting with `prefix`, or `None` if
/// no such key exists (empty or all-`0xFF` prefix).
fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}
