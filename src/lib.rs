//! Burrow - an embedded, single-file ordered key-value store.
//!
//! The store is a disk-resident B+ tree of fixed-size blocks, memory-mapped
//! on demand through a bounded LRU block cache. Keys and values are short
//! bounded byte strings; the surface is point upsert, point get, point
//! delete and ordered range scan.
//!
//! One process, one writer. The store is not `Sync`, and sharing the backing
//! file between processes is undefined. Durability follows `MAP_SHARED`
//! semantics: call [`Burrow::flush`] to force writes out.

use std::path::{Path, PathBuf};

pub mod btree;
pub mod buffer;
pub mod debug;
pub mod error;
pub mod io_engine;
pub mod node;
pub mod types;

pub use btree::BPlusTree;
pub use error::StoreError;

const _: () = assert!(std::mem::size_of::<usize>() == std::mem::size_of::<u64>());

/// An open store.
pub struct Burrow {
    tree: BPlusTree,
}

impl Burrow {
    /// Open or create a store. A directory (or extensionless) path resolves
    /// to `burrow.db` inside it.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Burrow, StoreError> {
        let data_path = resolve_data_path(&path.into());
        Ok(Burrow {
            tree: BPlusTree::open(&data_path)?,
        })
    }

    /// Insert or overwrite a key. Keys and values are silently truncated to
    /// their fixed bounds.
    pub fn upsert(&mut self, key: &[u8], value: &[u8]) {
        self.tree.upsert(key, value)
    }

    /// Look up a key.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.tree.get(key)
    }

    /// Delete a key. Returns `true` iff it was present.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        self.tree.remove(key)
    }

    /// All records with `left <= key <= right`, in ascending key order.
    pub fn get_range(&self, left: &[u8], right: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.tree.get_range(left, right)
    }

    /// Number of keys in the store.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Flush all resident mappings back to the file.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.tree.flush()
    }

    /// Print the tree level by level to stderr.
    pub fn dump(&self) {
        self.tree.dump()
    }

    /// Tree height: 1 while the root is a leaf.
    pub fn height(&self) -> usize {
        self.tree.height()
    }

    /// Assert every structural invariant. Test hook.
    pub fn check_invariants(&self) {
        self.tree.check_invariants()
    }

    /// Occupancy of every leaf along the chain. Test hook.
    pub fn debug_leaf_counts(&self) -> Vec<usize> {
        self.tree.debug_leaf_counts()
    }
}

fn resolve_data_path(path: &Path) -> PathBuf {
    if path.is_dir() || path.extension().is_none() {
        path.join("burrow.db")
    } else {
        path.to_path_buf()
    }
}
