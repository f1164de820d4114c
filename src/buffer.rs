//! The mapped-block cache.
//!
//! Every node access goes through here: an offset is materialized as a typed
//! view over a `MAP_SHARED` mapping of the backing file, and released when
//! the view drops. At most one mapping exists per offset; a per-offset
//! reference count keeps a block pinned while any view of it is live.
//!
//! ```text
//!        most recently released          least recently
//!              |                               |
//!    +--------------------------------------------+
//!    | [o1] [o2] [o3] ...  unreferenced entries   |--> evicted (munmap)
//!    +--------------------------------------------+
//! ```
//!
//! Only unreferenced entries sit in the eviction list; their total size is
//! held under [`MAX_CACHE_BYTES`] by unmapping from the tail.

use std::{
    cell::RefCell,
    collections::{hash_map::Entry as HashEntry, HashMap, VecDeque},
    io,
    marker::PhantomData,
    mem::size_of,
    ops::{Deref, DerefMut},
    ptr::NonNull,
};

use memmap2::{MmapMut, MmapOptions};

use crate::{
    debug,
    io_engine::PagedFile,
    node::{Block, IndexNode, LeafNode, Meta},
};

/// Budget for unreferenced resident mappings.
pub const MAX_CACHE_BYTES: usize = 5 * 1024 * 1024;

/// Every entry maps this many bytes, regardless of the view type requested.
/// Uniform spans keep a block well-defined when it is acquired first through
/// a header-only view and later as a full node.
pub(crate) const BLOCK_SPAN: usize = size_of::<LeafNode>();

const _: () = assert!(BLOCK_SPAN >= size_of::<IndexNode>());
const _: () = assert!(BLOCK_SPAN >= size_of::<Meta>());

struct Entry {
    map: MmapMut,
    refs: usize,
}

struct CacheInner {
    entries: HashMap<u64, Entry>,
    /// Offsets of unreferenced entries, most recently released first.
    lru: VecDeque<u64>,
    /// Total mapped bytes across `lru`.
    lru_bytes: usize,
}

pub struct BlockCache {
    inner: RefCell<CacheInner>,
}

impl BlockCache {
    pub fn new() -> BlockCache {
        BlockCache {
            inner: RefCell::new(CacheInner {
                entries: HashMap::new(),
                lru: VecDeque::new(),
                lru_bytes: 0,
            }),
        }
    }

    /// Materialize the block at `offset` as a `T` view.
    ///
    /// A cached entry is pinned (its reference count rises and it leaves the
    /// eviction list); a miss grows the file as needed and maps the block.
    /// Mapping failure is fatal.
    pub fn acquire<'c, T: Block>(&'c self, file: &PagedFile, offset: u64) -> BlockView<'c, T> {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;

        let ptr = match inner.entries.entry(offset) {
            HashEntry::Occupied(slot) => {
                let entry = slot.into_mut();
                entry.refs += 1;
                if entry.refs == 1 {
                    // no longer evictable while borrowed
                    if let Some(pos) = inner.lru.iter().position(|&o| o == offset) {
                        inner.lru.remove(pos);
                        inner.lru_bytes -= BLOCK_SPAN;
                    }
                }
                entry.map.as_mut_ptr()
            }
            HashEntry::Vacant(slot) => {
                file.ensure_len(offset + BLOCK_SPAN as u64);
                // SAFETY: the mapping is over our own store file, which only
                // this process touches, and entries at distinct offsets hand
                // out views over disjoint block ranges.
                let map = unsafe {
                    MmapOptions::new()
                        .offset(offset)
                        .len(BLOCK_SPAN)
                        .map_mut(file.raw())
                }
                .unwrap_or_else(|e| panic!("mmap block at offset {offset}: {e}"));
                let entry = slot.insert(Entry { map, refs: 1 });
                entry.map.as_mut_ptr()
            }
        };

        BlockView {
            ptr: NonNull::new(ptr).expect("mapped block is never null").cast(),
            offset,
            cache: self,
            _marker: PhantomData,
        }
    }

    /// Drop one reference to the block at `offset`. On the last release the
    /// entry joins the eviction list and tails are unmapped until the
    /// unreferenced total fits the budget again.
    fn release(&self, offset: u64) {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;

        let entry = inner
            .entries
            .get_mut(&offset)
            .expect("released block is resident");
        debug_assert!(entry.refs > 0);
        entry.refs -= 1;
        if entry.refs > 0 {
            return;
        }

        inner.lru.push_front(offset);
        inner.lru_bytes += BLOCK_SPAN;

        while inner.lru_bytes > MAX_CACHE_BYTES {
            let Some(victim) = inner.lru.pop_back() else {
                break;
            };
            inner.entries.remove(&victim);
            inner.lru_bytes -= BLOCK_SPAN;
            log::trace!("evicted block at offset {victim}");
            debug::record_eviction();
        }
    }

    /// Flush every resident mapping back to the file.
    pub fn flush_all(&self) -> io::Result<()> {
        let inner = self.inner.borrow();
        for entry in inner.entries.values() {
            entry.map.flush()?;
        }
        Ok(())
    }
}

// Dropping the cache drops every entry, unmapping all residents whatever
// their reference counts claim; the engine closes the file afterwards.

/// Scoped view of one mapped block.
///
/// Dereferences to the block type and releases its cache reference on drop,
/// on every exit path. Holding a view pins the block: the cache will not
/// evict it.
pub struct BlockView<'c, T: Block> {
    ptr: NonNull<T>,
    offset: u64,
    cache: &'c BlockCache,
    _marker: PhantomData<&'c mut T>,
}

impl<'c, T: Block> BlockView<'c, T> {
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl<'c, T: Block> Deref for BlockView<'c, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the entry stays mapped while its reference count is
        // non-zero, and this view holds one reference until dropped.
        unsafe { self.ptr.as_ref() }
    }
}

impl<'c, T: Block> DerefMut for BlockView<'c, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above; the engine is single-writer and never holds two
        // views of the same offset at once.
        unsafe { self.ptr.as_mut() }
    }
}

impl<'c, T: Block> Drop for BlockView<'c, T> {
    fn drop(&mut self) {
        self.cache.release(self.offset);
    }
}
