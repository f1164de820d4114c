//! The B+ tree engine.
//!
//! Operates on [`Meta`], [`IndexNode`] and [`LeafNode`] blocks obtained from
//! the block cache. Node kind is never tagged on disk; it follows from the
//! tree height and the descent position. All relationships between nodes are
//! file offsets, turned into short-lived [`BlockView`]s at the point of use,
//! so every mapping taken on any path is released when the view drops.
//!
//! Balance maintenance:
//! - an insert that overflows a leaf splits it at `mid = (ORDER - 1) / 2`
//!   and promotes the right half's first key; index overflow splits the same
//!   way but the promoted key is retained by neither side. Splits cascade
//!   upward until an ancestor absorbs the promotion or a new root is born;
//! - a delete that underflows a non-root node first tries to borrow one
//!   record through the parent from a same-parent sibling (left, then
//!   right), and otherwise merges with one (left preferred), pulling the
//!   separator out of the parent. Underflow propagates upward the same way,
//!   and a root index node left with no keys collapses into its only child.

use std::{mem::size_of, path::Path, ptr};

use crate::{
    buffer::{BlockCache, BlockView},
    debug,
    error::StoreError,
    io_engine::PagedFile,
    node::{
        lower_bound, upper_bound, Block, IndexNode, LeafNode, Meta, NodeBlock, NodeHeader,
    },
    types::{pack_key, pack_value, trim_nul, KeyBuf, ValueBuf, MAX_KEYS, META_OFFSET, MIN_KEYS, ORDER},
};

/// Single-writer B+ tree over one backing file.
pub struct BPlusTree {
    // cache before file: mappings are torn down before the file closes
    cache: BlockCache,
    file: PagedFile,
}

impl BPlusTree {
    /// Open or create the store at `path`. A fresh file is initialized with
    /// an empty root leaf directly behind the header.
    pub fn open(path: &Path) -> Result<BPlusTree, StoreError> {
        let file = PagedFile::open(path)?;
        let tree = BPlusTree {
            cache: BlockCache::new(),
            file,
        };

        let mut meta = tree.meta();
        if meta.height == 0 {
            meta.next_block = size_of::<Meta>() as u64;
            let root = tree.alloc::<LeafNode>(&mut meta);
            meta.root = root.offset();
            meta.height = 1;
        }
        log::debug!("opened store: height={} size={}", meta.height, meta.size);
        drop(meta);

        Ok(tree)
    }

    /// Insert `key`/`value`, overwriting in place when the key exists.
    /// Inputs beyond the fixed bounds are silently truncated.
    pub fn upsert(&mut self, key: &[u8], value: &[u8]) {
        let key = pack_key(key);
        let value = pack_value(value);

        let mut meta = self.meta();
        let of_leaf = self.leaf_offset_for(&meta, &key);
        let mut leaf = self.leaf_at(of_leaf);
        if self.insert_into_leaf(&mut meta, &mut leaf, &key, &value) <= MAX_KEYS {
            return;
        }

        // the leaf sits at ORDER records: split it and push the middle up
        let mut split = self.split_leaf(&mut meta, &mut leaf);
        let mid_key = *split.key(0);
        let mut parent = self.parent_of(&mut meta, leaf.header_mut());
        split.header.parent = leaf.header.parent;
        let count = self.insert_separator(&mut parent, &mid_key, leaf.offset(), split.offset());
        drop(leaf);
        drop(split);
        if count <= MAX_KEYS {
            return;
        }

        // split index nodes bottom-up until an ancestor absorbs the promotion
        loop {
            let mut child = parent;
            let mut split = self.split_index(&mut meta, &mut child);
            // the promoted key is parked just past the shrunk count
            let mid_key = *child.key(child.count());
            parent = self.parent_of(&mut meta, child.header_mut());
            split.header.parent = child.header.parent;
            let count =
                self.insert_separator(&mut parent, &mid_key, child.offset(), split.offset());
            if count <= MAX_KEYS {
                break;
            }
        }
    }

    /// Look up `key`. The returned value is the stored bytes up to their
    /// null padding.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let key = pack_key(key);
        let meta = self.meta();
        let leaf = self.leaf_at(self.leaf_offset_for(&meta, &key));
        let at = self.index_in_leaf(&leaf, &key)?;
        Some(trim_nul(leaf.value(at)).to_vec())
    }

    /// Delete `key`. Returns `true` iff it was present.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        let key = pack_key(key);
        let mut meta = self.meta();
        let of_leaf = self.leaf_offset_for(&meta, &key);
        let mut leaf = self.leaf_at(of_leaf);
        let at = match self.index_in_leaf(&leaf, &key) {
            Some(at) => at,
            None => return false,
        };

        leaf.remove_record_at(at);
        meta.size -= 1;

        // the root may run arbitrarily low
        if leaf.header.parent == 0 {
            return true;
        }
        if leaf.count() >= MIN_KEYS {
            return true;
        }
        if self.borrow_for_leaf(&mut leaf) {
            return true;
        }

        self.merge_leaf(&mut meta, &mut leaf);
        let mut node = self.index_at(leaf.header.parent);
        drop(leaf);

        // a merge stole a separator from the parent; rebalance upward
        while node.header.parent != 0
            && node.count() < MIN_KEYS
            && !self.borrow_for_index(&mut node)
        {
            self.merge_index(&mut node);
            let up = node.header.parent;
            drop(node);
            node = self.index_at(up);
        }

        if node.header.parent == 0 && node.count() == 0 {
            // the root lost its last separator; its sole child takes over
            let mut new_root = self.header_at(node.child(0));
            debug_assert_eq!(new_root.left, 0);
            debug_assert_eq!(new_root.right, 0);
            new_root.parent = 0;
            meta.root = new_root.self_offset;
            meta.height -= 1;
            log::debug!("root collapsed to offset {}, height {}", meta.root, meta.height);
            drop(new_root);
            self.dealloc(node);
        }

        true
    }

    /// All records with `left <= key <= right`, in ascending key order.
    /// Inverted bounds yield an empty result.
    pub fn get_range(&self, left: &[u8], right: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let left = pack_key(left);
        let right = pack_key(right);
        let meta = self.meta();
        let mut results = Vec::new();

        let mut of_leaf = self.leaf_offset_for(&meta, &left);
        let mut first = true;
        while of_leaf != 0 {
            let leaf = self.leaf_at(of_leaf);
            let from = if first {
                first = false;
                lower_bound(leaf.records(), &left)
            } else {
                0
            };
            for record in &leaf.records()[from..] {
                if record.key > right {
                    return results;
                }
                results.push((
                    trim_nul(&record.key).to_vec(),
                    trim_nul(&record.value).to_vec(),
                ));
            }
            of_leaf = leaf.header.right;
        }
        results
    }

    pub fn len(&self) -> usize {
        self.meta().size as usize
    }

    pub fn is_empty(&self) -> bool {
        self.meta().size == 0
    }

    pub fn height(&self) -> usize {
        self.meta().height as usize
    }

    /// Flush every resident mapping back to the file. Without this, writes
    /// reach the file only at the operating system's leisure.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.cache.flush_all()?;
        Ok(())
    }

    /// Print the tree level by level to stderr.
    pub fn dump(&self) {
        let meta = self.meta();
        let mut offsets = vec![meta.root];
        for level in 1..=meta.height {
            let mut line = String::new();
            let mut next = Vec::new();
            for &offset in &offsets {
                let keys: Vec<String> = if level < meta.height {
                    let node = self.index_at(offset);
                    for i in 0..=node.count() {
                        next.push(node.child(i));
                    }
                    node.keys()
                        .iter()
                        .map(|s| String::from_utf8_lossy(trim_nul(&s.key)).into_owned())
                        .collect()
                } else {
                    let leaf = self.leaf_at(offset);
                    leaf.records()
                        .iter()
                        .map(|r| String::from_utf8_lossy(trim_nul(&r.key)).into_owned())
                        .collect()
                };
                line.push_str(&format!("[{}] ", keys.join(",")));
            }
            let indent = "  ".repeat((meta.height - level) as usize);
            eprintln!("{indent}{}", line.trim_end());
            offsets = next;
        }
    }

    // ---- block access -----------------------------------------------------

    fn meta(&self) -> BlockView<'_, Meta> {
        self.cache.acquire(&self.file, META_OFFSET)
    }

    fn leaf_at(&self, offset: u64) -> BlockView<'_, LeafNode> {
        debug_assert!(offset != 0);
        self.cache.acquire(&self.file, offset)
    }

    fn index_at(&self, offset: u64) -> BlockView<'_, IndexNode> {
        debug_assert!(offset != 0);
        self.cache.acquire(&self.file, offset)
    }

    /// Type-erased view for sibling and parent maintenance when the node
    /// kind at `offset` is unknown.
    fn header_at(&self, offset: u64) -> BlockView<'_, NodeHeader> {
        debug_assert!(offset != 0);
        self.cache.acquire(&self.file, offset)
    }

    /// Carve a fresh zeroed block off the end of the file.
    fn alloc<T: NodeBlock>(&self, meta: &mut Meta) -> BlockView<'_, T> {
        let offset = meta.next_block;
        meta.next_block += size_of::<T>() as u64;
        let mut node = self.cache.acquire::<T>(&self.file, offset);
        // file growth zero-fills, but the offset may sit inside a mapping
        // that has seen earlier traffic; clear it outright
        unsafe { ptr::write_bytes(&mut *node as *mut T, 0, 1) };
        node.header_mut().self_offset = offset;
        node
    }

    /// Freed blocks are not reclaimed; the watermark only grows.
    fn dealloc<T: Block>(&self, node: BlockView<'_, T>) {
        drop(node);
    }

    // ---- search -----------------------------------------------------------

    /// Offset of the leaf that covers `key`.
    fn leaf_offset_for(&self, meta: &Meta, key: &KeyBuf) -> u64 {
        let mut height = meta.height;
        if height <= 1 {
            debug_assert_eq!(height, 1);
            return meta.root;
        }
        let mut node = self.index_at(meta.root);
        loop {
            let at = upper_bound(node.keys(), key);
            let of_child = node.child(at);
            height -= 1;
            if height == 1 {
                return of_child;
            }
            node = self.index_at(of_child);
        }
    }

    /// Position of `key` inside `leaf`, if present.
    fn index_in_leaf(&self, leaf: &LeafNode, key: &KeyBuf) -> Option<usize> {
        let at = lower_bound(leaf.records(), key);
        if at < leaf.count() && leaf.key(at) == key {
            Some(at)
        } else {
            None
        }
    }

    // ---- insert -----------------------------------------------------------

    /// Returns the leaf's record count after the operation; a result above
    /// `MAX_KEYS` means the leaf must split.
    fn insert_into_leaf(
        &self,
        meta: &mut Meta,
        leaf: &mut LeafNode,
        key: &KeyBuf,
        value: &ValueBuf,
    ) -> usize {
        debug_assert!(leaf.count() <= MAX_KEYS);
        let at = upper_bound(leaf.records(), key);
        if at > 0 && leaf.key(at - 1) == key {
            leaf.set_value(at - 1, value);
            return leaf.count();
        }
        leaf.insert_record_at(at, key, value);
        meta.size += 1;
        leaf.count()
    }

    /// Split a full leaf. The original keeps the first `mid` records, the
    /// new right sibling takes the rest and slots into the leaf chain.
    fn split_leaf(&self, meta: &mut Meta, leaf: &mut LeafNode) -> BlockView<'_, LeafNode> {
        debug_assert_eq!(leaf.count(), ORDER);
        const MID: usize = (ORDER - 1) / 2;

        let mut split = self.alloc::<LeafNode>(meta);
        leaf.header.count = MID as u64;
        split.header.count = (ORDER - MID) as u64;
        split.records[..ORDER - MID].copy_from_slice(&leaf.records[MID..]);

        split.header.left = leaf.header.self_offset;
        split.header.right = leaf.header.right;
        leaf.header.right = split.header.self_offset;
        if split.header.right != 0 {
            let mut next = self.leaf_at(split.header.right);
            next.header.left = split.header.self_offset;
        }

        log::trace!(
            "split leaf {} -> {}",
            leaf.header.self_offset,
            split.header.self_offset
        );
        debug::record_split();
        split
    }

    /// Split a full index node. The key at `mid` is promoted and retained by
    /// neither side; children moving right are reparented.
    fn split_index(&self, meta: &mut Meta, node: &mut IndexNode) -> BlockView<'_, IndexNode> {
        debug_assert_eq!(node.count(), ORDER);
        const MID: usize = (ORDER - 1) / 2;
        const RIGHT: usize = ORDER - MID - 1;

        let mut split = self.alloc::<IndexNode>(meta);
        node.header.count = MID as u64;
        split.header.count = RIGHT as u64;
        split.slots[..=RIGHT].copy_from_slice(&node.slots[MID + 1..=ORDER]);

        for i in MID + 1..=ORDER {
            let mut child = self.header_at(node.child(i));
            child.parent = split.header.self_offset;
        }

        split.header.left = node.header.self_offset;
        split.header.right = node.header.right;
        node.header.right = split.header.self_offset;
        if split.header.right != 0 {
            let mut next = self.index_at(split.header.right);
            next.header.left = split.header.self_offset;
        }

        log::trace!(
            "split index {} -> {}",
            node.header.self_offset,
            split.header.self_offset
        );
        debug::record_split();
        split
    }

    /// The parent of `child`, created on the spot when `child` was the root.
    fn parent_of(&self, meta: &mut Meta, child: &mut NodeHeader) -> BlockView<'_, IndexNode> {
        if child.parent == 0 {
            let node = self.alloc::<IndexNode>(meta);
            child.parent = node.offset();
            meta.root = node.offset();
            meta.height += 1;
            log::debug!("new root at offset {}, height {}", meta.root, meta.height);
            node
        } else {
            self.index_at(child.parent)
        }
    }

    /// Insert a promoted separator and rewire the flanking children.
    /// Returns the parent's key count afterwards.
    fn insert_separator(
        &self,
        parent: &mut IndexNode,
        key: &KeyBuf,
        left: u64,
        right: u64,
    ) -> usize {
        debug_assert!(parent.count() <= MAX_KEYS);
        let at = upper_bound(parent.keys(), key);
        parent.insert_entry_at(at, key, left);
        parent.set_child(at + 1, right);
        parent.count()
    }

    // ---- delete -----------------------------------------------------------

    fn borrow_for_leaf(&self, leaf: &mut LeafNode) -> bool {
        debug_assert_eq!(leaf.count(), MIN_KEYS - 1);
        debug_assert!(leaf.header.parent != 0);
        self.borrow_from_left_leaf(leaf) || self.borrow_from_right_leaf(leaf)
    }

    /// A sibling is a donor only if it hangs off the same parent and has
    /// keys to spare.
    fn borrow_from_left_leaf(&self, leaf: &mut LeafNode) -> bool {
        if leaf.header.left == 0 {
            return false;
        }
        let mut sibling = self.leaf_at(leaf.header.left);
        if sibling.header.parent != leaf.header.parent || sibling.count() <= MIN_KEYS {
            if sibling.header.parent == leaf.header.parent {
                debug_assert_eq!(sibling.count(), MIN_KEYS);
            }
            return false;
        }

        // the donor's last record becomes our first
        let donated = *sibling.last_record();
        leaf.insert_record_at(0, &donated.key, &donated.value);
        sibling.header.count -= 1;

        // the separator covering the donor now names our new first key
        let mut parent = self.index_at(leaf.header.parent);
        let at = upper_bound(parent.keys(), sibling.last_key());
        parent.set_key(at, &donated.key);

        debug::record_borrow();
        true
    }

    fn borrow_from_right_leaf(&self, leaf: &mut LeafNode) -> bool {
        if leaf.header.right == 0 {
            return false;
        }
        let mut sibling = self.leaf_at(leaf.header.right);
        if sibling.header.parent != leaf.header.parent || sibling.count() <= MIN_KEYS {
            if sibling.header.parent == leaf.header.parent {
                debug_assert_eq!(sibling.count(), MIN_KEYS);
            }
            return false;
        }

        // the donor's first record appends after our last
        let donated = *sibling.first_record();
        leaf.push_record(&donated);
        sibling.remove_record_at(0);

        // the separator between us and the donor tracks its new first key
        let mut parent = self.index_at(leaf.header.parent);
        let at = upper_bound(parent.keys(), sibling.last_key());
        let sep = *sibling.key(0);
        parent.set_key(at - 1, &sep);

        debug::record_borrow();
        true
    }

    /// Merge an underfull leaf with a same-parent sibling, left preferred.
    /// The preconditions guarantee one exists.
    fn merge_leaf(&self, meta: &mut Meta, leaf: &mut LeafNode) {
        debug_assert_eq!(leaf.count(), MIN_KEYS - 1);
        debug_assert!(leaf.header.parent != 0);
        debug_assert!(meta.root != leaf.header.self_offset);
        let merged = self.merge_left_leaf(leaf) || self.merge_right_leaf(leaf);
        debug_assert!(merged);
    }

    fn merge_left_leaf(&self, leaf: &mut LeafNode) -> bool {
        if leaf.header.left == 0 {
            return false;
        }
        let sibling = self.leaf_at(leaf.header.left);
        if sibling.header.parent != leaf.header.parent {
            return false;
        }
        debug_assert_eq!(sibling.count(), MIN_KEYS);

        // drop the separator covering the sibling along with its child slot
        let mut parent = self.index_at(leaf.header.parent);
        let at = upper_bound(parent.keys(), sibling.last_key());
        parent.remove_entry_at(at);
        drop(parent);

        leaf.merge_from_left(&sibling);

        leaf.header.left = sibling.header.left;
        if sibling.header.left != 0 {
            let mut prev = self.leaf_at(sibling.header.left);
            prev.header.right = leaf.header.self_offset;
        }

        log::trace!(
            "merged leaf {} into {}",
            sibling.header.self_offset,
            leaf.header.self_offset
        );
        debug::record_merge();
        self.dealloc(sibling);
        true
    }

    fn merge_right_leaf(&self, leaf: &mut LeafNode) -> bool {
        if leaf.header.right == 0 {
            return false;
        }
        let sibling = self.leaf_at(leaf.header.right);
        if sibling.header.parent != leaf.header.parent {
            return false;
        }

        // the separator left of the sibling takes over from the dropped one
        let mut parent = self.index_at(leaf.header.parent);
        let at = upper_bound(parent.keys(), sibling.last_key());
        let successor = *parent.key(at);
        parent.set_key(at - 1, &successor);
        parent.remove_entry_at(at);
        drop(parent);

        leaf.merge_from_right(&sibling);

        leaf.header.right = sibling.header.right;
        if sibling.header.right != 0 {
            let mut next = self.leaf_at(sibling.header.right);
            next.header.left = leaf.header.self_offset;
        }

        log::trace!(
            "merged leaf {} into {}",
            sibling.header.self_offset,
            leaf.header.self_offset
        );
        debug::record_merge();
        self.dealloc(sibling);
        true
    }

    fn borrow_for_index(&self, node: &mut IndexNode) -> bool {
        debug_assert_eq!(node.count(), MIN_KEYS - 1);
        self.borrow_from_left_index(node) || self.borrow_from_right_index(node)
    }

    /// Index-level borrow rotates through the parent: the separator drops
    /// down, the donor's adjacent key replaces it, and the donor's adjacent
    /// child transfers over.
    fn borrow_from_left_index(&self, node: &mut IndexNode) -> bool {
        if node.header.left == 0 {
            return false;
        }
        let mut sibling = self.index_at(node.header.left);
        if sibling.header.parent != node.header.parent || sibling.count() <= MIN_KEYS {
            if sibling.header.parent == node.header.parent {
                debug_assert_eq!(sibling.count(), MIN_KEYS);
            }
            return false;
        }

        let mut parent = self.index_at(node.header.parent);
        let at = upper_bound(parent.keys(), sibling.last_key());
        let pulled = *parent.key(at);
        node.insert_key_at(0, &pulled);
        let promoted = *sibling.last_key();
        parent.set_key(at, &promoted);

        let transferred = sibling.child(sibling.count());
        sibling.header.count -= 1;
        node.set_child(0, transferred);
        let mut child = self.header_at(transferred);
        child.parent = node.header.self_offset;

        debug::record_borrow();
        true
    }

    fn borrow_from_right_index(&self, node: &mut IndexNode) -> bool {
        if node.header.right == 0 {
            return false;
        }
        let mut sibling = self.index_at(node.header.right);
        if sibling.header.parent != node.header.parent || sibling.count() <= MIN_KEYS {
            if sibling.header.parent == node.header.parent {
                debug_assert_eq!(sibling.count(), MIN_KEYS);
            }
            return false;
        }

        let mut parent = self.index_at(node.header.parent);
        let at = upper_bound(parent.keys(), sibling.last_key());
        let pulled = *parent.key(at - 1);
        let n = node.count();
        node.set_key(n, &pulled);
        node.header.count += 1;

        let promoted = *sibling.first_key();
        parent.set_key(at - 1, &promoted);

        let transferred = sibling.child(0);
        node.set_child(node.count(), transferred);
        let mut child = self.header_at(transferred);
        child.parent = node.header.self_offset;
        sibling.remove_entry_at(0);

        debug::record_borrow();
        true
    }

    /// Merge an underfull index node with a same-parent sibling, pulling the
    /// separator between them down from the parent.
    fn merge_index(&self, node: &mut IndexNode) {
        debug_assert_eq!(node.count(), MIN_KEYS - 1);
        debug_assert!(node.header.parent != 0);
        let merged = self.merge_left_index(node) || self.merge_right_index(node);
        debug_assert!(merged);
    }

    fn merge_left_index(&self, node: &mut IndexNode) -> bool {
        if node.header.left == 0 {
            return false;
        }
        let sibling = self.index_at(node.header.left);
        if sibling.header.parent != node.header.parent {
            return false;
        }
        debug_assert_eq!(sibling.count(), MIN_KEYS);

        node.merge_from_left(&sibling);

        // absorbed children answer to us now
        for i in 0..=sibling.count() {
            let mut child = self.header_at(sibling.child(i));
            child.parent = node.header.self_offset;
        }

        node.header.left = sibling.header.left;
        if sibling.header.left != 0 {
            let mut prev = self.index_at(sibling.header.left);
            prev.header.right = node.header.self_offset;
        }

        // the separator between the two sides drops into the junction slot
        let mut parent = self.index_at(node.header.parent);
        let at = upper_bound(parent.keys(), sibling.last_key());
        let pulled = *parent.key(at);
        node.set_key(sibling.count(), &pulled);
        parent.remove_entry_at(at);

        debug::record_merge();
        self.dealloc(sibling);
        true
    }

    fn merge_right_index(&self, node: &mut IndexNode) -> bool {
        if node.header.right == 0 {
            return false;
        }
        let sibling = self.index_at(node.header.right);
        if sibling.header.parent != node.header.parent {
            return false;
        }
        debug_assert_eq!(sibling.count(), MIN_KEYS);

        // pull the separator down as our new last key, then take the sibling
        let mut parent = self.index_at(node.header.parent);
        let at = upper_bound(parent.keys(), sibling.last_key());
        let pulled = *parent.key(at - 1);
        let n = node.count();
        node.set_key(n, &pulled);
        node.header.count += 1;

        node.merge_from_right(&sibling);

        for i in 0..=sibling.count() {
            let mut child = self.header_at(sibling.child(i));
            child.parent = node.header.self_offset;
        }

        node.header.right = sibling.header.right;
        if sibling.header.right != 0 {
            let mut next = self.index_at(sibling.header.right);
            next.header.left = node.header.self_offset;
        }

        let successor = *parent.key(at);
        parent.set_key(at - 1, &successor);
        parent.remove_entry_at(at);

        debug::record_merge();
        self.dealloc(sibling);
        true
    }
}

#[derive(Clone, Copy)]
struct LinkSnap {
    offset: u64,
    left: u64,
    right: u64,
}

impl BPlusTree {
    /// Walk the whole structure and assert every invariant the mutations are
    /// supposed to preserve. Test hook; panics on the first violation.
    pub fn check_invariants(&self) {
        let meta = self.meta();
        let height = meta.height as usize;
        assert!(height >= 1, "store is initialized");
        assert!(meta.root != 0, "root offset is set");

        let mut levels: Vec<Vec<LinkSnap>> = vec![Vec::new(); height];
        let mut leaf_keys: Vec<KeyBuf> = Vec::new();
        self.verify_node(
            meta.root,
            1,
            height,
            0,
            None,
            None,
            &mut levels,
            &mut leaf_keys,
        );

        assert!(
            leaf_keys.windows(2).all(|w| w[0] < w[1]),
            "leaf keys ascend strictly"
        );
        assert_eq!(
            leaf_keys.len(),
            meta.size as usize,
            "recorded size matches leaf contents"
        );

        // each level forms one doubly-linked chain in traversal order
        for nodes in &levels {
            for pair in nodes.windows(2) {
                assert_eq!(pair[0].right, pair[1].offset, "right links follow the level");
                assert_eq!(pair[1].left, pair[0].offset, "left links mirror right links");
            }
            assert_eq!(nodes.first().unwrap().left, 0, "leftmost node has no left link");
            assert_eq!(nodes.last().unwrap().right, 0, "rightmost node has no right link");
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn verify_node(
        &self,
        offset: u64,
        level: usize,
        height: usize,
        parent: u64,
        lower: Option<KeyBuf>,
        upper: Option<KeyBuf>,
        levels: &mut [Vec<LinkSnap>],
        leaf_keys: &mut Vec<KeyBuf>,
    ) {
        let is_root = parent == 0;
        if level < height {
            let (snap, keys, children) = {
                let node = self.index_at(offset);
                assert_eq!(node.header.self_offset, offset, "node knows its offset");
                assert_eq!(node.header.parent, parent, "parent link agrees with descent");
                let keys: Vec<KeyBuf> = node.keys().iter().map(|s| s.key).collect();
                let children: Vec<u64> = (0..=node.count()).map(|i| node.child(i)).collect();
                let snap = LinkSnap {
                    offset,
                    left: node.header.left,
                    right: node.header.right,
                };
                (snap, keys, children)
            };

            if is_root {
                assert!(keys.len() <= MAX_KEYS, "root within key bound");
            } else {
                assert!(
                    (MIN_KEYS..=MAX_KEYS).contains(&keys.len()),
                    "index node occupancy within bounds"
                );
            }
            assert!(keys.windows(2).all(|w| w[0] < w[1]), "separators ascend");
            for key in &keys {
                if let Some(lo) = lower {
                    assert!(*key >= lo, "separator respects subtree lower bound");
                }
                if let Some(hi) = upper {
                    assert!(*key < hi, "separator respects subtree upper bound");
                }
            }

            levels[level - 1].push(snap);
            for (i, &child) in children.iter().enumerate() {
                let lo = if i == 0 { lower } else { Some(keys[i - 1]) };
                let hi = if i == keys.len() { upper } else { Some(keys[i]) };
                self.verify_node(child, level + 1, height, offset, lo, hi, levels, leaf_keys);
            }
        } else {
            let leaf = self.leaf_at(offset);
            assert_eq!(leaf.header.self_offset, offset, "leaf knows its offset");
            assert_eq!(leaf.header.parent, parent, "parent link agrees with descent");
            if is_root {
                assert!(leaf.count() <= MAX_KEYS, "root leaf within key bound");
            } else {
                assert!(
                    (MIN_KEYS..=MAX_KEYS).contains(&leaf.count()),
                    "leaf occupancy within bounds"
                );
            }
            for record in leaf.records() {
                if let Some(lo) = lower {
                    assert!(record.key >= lo, "leaf key respects lower bound");
                }
                if let Some(hi) = upper {
                    assert!(record.key < hi, "leaf key respects upper bound");
                }
                leaf_keys.push(record.key);
            }
            levels[level - 1].push(LinkSnap {
                offset,
                left: leaf.header.left,
                right: leaf.header.right,
            });
        }
    }

    /// Occupancy of every leaf, walked left to right along the chain.
    /// Test hook.
    pub fn debug_leaf_counts(&self) -> Vec<usize> {
        let meta = self.meta();
        let mut offset = meta.root;
        let mut level = 1;
        while level < meta.height {
            let node = self.index_at(offset);
            offset = node.child(0);
            level += 1;
        }
        let mut counts = Vec::new();
        while offset != 0 {
            let leaf = self.leaf_at(offset);
            counts.push(leaf.count());
            offset = leaf.header.right;
        }
        counts
    }
}
