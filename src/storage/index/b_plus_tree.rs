use std::sync::{Arc, RwLock as StdRwLock};

use log::{debug, info};
use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, RawRwLock};

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, Rid, HEADER_PAGE_ID, INVALID_PAGE_ID};
use crate::error::StorageResult;
use crate::storage::page::Page;

use super::header_page::HeaderPage;
use super::index_iterator::IndexIterator;
use super::internal_page::InternalPage;
use super::leaf_page::LeafPage;
use super::node::{is_invalid, KeyType, NodeHeader, NodePageType};

type WriteGuard = ArcRwLockWriteGuard<RawRwLock, Page>;
type ReadGuard = ArcRwLockReadGuard<RawRwLock, Page>;

/// A disk-resident B+ tree index whose nodes live on buffer-pool pages
/// (§4.3). One index per `(index_name, BPlusTree)` pair, sharing a buffer
/// pool and header page with any sibling indexes built over the same
/// pool.
pub struct BPlusTree {
    bpm: Arc<BufferPoolManager>,
    index_name: String,
    leaf_max_size: usize,
    internal_max_size: usize,
    /// Cached mirror of the header page's `root_page_id` entry for this
    /// index. Guards the in-memory pointer only; persisted changes go
    /// through the header page on the buffer pool (§4.3.5).
    root_page_id: StdRwLock<PageId>,
}

impl BPlusTree {
    /// Allocates and writes the header page (id `HEADER_PAGE_ID`) for a
    /// fresh backing file. Must run exactly once per database file,
    /// before any `BPlusTree::open` call, so that `HEADER_PAGE_ID` is the
    /// first id the disk manager ever hands out (§6a).
    pub fn bootstrap_header_page(bpm: &BufferPoolManager) -> StorageResult<()> {
        let (page_id, frame) = bpm.new_page()?;
        debug_assert_eq!(page_id, HEADER_PAGE_ID, "header page must be the first page allocated");
        {
            let mut w = frame.write();
            HeaderPage::new().serialize(w.data_mut())?;
        }
        bpm.unpin_page(page_id, true);
        info!("header page bootstrapped");
        Ok(())
    }

    /// Opens (or creates, within the header page's directory) the named
    /// index over `bpm`. `bootstrap_header_page` must already have run
    /// for this `bpm`'s backing file.
    pub fn open(
        bpm: Arc<BufferPoolManager>,
        index_name: &str,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> StorageResult<Self> {
        let frame = bpm.fetch_page_frame(HEADER_PAGE_ID)?;
        let mut header = { HeaderPage::deserialize(frame.read().data())? };
        let root = match header.root_of(index_name) {
            Some(root) => root,
            None => {
                header.set_root(index_name, INVALID_PAGE_ID);
                let mut w = frame.write();
                header.serialize(w.data_mut())?;
                INVALID_PAGE_ID
            }
        };
        bpm.unpin_page(HEADER_PAGE_ID, true);

        info!("opened index '{}' with root page {}", index_name, root);
        Ok(Self {
            bpm,
            index_name: index_name.to_string(),
            leaf_max_size,
            internal_max_size,
            root_page_id: StdRwLock::new(root),
        })
    }

    pub fn is_empty(&self) -> bool {
        is_invalid(*self.root_page_id.read().unwrap())
    }

    fn persist_root(&self, root_page_id: PageId) -> StorageResult<()> {
        let frame = self.bpm.fetch_page_frame(HEADER_PAGE_ID)?;
        let mut header = HeaderPage::deserialize(frame.read().data())?;
        header.set_root(&self.index_name, root_page_id);
        {
            let mut w = frame.write();
            header.serialize(w.data_mut())?;
        }
        self.bpm.unpin_page(HEADER_PAGE_ID, true);
        Ok(())
    }

    fn release_ancestors(&self, ancestors: Vec<(PageId, WriteGuard)>) {
        for (page_id, guard) in ancestors.into_iter().rev() {
            drop(guard);
            self.bpm.unpin_page(page_id, false);
        }
    }

    /// Rewrites `child_id`'s `parent_page_id` field, whichever node type
    /// it is. Used when a split or merge re-parents a subtree.
    fn set_parent(&self, child_id: PageId, new_parent: PageId) -> StorageResult<()> {
        let frame = self.bpm.fetch_page_frame(child_id)?;
        {
            let mut w = frame.write();
            match NodeHeader::peek_type(w.data())? {
                NodePageType::Leaf => {
                    let mut leaf = LeafPage::deserialize(w.data())?;
                    leaf.parent_page_id = new_parent;
                    leaf.serialize(w.data_mut());
                }
                NodePageType::Internal => {
                    let mut internal = InternalPage::deserialize(w.data())?;
                    internal.parent_page_id = new_parent;
                    internal.serialize(w.data_mut());
                }
            }
        }
        self.bpm.unpin_page(child_id, true);
        Ok(())
    }

    /// Reads and R-latches the current root, retrying if a concurrent
    /// root-growing split (`insert_into_parent`'s `ancestors.pop() ==
    /// None` branch) swaps `root_page_id` out from under us between the
    /// pointer read and the latch: a node is only really the root once
    /// its own `parent_page_id` is invalid, so re-check that under the
    /// latch before trusting the id we started with.
    fn latch_validated_root_read(&self) -> StorageResult<Option<(PageId, ReadGuard)>> {
        loop {
            let root_id = *self.root_page_id.read().unwrap();
            if is_invalid(root_id) {
                return Ok(None);
            }
            let guard = self.bpm.fetch_page_frame(root_id)?.read_arc();
            let header = NodeHeader::read_from(guard.data())?;
            if !is_invalid(header.parent_page_id) {
                drop(guard);
                self.bpm.unpin_page(root_id, false);
                continue;
            }
            return Ok(Some((root_id, guard)));
        }
    }

    /// W-latching counterpart of `latch_validated_root_read`, for the
    /// insert/remove descents.
    fn latch_validated_root_write(&self) -> StorageResult<Option<(PageId, WriteGuard)>> {
        loop {
            let root_id = *self.root_page_id.read().unwrap();
            if is_invalid(root_id) {
                return Ok(None);
            }
            let guard = self.bpm.fetch_page_frame(root_id)?.write_arc();
            let header = NodeHeader::read_from(guard.data())?;
            if !is_invalid(header.parent_page_id) {
                drop(guard);
                self.bpm.unpin_page(root_id, false);
                continue;
            }
            return Ok(Some((root_id, guard)));
        }
    }

    // ---- point lookup (§4.3.1) ----

    pub fn get_value(&self, key: KeyType) -> StorageResult<Option<Rid>> {
        let (mut current_id, mut guard) = match self.latch_validated_root_read()? {
            Some(pair) => pair,
            None => return Ok(None),
        };

        loop {
            match NodeHeader::peek_type(guard.data())? {
                NodePageType::Leaf => {
                    let leaf = LeafPage::deserialize(guard.data())?;
                    drop(guard);
                    self.bpm.unpin_page(current_id, false);
                    return Ok(leaf.find(key).map(|idx| leaf.entries[idx].1));
                }
                NodePageType::Internal => {
                    let internal = InternalPage::deserialize(guard.data())?;
                    let child_id = internal.child_for(key);
                    let child_guard = self.bpm.fetch_page_frame(child_id)?.read_arc();
                    drop(guard);
                    self.bpm.unpin_page(current_id, false);
                    current_id = child_id;
                    guard = child_guard;
                }
            }
        }
    }

    // ---- range iteration (§4.3.2) ----

    pub fn iter(self: &Arc<Self>) -> StorageResult<IndexIterator> {
        let root_id = *self.root_page_id.read().unwrap();
        if is_invalid(root_id) {
            return Ok(IndexIterator::new(self.bpm.clone(), INVALID_PAGE_ID, 0));
        }
        let mut current_id = root_id;
        loop {
            let frame = self.bpm.fetch_page_frame(current_id)?;
            let node_type = NodeHeader::peek_type(frame.read().data())?;
            match node_type {
                NodePageType::Leaf => {
                    self.bpm.unpin_page(current_id, false);
                    return Ok(IndexIterator::new(self.bpm.clone(), current_id, 0));
                }
                NodePageType::Internal => {
                    let internal = InternalPage::deserialize(frame.read().data())?;
                    self.bpm.unpin_page(current_id, false);
                    current_id = internal.entries[0].1;
                }
            }
        }
    }

    // ---- insertion (§4.3.3) ----

    pub fn insert(&self, key: KeyType, value: Rid) -> StorageResult<bool> {
        {
            let mut root_guard = self.root_page_id.write().unwrap();
            if is_invalid(*root_guard) {
                let (page_id, frame) = self.bpm.new_page()?;
                let mut leaf = LeafPage::new(page_id, INVALID_PAGE_ID, self.leaf_max_size);
                leaf.insert(key, value);
                {
                    let mut w = frame.write();
                    leaf.serialize(w.data_mut());
                }
                self.bpm.unpin_page(page_id, true);
                *root_guard = page_id;
                drop(root_guard);
                self.persist_root(page_id)?;
                debug!("index '{}': created root leaf {}", self.index_name, page_id);
                return Ok(true);
            }
        }

        let (root_id, mut current_guard) = self
            .latch_validated_root_write()?
            .expect("root was just confirmed non-empty above");
        let mut ancestors: Vec<(PageId, WriteGuard)> = Vec::new();
        let mut current_id = root_id;

        loop {
            match NodeHeader::peek_type(current_guard.data())? {
                NodePageType::Leaf => break,
                NodePageType::Internal => {
                    let internal = InternalPage::deserialize(current_guard.data())?;
                    let child_id = internal.child_for(key);
                    let child_guard = self.bpm.fetch_page_frame(child_id)?.write_arc();
                    let child_header = NodeHeader::read_from(&child_guard.data()[..])?;
                    let safe = (child_header.size as usize) < child_header.max_size as usize;

                    if safe {
                        self.release_ancestors(std::mem::take(&mut ancestors));
                        self.bpm.unpin_page(current_id, false);
                    } else {
                        ancestors.push((current_id, current_guard));
                    }
                    current_id = child_id;
                    current_guard = child_guard;
                }
            }
        }

        let leaf_id = current_id;
        let mut leaf = LeafPage::deserialize(current_guard.data())?;
        if !leaf.insert(key, value) {
            drop(current_guard);
            self.bpm.unpin_page(leaf_id, false);
            self.release_ancestors(ancestors);
            return Ok(false);
        }

        if !leaf.is_full() {
            leaf.serialize(current_guard.data_mut());
            drop(current_guard);
            self.bpm.unpin_page(leaf_id, true);
            self.release_ancestors(ancestors);
            return Ok(true);
        }

        debug!("index '{}': leaf {} overflowed, splitting", self.index_name, leaf_id);
        let upper_entries = leaf.split_off();
        let (new_leaf_id, new_frame) = self.bpm.new_page()?;
        let mut new_leaf = LeafPage::new(new_leaf_id, leaf.parent_page_id, self.leaf_max_size);
        new_leaf.entries = upper_entries;
        new_leaf.next_page_id = leaf.next_page_id;
        leaf.next_page_id = new_leaf_id;

        leaf.serialize(current_guard.data_mut());
        drop(current_guard);
        self.bpm.unpin_page(leaf_id, true);

        {
            let mut w = new_frame.write();
            new_leaf.serialize(w.data_mut());
        }
        self.bpm.unpin_page(new_leaf_id, true);

        let separator = new_leaf.first_key();
        self.insert_into_parent(leaf_id, separator, new_leaf_id, ancestors)?;
        Ok(true)
    }

    /// Propagates a split's separator key into `left_child`'s parent,
    /// recursing (and splitting further) if the parent itself overflows.
    /// If `ancestors` is empty, `left_child` was the root: a new root is
    /// allocated instead (§4.3.3 step 6).
    fn insert_into_parent(
        &self,
        left_child: PageId,
        separator: KeyType,
        right_child: PageId,
        mut ancestors: Vec<(PageId, WriteGuard)>,
    ) -> StorageResult<()> {
        let (parent_id, parent_guard) = match ancestors.pop() {
            None => {
                let (new_root_id, frame) = self.bpm.new_page()?;
                let new_root = InternalPage::new_root(
                    new_root_id,
                    left_child,
                    separator,
                    right_child,
                    self.internal_max_size,
                );
                {
                    let mut w = frame.write();
                    new_root.serialize(w.data_mut());
                }
                self.bpm.unpin_page(new_root_id, true);

                self.set_parent(left_child, new_root_id)?;
                self.set_parent(right_child, new_root_id)?;

                *self.root_page_id.write().unwrap() = new_root_id;
                self.persist_root(new_root_id)?;
                debug!("index '{}': grew a new root {}", self.index_name, new_root_id);
                return Ok(());
            }
            Some(entry) => entry,
        };

        let mut parent = InternalPage::deserialize(parent_guard.data())?;
        parent.insert_after(left_child, separator, right_child);
        self.set_parent(right_child, parent_id)?;

        if !parent.is_full() {
            parent.serialize(parent_guard.data_mut());
            drop(parent_guard);
            self.bpm.unpin_page(parent_id, true);
            self.release_ancestors(ancestors);
            return Ok(());
        }

        debug!("index '{}': internal node {} overflowed, splitting", self.index_name, parent_id);
        let upper = parent.split_off();
        let propagated_separator = upper[0].0;
        let (new_internal_id, frame) = self.bpm.new_page()?;
        let mut new_internal = InternalPage::new(new_internal_id, parent.parent_page_id, self.internal_max_size);
        new_internal.entries = upper;
        new_internal.entries[0].0 = KeyType::default();

        for (_, child_id) in new_internal.entries.clone() {
            self.set_parent(child_id, new_internal_id)?;
        }

        parent.serialize(parent_guard.data_mut());
        drop(parent_guard);
        self.bpm.unpin_page(parent_id, true);

        {
            let mut w = frame.write();
            new_internal.serialize(w.data_mut());
        }
        self.bpm.unpin_page(new_internal_id, true);

        self.insert_into_parent(parent_id, propagated_separator, new_internal_id, ancestors)
    }

    // ---- deletion (§4.3.4) ----

    pub fn remove(&self, key: KeyType) -> StorageResult<bool> {
        let (root_id, mut current_guard) = match self.latch_validated_root_write()? {
            Some(pair) => pair,
            None => return Ok(false),
        };

        let mut ancestors: Vec<(PageId, WriteGuard)> = Vec::new();
        let mut current_id = root_id;

        loop {
            match NodeHeader::peek_type(current_guard.data())? {
                NodePageType::Leaf => break,
                NodePageType::Internal => {
                    let internal = InternalPage::deserialize(current_guard.data())?;
                    let child_id = internal.child_for(key);
                    let child_guard = self.bpm.fetch_page_frame(child_id)?.write_arc();
                    let child_header = NodeHeader::read_from(&child_guard.data()[..])?;
                    let min_size = (child_header.max_size as usize + 1) / 2;
                    let safe = (child_header.size as usize) > min_size;

                    if safe {
                        self.release_ancestors(std::mem::take(&mut ancestors));
                        self.bpm.unpin_page(current_id, false);
                    } else {
                        ancestors.push((current_id, current_guard));
                    }
                    current_id = child_id;
                    current_guard = child_guard;
                }
            }
        }

        let leaf_id = current_id;
        let mut leaf = LeafPage::deserialize(current_guard.data())?;
        if leaf.remove(key).is_none() {
            drop(current_guard);
            self.bpm.unpin_page(leaf_id, false);
            self.release_ancestors(ancestors);
            return Ok(false);
        }

        let is_root = ancestors.is_empty() && leaf_id == root_id;
        if is_root || leaf.size() >= leaf.min_size() {
            let became_empty = is_root && leaf.size() == 0;
            leaf.serialize(current_guard.data_mut());
            drop(current_guard);
            self.bpm.unpin_page(leaf_id, true);
            self.release_ancestors(ancestors);
            if became_empty {
                *self.root_page_id.write().unwrap() = INVALID_PAGE_ID;
                self.persist_root(INVALID_PAGE_ID)?;
                debug!("index '{}': last leaf emptied, tree is now empty", self.index_name);
            }
            return Ok(true);
        }

        self.handle_leaf_underflow(leaf, current_guard, ancestors)?;
        Ok(true)
    }

    fn handle_leaf_underflow(
        &self,
        mut leaf: LeafPage,
        mut leaf_guard: WriteGuard,
        mut ancestors: Vec<(PageId, WriteGuard)>,
    ) -> StorageResult<()> {
        let (parent_id, parent_guard) = ancestors
            .pop()
            .expect("a non-root underflowing leaf must have a parent");
        let mut parent = InternalPage::deserialize(parent_guard.data())?;
        let idx = parent
            .index_of_child(leaf.page_id)
            .expect("leaf must be a child of its parent");

        if idx > 0 {
            let left_id = parent.entries[idx - 1].1;
            let mut left_guard = self.bpm.fetch_page_frame(left_id)?.write_arc();
            let mut left = LeafPage::deserialize(left_guard.data())?;

            if left.size() + leaf.size() > left.max_size {
                debug!("index '{}': redistributing from left leaf sibling {}", self.index_name, left_id);
                let (k, v) = left.entries.pop().unwrap();
                leaf.entries.insert(0, (k, v));
                parent.entries[idx].0 = leaf.first_key();

                left.serialize(left_guard.data_mut());
                leaf.serialize(leaf_guard.data_mut());
                parent.serialize(parent_guard.data_mut());

                self.bpm.unpin_page(left_id, true);
                self.bpm.unpin_page(leaf.page_id, true);
                self.bpm.unpin_page(parent_id, true);
                self.release_ancestors(ancestors);
                return Ok(());
            }

            debug!("index '{}': coalescing leaf {} into left sibling {}", self.index_name, leaf.page_id, left_id);
            left.entries.extend(leaf.entries.iter().copied());
            left.next_page_id = leaf.next_page_id;
            left.serialize(left_guard.data_mut());
            self.bpm.unpin_page(left_id, true);

            drop(leaf_guard);
            self.bpm.unpin_page(leaf.page_id, false);
            self.bpm.delete_page(leaf.page_id)?;
            parent.remove_child(leaf.page_id);
            return self.handle_internal_after_child_removed(parent_id, parent, parent_guard, ancestors);
        }

        let right_id = parent.entries[idx + 1].1;
        let mut right_guard = self.bpm.fetch_page_frame(right_id)?.write_arc();
        let mut right = LeafPage::deserialize(right_guard.data())?;

        if leaf.size() + right.size() > leaf.max_size {
            debug!("index '{}': redistributing from right leaf sibling {}", self.index_name, right_id);
            let (k, v) = right.entries.remove(0);
            leaf.entries.push((k, v));
            parent.entries[idx + 1].0 = right.first_key();

            leaf.serialize(leaf_guard.data_mut());
            right.serialize(right_guard.data_mut());
            parent.serialize(parent_guard.data_mut());

            self.bpm.unpin_page(leaf.page_id, true);
            self.bpm.unpin_page(right_id, true);
            self.bpm.unpin_page(parent_id, true);
            self.release_ancestors(ancestors);
            return Ok(());
        }

        debug!("index '{}': coalescing right sibling {} into leaf {}", self.index_name, right_id, leaf.page_id);
        leaf.entries.extend(right.entries.iter().copied());
        leaf.next_page_id = right.next_page_id;
        leaf.serialize(leaf_guard.data_mut());
        self.bpm.unpin_page(leaf.page_id, true);

        drop(right_guard);
        self.bpm.unpin_page(right_id, false);
        self.bpm.delete_page(right_id)?;
        parent.remove_child(right_id);
        self.handle_internal_after_child_removed(parent_id, parent, parent_guard, ancestors)
    }

    fn handle_internal_after_child_removed(
        &self,
        node_id: PageId,
        mut node: InternalPage,
        node_guard: WriteGuard,
        mut ancestors: Vec<(PageId, WriteGuard)>,
    ) -> StorageResult<()> {
        let root_id = *self.root_page_id.read().unwrap();
        let is_root = ancestors.is_empty() && node_id == root_id;

        if is_root {
            if node.size() == 1 {
                let sole_child = node.entries[0].1;
                drop(node_guard);
                self.bpm.unpin_page(node_id, false);
                self.bpm.delete_page(node_id)?;
                self.set_parent(sole_child, INVALID_PAGE_ID)?;
                *self.root_page_id.write().unwrap() = sole_child;
                self.persist_root(sole_child)?;
                debug!("index '{}': root collapsed, {} promoted to root", self.index_name, sole_child);
            } else {
                node.serialize(node_guard.data_mut());
                self.bpm.unpin_page(node_id, true);
            }
            return Ok(());
        }

        if node.size() >= node.min_size() {
            node.serialize(node_guard.data_mut());
            self.bpm.unpin_page(node_id, true);
            self.release_ancestors(ancestors);
            return Ok(());
        }

        let (parent_id, parent_guard) = ancestors
            .pop()
            .expect("a non-root underflowing internal node must have a parent");
        let mut parent = InternalPage::deserialize(parent_guard.data())?;
        let idx = parent
            .index_of_child(node_id)
            .expect("node must be a child of its parent");

        if idx > 0 {
            let left_id = parent.entries[idx - 1].1;
            let mut left_guard = self.bpm.fetch_page_frame(left_id)?.write_arc();
            let mut left = InternalPage::deserialize(left_guard.data())?;

            if left.size() + node.size() > left.max_size {
                debug!("index '{}': redistributing from left internal sibling {}", self.index_name, left_id);
                let (moved_key, moved_child) = left.entries.pop().unwrap();
                let old_separator = parent.entries[idx].0;
                node.entries[0].0 = old_separator;
                node.entries.insert(0, (KeyType::default(), moved_child));
                parent.entries[idx].0 = moved_key;
                self.set_parent(moved_child, node_id)?;

                left.serialize(left_guard.data_mut());
                node.serialize(node_guard.data_mut());
                parent.serialize(parent_guard.data_mut());

                self.bpm.unpin_page(left_id, true);
                self.bpm.unpin_page(node_id, true);
                self.bpm.unpin_page(parent_id, true);
                self.release_ancestors(ancestors);
                return Ok(());
            }

            debug!("index '{}': coalescing internal node {} into left sibling {}", self.index_name, node_id, left_id);
            let separator = parent.entries[idx].0;
            let mut moved = node.entries.clone();
            moved[0].0 = separator;
            for (_, child_id) in &moved {
                self.set_parent(*child_id, left_id)?;
            }
            left.entries.extend(moved);
            left.serialize(left_guard.data_mut());
            self.bpm.unpin_page(left_id, true);

            drop(node_guard);
            self.bpm.unpin_page(node_id, false);
            self.bpm.delete_page(node_id)?;
            parent.remove_child(node_id);
            return self.handle_internal_after_child_removed(parent_id, parent, parent_guard, ancestors);
        }

        let right_id = parent.entries[idx + 1].1;
        let mut right_guard = self.bpm.fetch_page_frame(right_id)?.write_arc();
        let mut right = InternalPage::deserialize(right_guard.data())?;

        if node.size() + right.size() > node.max_size {
            debug!("index '{}': redistributing from right internal sibling {}", self.index_name, right_id);
            let moved_child = right.entries[0].1;
            let new_separator = right.entries[1].0;
            let old_separator = parent.entries[idx + 1].0;

            node.entries.push((old_separator, moved_child));
            right.entries.remove(0);
            right.entries[0].0 = KeyType::default();
            parent.entries[idx + 1].0 = new_separator;
            self.set_parent(moved_child, node_id)?;

            node.serialize(node_guard.data_mut());
            right.serialize(right_guard.data_mut());
            parent.serialize(parent_guard.data_mut());

            self.bpm.unpin_page(node_id, true);
            self.bpm.unpin_page(right_id, true);
            self.bpm.unpin_page(parent_id, true);
            self.release_ancestors(ancestors);
            return Ok(());
        }

        debug!("index '{}': coalescing right internal sibling {} into node {}", self.index_name, right_id, node_id);
        let separator = parent.entries[idx + 1].0;
        let mut moved = right.entries.clone();
        moved[0].0 = separator;
        for (_, child_id) in &moved {
            self.set_parent(*child_id, node_id)?;
        }
        node.entries.extend(moved);
        node.serialize(node_guard.data_mut());
        self.bpm.unpin_page(node_id, true);

        drop(right_guard);
        self.bpm.unpin_page(right_id, false);
        self.bpm.delete_page(right_id)?;
        parent.remove_child(right_id);
        self.handle_internal_after_child_removed(parent_id, parent, parent_guard, ancestors)
    }
}

impl std::fmt::Debug for BPlusTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BPlusTree")
            .field("index_name", &self.index_name)
            .field("root_page_id", &*self.root_page_id.read().unwrap())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::FileDiskManager;

    fn new_tree(leaf_max: usize, internal_max: usize) -> (Arc<BufferPoolManager>, BPlusTree) {
        let dir = tempfile::tempdir().unwrap();
        let dm = Arc::new(FileDiskManager::new(dir.path().join("test.db")).unwrap());
        std::mem::forget(dir);
        let bpm = Arc::new(BufferPoolManager::new(64, dm));
        BPlusTree::bootstrap_header_page(&bpm).unwrap();
        let tree = BPlusTree::open(bpm.clone(), "idx", leaf_max, internal_max).unwrap();
        (bpm, tree)
    }

    #[test]
    fn insert_then_get_value_round_trips() {
        let (_bpm, tree) = new_tree(4, 4);
        assert!(tree.insert(1, Rid::new(1, 0)).unwrap());
        assert!(tree.insert(2, Rid::new(1, 1)).unwrap());
        assert_eq!(tree.get_value(1).unwrap(), Some(Rid::new(1, 0)));
        assert_eq!(tree.get_value(2).unwrap(), Some(Rid::new(1, 1)));
        assert_eq!(tree.get_value(3).unwrap(), None);
    }

    #[test]
    fn duplicate_insert_returns_false() {
        let (_bpm, tree) = new_tree(4, 4);
        assert!(tree.insert(1, Rid::new(1, 0)).unwrap());
        assert!(!tree.insert(1, Rid::new(2, 0)).unwrap());
    }

    #[test]
    fn sequential_inserts_trigger_splits_and_stay_retrievable() {
        let (_bpm, tree) = new_tree(4, 4);
        for k in 0..200 {
            assert!(tree.insert(k, Rid::new(k, 0)).unwrap());
        }
        for k in 0..200 {
            assert_eq!(tree.get_value(k).unwrap(), Some(Rid::new(k, 0)));
        }
    }

    #[test]
    fn iteration_yields_ascending_keys_with_no_gaps() {
        let (_bpm, tree) = new_tree(4, 4);
        let tree = Arc::new(tree);
        let mut keys: Vec<i64> = (0..100).collect();
        keys.reverse();
        for k in &keys {
            tree.insert(*k, Rid::new(*k, 0)).unwrap();
        }
        let seen: Vec<i64> = tree.iter().unwrap().map(|(k, _)| k).collect();
        let expected: Vec<i64> = (0..100).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn remove_then_get_value_returns_none() {
        let (_bpm, tree) = new_tree(4, 4);
        for k in 0..50 {
            tree.insert(k, Rid::new(k, 0)).unwrap();
        }
        assert!(tree.remove(10).unwrap());
        assert_eq!(tree.get_value(10).unwrap(), None);
        for k in 0..50 {
            if k != 10 {
                assert_eq!(tree.get_value(k).unwrap(), Some(Rid::new(k, 0)));
            }
        }
    }

    #[test]
    fn remove_missing_key_returns_false() {
        let (_bpm, tree) = new_tree(4, 4);
        tree.insert(1, Rid::new(1, 0)).unwrap();
        assert!(!tree.remove(99).unwrap());
    }

    #[test]
    fn removing_every_key_empties_the_tree() {
        let (_bpm, tree) = new_tree(4, 4);
        for k in 0..30 {
            tree.insert(k, Rid::new(k, 0)).unwrap();
        }
        for k in 0..30 {
            assert!(tree.remove(k).unwrap());
        }
        assert!(tree.is_empty());
    }

    #[test]
    fn reopening_an_index_recovers_its_root() {
        let dir = tempfile::tempdir().unwrap();
        let dm = Arc::new(FileDiskManager::new(dir.path().join("test.db")).unwrap());
        std::mem::forget(dir);
        let bpm = Arc::new(BufferPoolManager::new(64, dm));
        BPlusTree::bootstrap_header_page(&bpm).unwrap();

        {
            let tree = BPlusTree::open(bpm.clone(), "idx", 4, 4).unwrap();
            for k in 0..20 {
                tree.insert(k, Rid::new(k, 0)).unwrap();
            }
            bpm.flush_all_pages().unwrap();
        }

        let reopened = BPlusTree::open(bpm, "idx", 4, 4).unwrap();
        for k in 0..20 {
            assert_eq!(reopened.get_value(k).unwrap(), Some(Rid::new(k, 0)));
        }
    }
}
