use crate::common::{PageId, INVALID_PAGE_ID};
use crate::error::StorageResult;
use crate::storage::page::PAGE_SIZE;

use super::node::{KeyType, NodeHeader, NodePageType, NODE_HEADER_SIZE};

const ENTRY_SIZE: usize = 8 + 8; // key: i64, child_page_id: i64

/// An in-memory view of an internal node page: `n` children and `n-1`
/// separator keys, stored as `n` `(key, child)` pairs where slot 0's key
/// is a dummy (§3). For children `c_0..c_{n-1}` and keys `k_1..k_{n-1}`,
/// subtree `c_i` holds keys in `[k_i, k_{i+1})`.
#[derive(Debug, Clone)]
pub struct InternalPage {
    pub page_id: PageId,
    pub parent_page_id: PageId,
    pub max_size: usize,
    /// `entries[0].0` is unused.
    pub entries: Vec<(KeyType, PageId)>,
}

impl InternalPage {
    pub fn new(page_id: PageId, parent_page_id: PageId, max_size: usize) -> Self {
        Self {
            page_id,
            parent_page_id,
            max_size,
            entries: Vec::new(),
        }
    }

    /// Creates a fresh root with exactly one separator key between two
    /// children, used when a split propagates past the old root (§4.3.3
    /// step 6).
    pub fn new_root(page_id: PageId, left: PageId, separator: KeyType, right: PageId, max_size: usize) -> Self {
        Self {
            page_id,
            parent_page_id: INVALID_PAGE_ID,
            max_size,
            entries: vec![(KeyType::default(), left), (separator, right)],
        }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() > self.max_size
    }

    pub fn min_size(&self) -> usize {
        (self.max_size + 1) / 2
    }

    pub fn children(&self) -> impl Iterator<Item = PageId> + '_ {
        self.entries.iter().map(|(_, c)| *c)
    }

    /// Finds the child subtree that `key` belongs in: the last entry
    /// whose key is `<= key`, or slot 0 if `key` is less than every
    /// separator.
    pub fn child_for(&self, key: KeyType) -> PageId {
        let mut idx = 0;
        for (i, (k, _)) in self.entries.iter().enumerate().skip(1) {
            if *k <= key {
                idx = i;
            } else {
                break;
            }
        }
        self.entries[idx].1
    }

    pub fn index_of_child(&self, child: PageId) -> Option<usize> {
        self.entries.iter().position(|(_, c)| *c == child)
    }

    /// Inserts `(key, child)` immediately after the entry for
    /// `left_child`, used when a child split hands its separator and new
    /// sibling up to the parent.
    pub fn insert_after(&mut self, left_child: PageId, key: KeyType, child: PageId) {
        let pos = self.index_of_child(left_child).expect("left child must be present") + 1;
        self.entries.insert(pos, (key, child));
    }

    pub fn first_key(&self) -> KeyType {
        self.entries[1].0
    }

    /// Splits off the upper half of entries, leaving `ceil(size/2)`
    /// behind. The returned entries' slot 0 key becomes the separator the
    /// caller propagates to the grandparent.
    pub fn split_off(&mut self) -> Vec<(KeyType, PageId)> {
        let keep = (self.entries.len() + 1) / 2;
        self.entries.split_off(keep)
    }

    pub fn remove_child(&mut self, child: PageId) -> Option<(KeyType, PageId)> {
        let pos = self.index_of_child(child)?;
        Some(self.entries.remove(pos))
    }

    pub fn serialize(&self, buf: &mut [u8; PAGE_SIZE]) {
        let header = NodeHeader {
            page_type: NodePageType::Internal,
            lsn: 0,
            size: self.entries.len() as i32,
            max_size: self.max_size as i32,
            parent_page_id: self.parent_page_id,
            page_id: self.page_id,
        };
        header.write_to(&mut buf[0..NODE_HEADER_SIZE]);

        let mut offset = NODE_HEADER_SIZE;
        for (key, child) in &self.entries {
            buf[offset..offset + 8].copy_from_slice(&key.to_le_bytes());
            buf[offset + 8..offset + 16].copy_from_slice(&child.to_le_bytes());
            offset += ENTRY_SIZE;
        }
    }

    pub fn deserialize(buf: &[u8; PAGE_SIZE]) -> StorageResult<Self> {
        let header = NodeHeader::read_from(&buf[0..NODE_HEADER_SIZE])?;

        let mut entries = Vec::with_capacity(header.size as usize);
        let mut offset = NODE_HEADER_SIZE;
        for _ in 0..header.size {
            let key = i64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap());
            let child = i64::from_le_bytes(buf[offset + 8..offset + 16].try_into().unwrap());
            entries.push((key, child));
            offset += ENTRY_SIZE;
        }

        Ok(Self {
            page_id: header.page_id,
            parent_page_id: header.parent_page_id,
            max_size: header.max_size as usize,
            entries,
        })
    }
}

pub fn internal_physical_capacity() -> usize {
    (PAGE_SIZE - NODE_HEADER_SIZE) / ENTRY_SIZE
}
