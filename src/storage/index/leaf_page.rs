use crate::common::{PageId, Rid, INVALID_PAGE_ID};
use crate::error::StorageResult;
use crate::storage::page::PAGE_SIZE;

use super::node::{KeyType, NodeHeader, NodePageType, NODE_HEADER_SIZE};

const NEXT_PAGE_ID_SIZE: usize = 8;
const LEAF_HEADER_SIZE: usize = NODE_HEADER_SIZE + NEXT_PAGE_ID_SIZE;
const ENTRY_SIZE: usize = 8 + 8 + 4; // key: i64, rid.page_id: i64, rid.slot_num: u32

/// An in-memory view of a leaf node page: a sorted `(key, RID)` array plus
/// the `next_page_id` sibling link (§3, §6a). Deserialized from a page's
/// bytes on fetch, mutated, and serialized back before the page is marked
/// dirty and unpinned.
#[derive(Debug, Clone)]
pub struct LeafPage {
    pub page_id: PageId,
    pub parent_page_id: PageId,
    pub next_page_id: PageId,
    pub max_size: usize,
    pub entries: Vec<(KeyType, Rid)>,
}

impl LeafPage {
    pub fn new(page_id: PageId, parent_page_id: PageId, max_size: usize) -> Self {
        Self {
            page_id,
            parent_page_id,
            next_page_id: INVALID_PAGE_ID,
            max_size,
            entries: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() > self.max_size
    }

    /// §3: non-root nodes keep `size >= ceil(max_size / 2)`.
    pub fn min_size(&self) -> usize {
        (self.max_size + 1) / 2
    }

    /// Finds `key`'s index by binary search, if present.
    pub fn find(&self, key: KeyType) -> Option<usize> {
        self.entries.binary_search_by_key(&key, |(k, _)| *k).ok()
    }

    /// Inserts `(key, rid)` in key order. Returns `false` without
    /// mutating if `key` already exists (keys are unique).
    pub fn insert(&mut self, key: KeyType, rid: Rid) -> bool {
        match self.entries.binary_search_by_key(&key, |(k, _)| *k) {
            Ok(_) => false,
            Err(pos) => {
                self.entries.insert(pos, (key, rid));
                true
            }
        }
    }

    pub fn remove(&mut self, key: KeyType) -> Option<Rid> {
        let pos = self.find(key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn first_key(&self) -> KeyType {
        self.entries[0].0
    }

    /// Splits off the upper half of entries (the new sibling), leaving
    /// `ceil(size/2)` entries behind. Returns the new sibling's entries.
    pub fn split_off(&mut self) -> Vec<(KeyType, Rid)> {
        let keep = (self.entries.len() + 1) / 2;
        self.entries.split_off(keep)
    }

    pub fn serialize(&self, buf: &mut [u8; PAGE_SIZE]) {
        let header = NodeHeader {
            page_type: NodePageType::Leaf,
            lsn: 0,
            size: self.entries.len() as i32,
            max_size: self.max_size as i32,
            parent_page_id: self.parent_page_id,
            page_id: self.page_id,
        };
        header.write_to(&mut buf[0..NODE_HEADER_SIZE]);
        buf[NODE_HEADER_SIZE..LEAF_HEADER_SIZE]
            .copy_from_slice(&self.next_page_id.to_le_bytes());

        let mut offset = LEAF_HEADER_SIZE;
        for (key, rid) in &self.entries {
            buf[offset..offset + 8].copy_from_slice(&key.to_le_bytes());
            buf[offset + 8..offset + 16].copy_from_slice(&rid.page_id().to_le_bytes());
            buf[offset + 16..offset + 20].copy_from_slice(&rid.slot_num().to_le_bytes());
            offset += ENTRY_SIZE;
        }
    }

    pub fn deserialize(buf: &[u8; PAGE_SIZE]) -> StorageResult<Self> {
        let header = NodeHeader::read_from(&buf[0..NODE_HEADER_SIZE])?;
        let next_page_id =
            i64::from_le_bytes(buf[NODE_HEADER_SIZE..LEAF_HEADER_SIZE].try_into().unwrap());

        let mut entries = Vec::with_capacity(header.size as usize);
        let mut offset = LEAF_HEADER_SIZE;
        for _ in 0..header.size {
            let key = i64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap());
            let page_id = i64::from_le_bytes(buf[offset + 8..offset + 16].try_into().unwrap());
            let slot_num = u32::from_le_bytes(buf[offset + 16..offset + 20].try_into().unwrap());
            entries.push((key, Rid::new(page_id, slot_num)));
            offset += ENTRY_SIZE;
        }

        Ok(Self {
            page_id: header.page_id,
            parent_page_id: header.parent_page_id,
            next_page_id,
            max_size: header.max_size as usize,
            entries,
        })
    }
}

/// Maximum leaf entries that fit physically in one page. Logical
/// `max_size` (from `StorageConfig`) may be set well below this; entries
/// only overflow into a split when logical `max_size` is exceeded.
pub fn leaf_physical_capacity() -> usize {
    (PAGE_SIZE - LEAF_HEADER_SIZE) / ENTRY_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_entries_sorted_and_rejects_duplicates() {
        let mut leaf = LeafPage::new(1, INVALID_PAGE_ID, 4);
        assert!(leaf.insert(5, Rid::new(1, 0)));
        assert!(leaf.insert(2, Rid::new(1, 1)));
        assert!(leaf.insert(8, Rid::new(1, 2)));
        assert!(!leaf.insert(5, Rid::new(1, 3)));
        let keys: Vec<_> = leaf.entries.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![2, 5, 8]);
    }

    #[test]
    fn serialize_round_trips() {
        let mut leaf = LeafPage::new(7, 3, 4);
        leaf.next_page_id = 9;
        leaf.insert(1, Rid::new(100, 0));
        leaf.insert(2, Rid::new(100, 1));

        let mut buf = [0u8; PAGE_SIZE];
        leaf.serialize(&mut buf);
        let back = LeafPage::deserialize(&buf).unwrap();

        assert_eq!(back.page_id, 7);
        assert_eq!(back.parent_page_id, 3);
        assert_eq!(back.next_page_id, 9);
        assert_eq!(back.entries, leaf.entries);
    }

    #[test]
    fn split_off_leaves_ceil_half_behind() {
        let mut leaf = LeafPage::new(1, INVALID_PAGE_ID, 4);
        for k in 0..5 {
            leaf.insert(k, Rid::new(1, k as u32));
        }
        let upper = leaf.split_off();
        assert_eq!(leaf.entries.len(), 3);
        assert_eq!(upper.len(), 2);
    }
}
