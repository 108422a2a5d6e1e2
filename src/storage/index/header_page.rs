use std::collections::HashMap;

use crate::common::PageId;
use crate::error::{StorageError, StorageResult};
use crate::storage::page::PAGE_SIZE;

/// The well-known page (id `HEADER_PAGE_ID`) holding the
/// `index_name -> root_page_id` directory (§4.3.5). Laid out as a count
/// followed by packed `(name_len: u32, name: [u8], root_page_id: i64)`
/// records.
#[derive(Debug, Clone, Default)]
pub struct HeaderPage {
    pub roots: HashMap<String, PageId>,
}

impl HeaderPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root_of(&self, index_name: &str) -> Option<PageId> {
        self.roots.get(index_name).copied()
    }

    pub fn set_root(&mut self, index_name: &str, root_page_id: PageId) {
        self.roots.insert(index_name.to_string(), root_page_id);
    }

    pub fn serialize(&self, buf: &mut [u8; PAGE_SIZE]) -> StorageResult<()> {
        let mut offset = 4;
        let mut count = 0u32;
        for (name, root) in &self.roots {
            let name_bytes = name.as_bytes();
            let record_len = 4 + name_bytes.len() + 8;
            if offset + record_len > PAGE_SIZE {
                return Err(StorageError::InvariantViolation(
                    "header page directory overflowed one page".to_string(),
                ));
            }
            buf[offset..offset + 4].copy_from_slice(&(name_bytes.len() as u32).to_le_bytes());
            offset += 4;
            buf[offset..offset + name_bytes.len()].copy_from_slice(name_bytes);
            offset += name_bytes.len();
            buf[offset..offset + 8].copy_from_slice(&root.to_le_bytes());
            offset += 8;
            count += 1;
        }
        buf[0..4].copy_from_slice(&count.to_le_bytes());
        Ok(())
    }

    pub fn deserialize(buf: &[u8; PAGE_SIZE]) -> StorageResult<Self> {
        let count = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let mut offset = 4;
        let mut roots = HashMap::new();
        for _ in 0..count {
            let name_len = u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap()) as usize;
            offset += 4;
            let name = String::from_utf8(buf[offset..offset + name_len].to_vec())
                .map_err(|e| StorageError::InvariantViolation(e.to_string()))?;
            offset += name_len;
            let root = i64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap());
            offset += 8;
            roots.insert(name, root);
        }
        Ok(Self { roots })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_round_trips() {
        let mut header = HeaderPage::new();
        header.set_root("idx_a", 5);
        header.set_root("idx_b", 12);

        let mut buf = [0u8; PAGE_SIZE];
        header.serialize(&mut buf).unwrap();
        let back = HeaderPage::deserialize(&buf).unwrap();

        assert_eq!(back.root_of("idx_a"), Some(5));
        assert_eq!(back.root_of("idx_b"), Some(12));
        assert_eq!(back.root_of("idx_c"), None);
    }
}
