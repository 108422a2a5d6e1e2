use crate::common::{PageId, INVALID_PAGE_ID};
use crate::error::{StorageError, StorageResult};

/// The key type used throughout the index. The source this is distilled
/// from is generic over key/value types via C++ templates; this
/// implementation picks one concrete pair (`i64` keys, `Rid` values) since
/// Rust generics would otherwise have to thread through every page layout,
/// the comparator, and the on-disk format for no behavioral benefit in a
/// teaching engine. See DESIGN.md.
pub type KeyType = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePageType {
    Internal,
    Leaf,
}

impl NodePageType {
    fn to_u32(self) -> u32 {
        match self {
            NodePageType::Internal => 0,
            NodePageType::Leaf => 1,
        }
    }

    fn from_u32(v: u32) -> StorageResult<Self> {
        match v {
            0 => Ok(NodePageType::Internal),
            1 => Ok(NodePageType::Leaf),
            other => Err(StorageError::InvariantViolation(format!(
                "unknown node page type tag {}",
                other
            ))),
        }
    }
}

/// Common header laid out at the front of every index page (§6a):
/// `{page_type, lsn, size, max_size, parent_page_id, page_id}`. `lsn` is
/// carried for on-disk layout fidelity; nothing in this crate's scope
/// (recovery is a non-goal) ever reads it back.
#[derive(Debug, Clone, Copy)]
pub struct NodeHeader {
    pub page_type: NodePageType,
    pub lsn: u32,
    pub size: i32,
    pub max_size: i32,
    pub parent_page_id: PageId,
    pub page_id: PageId,
}

pub const NODE_HEADER_SIZE: usize = 4 + 4 + 4 + 4 + 8 + 8;

impl NodeHeader {
    pub fn write_to(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.page_type.to_u32().to_le_bytes());
        buf[4..8].copy_from_slice(&self.lsn.to_le_bytes());
        buf[8..12].copy_from_slice(&self.size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.max_size.to_le_bytes());
        buf[16..24].copy_from_slice(&self.parent_page_id.to_le_bytes());
        buf[24..32].copy_from_slice(&self.page_id.to_le_bytes());
    }

    pub fn read_from(buf: &[u8]) -> StorageResult<Self> {
        let page_type = NodePageType::from_u32(u32::from_le_bytes(buf[0..4].try_into().unwrap()))?;
        let lsn = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let size = i32::from_le_bytes(buf[8..12].try_into().unwrap());
        let max_size = i32::from_le_bytes(buf[12..16].try_into().unwrap());
        let parent_page_id = i64::from_le_bytes(buf[16..24].try_into().unwrap());
        let page_id = i64::from_le_bytes(buf[24..32].try_into().unwrap());
        Ok(Self {
            page_type,
            lsn,
            size,
            max_size,
            parent_page_id,
            page_id,
        })
    }

    /// Peeks just the page type, without validating the rest of the
    /// header. Used to decide which overlay (leaf/internal) to parse.
    pub fn peek_type(buf: &[u8]) -> StorageResult<NodePageType> {
        NodePageType::from_u32(u32::from_le_bytes(buf[0..4].try_into().unwrap()))
    }
}

/// Whether `page_id` is the sentinel for "no such page" (e.g. an absent
/// parent/sibling link).
pub fn is_invalid(page_id: PageId) -> bool {
    page_id == INVALID_PAGE_ID
}
