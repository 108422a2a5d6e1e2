//! Shared framing used across the buffer pool, B+ tree, and lock manager:
//! page/frame identifiers, the sentinel page id, and the RID type.

mod rid;

pub use rid::Rid;

/// A disk page identifier, monotonically allocated by the disk manager.
pub type PageId = i64;

/// The index of a frame (a pool slot) in the buffer pool's backing array.
pub type FrameId = usize;

/// A transaction identifier. Lower id = older transaction (§3, §4.4.3).
pub type TxnId = u64;

/// Marks an unused frame / absent child pointer. Never a valid allocated id,
/// since `DiskManager::allocate_page` starts counting at 0 and page 0 is
/// reserved for the B+ tree header page (§6a).
pub const INVALID_PAGE_ID: PageId = -1;

/// Well-known page holding the `index_name -> root_page_id` directory (§4.3.5).
pub const HEADER_PAGE_ID: PageId = 0;
