use crate::common::{PageId, INVALID_PAGE_ID};

/// Fixed size of every page, in bytes. Not configurable at runtime: the
/// index page layouts below compute their key/value capacity from this
/// constant at compile time.
pub const PAGE_SIZE: usize = 4096;

/// A buffer pool frame's contents plus the bookkeeping the pool needs to
/// decide when a frame can be evicted or must be flushed (§3).
///
/// Frames are handed to callers as `Arc<RwLock<Page>>` (see
/// `BufferPoolManager::fetch_page_frame`), so a `Page`'s own lock is what
/// a B+ tree traversal latch-crabs on; the pool's internal mutex only
/// guards the page table and free list, and is never held across a
/// traversal step (§5).
///
/// `data` holds the serialized page; callers go through
/// `BPlusTreePage`/`LeafPage`/`InternalPage` to interpret it rather than
/// reading the bytes directly.
pub struct Page {
    page_id: PageId,
    pin_count: u32,
    is_dirty: bool,
    data: [u8; PAGE_SIZE],
}

impl Page {
    pub fn new_empty() -> Self {
        Self {
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            is_dirty: false,
            data: [0u8; PAGE_SIZE],
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn set_page_id(&mut self, page_id: PageId) {
        self.page_id = page_id;
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    pub fn pin(&mut self) {
        self.pin_count += 1;
    }

    /// Decrements the pin count. Returns the count after the decrement.
    /// Never underflows: unpinning an already-unpinned page is a caller
    /// bug, not silently ignored.
    pub fn unpin(&mut self) -> u32 {
        assert!(self.pin_count > 0, "unpin called on page with pin_count 0");
        self.pin_count -= 1;
        self.pin_count
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.is_dirty = dirty;
    }

    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }

    /// Resets a frame to its empty state before it is handed back out for
    /// a different page identity.
    pub fn reset(&mut self) {
        self.page_id = INVALID_PAGE_ID;
        self.pin_count = 0;
        self.is_dirty = false;
        self.data = [0u8; PAGE_SIZE];
    }
}
