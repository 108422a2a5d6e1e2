use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, info};
use parking_lot::RwLock;

use crate::common::{FrameId, PageId};
use crate::error::{StorageError, StorageResult};
use crate::storage::disk::DiskManager;
use crate::storage::page::Page;

use super::replacer::LruReplacer;

/// A buffer pool frame, independently latchable from the pool's own
/// bookkeeping mutex (§5's latch hierarchy: pool mutex, then page latch,
/// which may be held across a pool mutex release). Using `parking_lot`'s
/// arc-locking here (`read_arc`/`write_arc`) lets a B+ tree traversal hold
/// an owned latch guard across several call frames without borrowing from
/// the buffer pool itself — plain `std::sync::RwLock` guards can't do that
/// without unsafe lifetime extension.
pub type FramePtr = Arc<RwLock<Page>>;

/// Mediates all access to pages (§4.2). `fetch_page`/`new_page`/etc. lock
/// `inner` only for page-table/free-list/pin-count bookkeeping; the disk
/// read on a miss happens with `inner` held, matching the source's
/// mutex-held-during-I/O model (§5) — the frames themselves are locked
/// independently once handed out.
pub struct BufferPoolManager {
    disk_manager: Arc<dyn DiskManager>,
    replacer: LruReplacer,
    inner: Mutex<Inner>,
}

struct Inner {
    frames: Vec<FramePtr>,
    page_table: HashMap<PageId, FrameId>,
    free_list: Vec<FrameId>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk_manager: Arc<dyn DiskManager>) -> Self {
        info!("buffer pool manager starting with {} frames", pool_size);
        let frames = (0..pool_size)
            .map(|_| Arc::new(RwLock::new(Page::new_empty())))
            .collect();
        let free_list = (0..pool_size).collect();
        Self {
            disk_manager,
            replacer: LruReplacer::new(pool_size),
            inner: Mutex::new(Inner {
                frames,
                page_table: HashMap::new(),
                free_list,
            }),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.inner.lock().unwrap().frames.len()
    }

    /// Picks a frame for a new or evicted page identity: free list first,
    /// else the replacer's victim. Writes back the victim if dirty.
    /// Returns `None` if every frame is pinned.
    fn acquire_frame(&self, inner: &mut Inner) -> StorageResult<Option<FrameId>> {
        if let Some(frame_id) = inner.free_list.pop() {
            return Ok(Some(frame_id));
        }
        let frame_id = match self.replacer.victim() {
            Some(f) => f,
            None => return Ok(None),
        };
        let mut victim = inner.frames[frame_id].write();
        if victim.is_dirty() {
            debug!(
                "writing back dirty frame {} (page {})",
                frame_id,
                victim.page_id()
            );
            self.disk_manager
                .write_page(victim.page_id(), victim.data())?;
            victim.set_dirty(false);
        }
        inner.page_table.remove(&victim.page_id());
        Ok(Some(frame_id))
    }

    /// Fetches `page_id`, pinning it, and returns the frame's latch handle.
    /// Reads from disk on a miss. Callers latch-crab on the returned
    /// `FramePtr` directly (via `read_arc`/`write_arc`) and must
    /// eventually call `unpin_page`.
    pub fn fetch_page_frame(&self, page_id: PageId) -> StorageResult<FramePtr> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            inner.frames[frame_id].write().pin();
            self.replacer.pin(frame_id);
            return Ok(inner.frames[frame_id].clone());
        }

        let frame_id = self
            .acquire_frame(&mut inner)?
            .ok_or(StorageError::OutOfMemory)?;

        let mut buf = [0u8; crate::storage::page::PAGE_SIZE];
        self.disk_manager.read_page(page_id, &mut buf)?;

        {
            let mut page = inner.frames[frame_id].write();
            page.reset();
            page.set_page_id(page_id);
            *page.data_mut() = buf;
            page.pin();
        }

        inner.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        debug!("fetched page {} into frame {}", page_id, frame_id);
        Ok(inner.frames[frame_id].clone())
    }

    /// Allocates a fresh page id and pins a zeroed frame for it.
    pub fn new_page(&self) -> StorageResult<(PageId, FramePtr)> {
        let mut inner = self.inner.lock().unwrap();

        let frame_id = self
            .acquire_frame(&mut inner)?
            .ok_or(StorageError::OutOfMemory)?;

        let page_id = self.disk_manager.allocate_page()?;
        {
            let mut page = inner.frames[frame_id].write();
            page.reset();
            page.set_page_id(page_id);
            page.pin();
        }

        inner.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        debug!("allocated page {} into frame {}", page_id, frame_id);
        Ok((page_id, inner.frames[frame_id].clone()))
    }

    /// Decrements a page's pin count. `is_dirty` is OR'd into the frame's
    /// dirty flag; once dirty, a frame stays dirty until flushed.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let inner = self.inner.lock().unwrap();
        let frame_id = match inner.page_table.get(&page_id) {
            Some(&f) => f,
            None => return false,
        };
        let mut page = inner.frames[frame_id].write();
        if page.pin_count() == 0 {
            return false;
        }
        if is_dirty {
            page.set_dirty(true);
        }
        if page.unpin() == 0 {
            drop(page);
            self.replacer.unpin(frame_id);
        }
        true
    }

    /// Removes `page_id` from the pool and deallocates it on disk.
    /// Idempotent: removing an absent page succeeds. Fails if pinned.
    pub fn delete_page(&self, page_id: PageId) -> StorageResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        let frame_id = match inner.page_table.get(&page_id) {
            Some(&f) => f,
            None => return Ok(true),
        };
        if inner.frames[frame_id].read().pin_count() > 0 {
            return Ok(false);
        }
        self.replacer.pin(frame_id);
        inner.page_table.remove(&page_id);
        inner.frames[frame_id].write().reset();
        inner.free_list.push(frame_id);
        self.disk_manager.deallocate_page(page_id)?;
        Ok(true)
    }

    pub fn flush_page(&self, page_id: PageId) -> StorageResult<bool> {
        let inner = self.inner.lock().unwrap();
        let frame_id = match inner.page_table.get(&page_id) {
            Some(&f) => *f,
            None => return Ok(false),
        };
        let mut page = inner.frames[frame_id].write();
        self.disk_manager.write_page(page_id, page.data())?;
        page.set_dirty(false);
        Ok(true)
    }

    pub fn flush_all_pages(&self) -> StorageResult<()> {
        let page_ids: Vec<PageId> = {
            let inner = self.inner.lock().unwrap();
            inner.page_table.keys().copied().collect()
        };
        for page_id in page_ids {
            self.flush_page(page_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::FileDiskManager;

    fn pool(size: usize) -> BufferPoolManager {
        let dir = tempfile::tempdir().unwrap();
        let dm: Arc<dyn DiskManager> =
            Arc::new(FileDiskManager::new(dir.path().join("test.db")).unwrap());
        std::mem::forget(dir);
        BufferPoolManager::new(size, dm)
    }

    #[test]
    fn new_page_fails_once_pool_is_exhausted_and_all_pinned() {
        let bpm = pool(3);
        let mut ids = vec![];
        for _ in 0..3 {
            let (id, _) = bpm.new_page().unwrap();
            ids.push(id);
        }
        assert!(matches!(bpm.new_page(), Err(StorageError::OutOfMemory)));

        assert!(bpm.unpin_page(ids[0], false));
        bpm.new_page().unwrap();
    }

    #[test]
    fn fetch_page_returns_written_data() {
        let bpm = pool(2);
        let (page_id, frame) = bpm.new_page().unwrap();
        frame.write().data_mut()[0] = 9;
        bpm.unpin_page(page_id, true);

        bpm.new_page().unwrap();
        bpm.new_page().unwrap();

        let frame = bpm.fetch_page_frame(page_id).unwrap();
        assert_eq!(frame.read().data()[0], 9);
    }

    #[test]
    fn delete_page_fails_while_pinned() {
        let bpm = pool(2);
        let (page_id, _frame) = bpm.new_page().unwrap();
        assert_eq!(bpm.delete_page(page_id).unwrap(), false);
        bpm.unpin_page(page_id, false);
        assert_eq!(bpm.delete_page(page_id).unwrap(), true);
    }

    #[test]
    fn unpin_unknown_page_returns_false() {
        let bpm = pool(2);
        assert!(!bpm.unpin_page(999, false));
    }
}
