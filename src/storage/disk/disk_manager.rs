use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
    sync::{atomic::{AtomicI64, Ordering}, Mutex},
};

use crate::{
    common::PageId,
    error::StorageResult,
    storage::page::PAGE_SIZE,
};

/// The boundary between the buffer pool and persistent storage (§6). A
/// frame is only ever written or read through these four operations; the
/// buffer pool never touches the filesystem directly.
pub trait DiskManager: Send + Sync {
    /// Reserves a new page id. The id is never reused, even after the page
    /// is later deallocated.
    fn allocate_page(&self) -> StorageResult<PageId>;

    /// Marks a page id as free. The concrete implementation here does not
    /// reclaim the backing space; it only stops new ids from colliding.
    fn deallocate_page(&self, page_id: PageId) -> StorageResult<()>;

    /// Reads exactly `PAGE_SIZE` bytes at `page_id`'s offset into `out`.
    fn read_page(&self, page_id: PageId, out: &mut [u8; PAGE_SIZE]) -> StorageResult<()>;

    /// Writes `data` at `page_id`'s offset, extending the file if needed.
    fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> StorageResult<()>;
}

/// A `DiskManager` backed by a single file, accessed with `seek` + `read`/
/// `write` under a mutex. One file descriptor, shared by every page;
/// there is no per-page locking below the buffer pool's own latches.
pub struct FileDiskManager {
    file: Mutex<File>,
    next_page_id: AtomicI64,
}

impl FileDiskManager {
    pub fn new<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let len = file.metadata()?.len();
        let next_page_id = (len / PAGE_SIZE as u64) as i64;
        Ok(Self {
            file: Mutex::new(file),
            next_page_id: AtomicI64::new(next_page_id),
        })
    }

    fn offset(page_id: PageId) -> u64 {
        page_id as u64 * PAGE_SIZE as u64
    }
}

impl DiskManager for FileDiskManager {
    fn allocate_page(&self) -> StorageResult<PageId> {
        Ok(self.next_page_id.fetch_add(1, Ordering::SeqCst))
    }

    fn deallocate_page(&self, _page_id: PageId) -> StorageResult<()> {
        // No free-space map; deallocated pages simply stay unreachable from
        // the header page. Reclaiming their on-disk space is out of scope.
        Ok(())
    }

    fn read_page(&self, page_id: PageId, out: &mut [u8; PAGE_SIZE]) -> StorageResult<()> {
        let mut file = self.file.lock().unwrap();
        let offset = Self::offset(page_id);
        let len = file.metadata()?.len();
        if offset >= len {
            // A page that was allocated but never written reads as zeros,
            // matching what a fresh extend-on-write file would contain.
            out.iter_mut().for_each(|b| *b = 0);
            return Ok(());
        }
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(out)?;
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> StorageResult<()> {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_ids_are_sequential_and_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let dm = FileDiskManager::new(dir.path().join("test.db")).unwrap();
        assert_eq!(dm.allocate_page().unwrap(), 0);
        assert_eq!(dm.allocate_page().unwrap(), 1);
        dm.deallocate_page(0).unwrap();
        assert_eq!(dm.allocate_page().unwrap(), 2);
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let dm = FileDiskManager::new(dir.path().join("test.db")).unwrap();
        let page_id = dm.allocate_page().unwrap();
        let mut data = [0u8; PAGE_SIZE];
        data[0] = 42;
        data[PAGE_SIZE - 1] = 7;
        dm.write_page(page_id, &data).unwrap();

        let mut out = [0u8; PAGE_SIZE];
        dm.read_page(page_id, &mut out).unwrap();
        assert_eq!(out[0], 42);
        assert_eq!(out[PAGE_SIZE - 1], 7);
    }

    #[test]
    fn unwritten_page_reads_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        let dm = FileDiskManager::new(dir.path().join("test.db")).unwrap();
        let page_id = dm.allocate_page().unwrap();
        let mut out = [1u8; PAGE_SIZE];
        dm.read_page(page_id, &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn reopening_resumes_allocation_past_existing_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        {
            let dm = FileDiskManager::new(&path).unwrap();
            let data = [0u8; PAGE_SIZE];
            dm.write_page(dm.allocate_page().unwrap(), &data).unwrap();
            dm.write_page(dm.allocate_page().unwrap(), &data).unwrap();
        }
        let dm = FileDiskManager::new(&path).unwrap();
        assert_eq!(dm.allocate_page().unwrap(), 2);
    }
}
