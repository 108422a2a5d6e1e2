use std::sync::Arc;

use once_cell::sync::Lazy;

use small_storage::buffer::BufferPoolManager;
use small_storage::storage::disk::{DiskManager, FileDiskManager};
use small_storage::storage::index::BPlusTree;

/// One-time `env_logger` init shared by every integration test binary,
/// driven through `once_cell::sync::Lazy`.
static LOGGING: Lazy<()> = Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
});

pub fn init_logging() {
    Lazy::force(&LOGGING);
}

/// A fresh disk manager over a throwaway file. The tempdir is leaked
/// deliberately: its lifetime would otherwise have to outlive every pool
/// built on top of it, and these are short-lived test processes.
pub fn fresh_disk_manager() -> Arc<dyn DiskManager> {
    let dir = tempfile::tempdir().unwrap();
    let disk_manager = Arc::new(FileDiskManager::new(dir.path().join("test.db")).unwrap());
    std::mem::forget(dir);
    disk_manager
}

/// A fresh buffer pool over a throwaway file-backed disk manager.
pub fn fresh_pool(pool_size: usize) -> Arc<BufferPoolManager> {
    init_logging();
    Arc::new(BufferPoolManager::new(pool_size, fresh_disk_manager()))
}

pub fn fresh_tree(pool_size: usize, leaf_max_size: usize, internal_max_size: usize) -> (Arc<BufferPoolManager>, Arc<BPlusTree>) {
    let bpm = fresh_pool(pool_size);
    BPlusTree::bootstrap_header_page(&bpm).unwrap();
    let tree = BPlusTree::open(bpm.clone(), "idx", leaf_max_size, internal_max_size).unwrap();
    (bpm, Arc::new(tree))
}
