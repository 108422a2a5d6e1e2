mod support;

use small_storage::buffer::BufferPoolManager;
use small_storage::error::StorageError;

/// Scenario 1 (§8): a pool of 3 frames serves 3 `NewPage` calls, then
/// refuses a 4th until one of the first three is unpinned.
#[test]
fn exhausted_pool_unblocks_after_an_unpin() {
    let bpm = support::fresh_pool(3);

    let mut ids = Vec::new();
    for _ in 0..3 {
        let (id, _frame) = bpm.new_page().unwrap();
        ids.push(id);
    }
    assert_eq!(ids.len(), 3);
    assert_eq!(ids.iter().collect::<std::collections::HashSet<_>>().len(), 3);

    assert!(matches!(bpm.new_page(), Err(StorageError::OutOfMemory)));

    assert!(bpm.unpin_page(ids[0], false));
    let (new_id, _frame) = bpm.new_page().unwrap();
    assert_ne!(new_id, ids[0]);
}

#[test]
fn flush_all_pages_persists_every_resident_dirty_page_to_disk() {
    let disk_manager = support::fresh_disk_manager();
    let bpm = BufferPoolManager::new(4, disk_manager.clone());

    let mut ids = Vec::new();
    for tag in 0u8..3 {
        let (id, frame) = bpm.new_page().unwrap();
        frame.write().data_mut()[0] = tag;
        bpm.unpin_page(id, true);
        ids.push(id);
    }
    bpm.flush_all_pages().unwrap();
    drop(bpm);

    // A second pool over the same disk manager only ever sees what made
    // it to disk, proving the flush actually wrote through.
    let reopened = BufferPoolManager::new(4, disk_manager);
    for (tag, id) in ids.into_iter().enumerate() {
        let frame = reopened.fetch_page_frame(id).unwrap();
        assert_eq!(frame.read().data()[0], tag as u8);
        reopened.unpin_page(id, false);
    }
}
