use std::collections::HashMap;
use std::sync::Mutex;

use crate::common::FrameId;

/// Tracks which frames are evictable and picks a victim in
/// least-recently-used order (§4.1). A frame only appears here while it
/// is unpinned; `BufferPoolManager` removes it the moment it pins a frame
/// and reinserts it once the pin count drops back to zero.
pub struct LruReplacer {
    inner: Mutex<Inner>,
}

struct Inner {
    /// MRU-unpinned at the front, LRU at the back.
    order: Vec<FrameId>,
    /// frame_id -> index into `order`, for O(1) removal.
    positions: HashMap<FrameId, usize>,
    capacity: usize,
}

impl LruReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                order: Vec::new(),
                positions: HashMap::new(),
                capacity,
            }),
        }
    }

    /// Removes and returns the least-recently-unpinned frame.
    pub fn victim(&self) -> Option<FrameId> {
        let mut inner = self.inner.lock().unwrap();
        let frame_id = inner.order.pop()?;
        inner.positions.remove(&frame_id);
        Some(frame_id)
    }

    /// Removes `frame_id` from the replacer, if present. Called when the
    /// buffer pool pins a frame: a pinned frame is never a victim
    /// candidate.
    pub fn pin(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(pos) = inner.positions.remove(&frame_id) {
            inner.order.remove(pos);
            Inner::reindex_from(&mut inner.order, &mut inner.positions, pos);
        }
    }

    /// Inserts `frame_id` at the MRU end. No-op if already present.
    pub fn unpin(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock().unwrap();
        if inner.positions.contains_key(&frame_id) {
            return;
        }
        if inner.order.len() >= inner.capacity && inner.capacity > 0 {
            if let Some(oldest) = inner.order.pop() {
                inner.positions.remove(&oldest);
            }
        }
        inner.order.insert(0, frame_id);
        Inner::reindex_from(&mut inner.order, &mut inner.positions, 0);
    }

    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().order.len()
    }
}

impl Inner {
    fn reindex_from(order: &mut [FrameId], positions: &mut HashMap<FrameId, usize>, from: usize) {
        for (i, frame_id) in order.iter().enumerate().skip(from) {
            positions.insert(*frame_id, i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn victim_returns_least_recently_unpinned() {
        let replacer = LruReplacer::new(10);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(3);
        assert_eq!(replacer.size(), 3);
        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), Some(3));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn pin_removes_candidate() {
        let replacer = LruReplacer::new(10);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.pin(1);
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.victim(), Some(2));
    }

    #[test]
    fn unpin_is_idempotent() {
        let replacer = LruReplacer::new(10);
        replacer.unpin(1);
        replacer.unpin(1);
        assert_eq!(replacer.size(), 1);
    }

    #[test]
    fn capacity_bound_evicts_lru_on_overflow() {
        let replacer = LruReplacer::new(2);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(3);
        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), Some(3));
    }
}
