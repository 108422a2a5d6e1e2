use std::fmt;

use super::PageId;

/// A stable address for a tuple: the page it lives on plus its slot number
/// within that page. Immutable for the life of the tuple; a delete
/// invalidates it rather than reassigning it to a new tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    page_id: PageId,
    slot_num: u32,
}

impl Rid {
    pub fn new(page_id: PageId, slot_num: u32) -> Self {
        Self { page_id, slot_num }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn slot_num(&self) -> u32 {
        self.slot_num
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_id, self.slot_num)
    }
}
