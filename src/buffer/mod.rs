mod buffer_pool_manager;
mod replacer;

pub use buffer_pool_manager::{BufferPoolManager, FramePtr};
pub use replacer::LruReplacer;
