use std::{error::Error as StdError, fmt};

/// The failure kinds a storage-core operation can surface (§7).
///
/// The core never catches these; it returns them to the caller (the
/// executor, in the full system) which decides whether to abort the
/// enclosing transaction.
#[derive(Debug)]
pub enum StorageError {
    /// No free or evictable frame was available to satisfy a fetch/new page
    /// request.
    OutOfMemory,

    /// A lookup found nothing. Most lookups return `Option`/`bool` directly
    /// instead of this variant; it is used where a fallible API needs to
    /// distinguish "not found" from other failures.
    NotFound(String),

    /// Lock ordering forced the requester to abort (wound-wait, 2PL
    /// violation, or a second upgrade on the same queue).
    Conflict(String),

    /// A structural invariant was violated: negative pin count, a
    /// page-table/frame mismatch, a duplicate key where uniqueness is
    /// assumed already checked, and the like. These are programming errors
    /// in the core, not expected runtime conditions.
    InvariantViolation(String),

    /// The disk manager failed to read or write a page.
    DiskError(std::io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::OutOfMemory => {
                write!(f, "buffer pool exhausted: no evictable frame")
            }
            StorageError::NotFound(msg) => write!(f, "not found: {}", msg),
            StorageError::Conflict(msg) => write!(f, "lock conflict: {}", msg),
            StorageError::InvariantViolation(msg) => {
                write!(f, "invariant violation: {}", msg)
            }
            StorageError::DiskError(e) => write!(f, "disk error: {}", e),
        }
    }
}

impl StdError for StorageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StorageError::DiskError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::DiskError(e)
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
