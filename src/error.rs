//! Error taxonomy for the storage core.
//!
//! Every leaf operation in the media backend, address map, status table,
//! flight-plan engine and payload store returns `Result<T, StorageError>`.
//! Errors never carry enough context to be recovered from automatically;
//! they are propagated unchanged up to the repository façade, which may OR
//! several sub-operations' outcomes together for compatibility with the
//! legacy `ST_OK`/`ST_ERROR` status codes (see [`crate::repository::status_codes`]).

use core::fmt;

/// Error reported by a [`crate::media::FlashMedia`] or [`crate::media::FramMedia`]
/// implementation. The engine does not interpret the inner code; it only
/// distinguishes which address space the failing operation targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaError {
    /// A flash read/write/erase failed. The optional code is backend-defined.
    Flash(Option<i32>),
    /// A FRAM read/write failed. The optional code is backend-defined.
    Fram(Option<i32>),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::Flash(Some(code)) => write!(f, "flash operation failed (code {})", code),
            MediaError::Flash(None) => write!(f, "flash operation failed"),
            MediaError::Fram(Some(code)) => write!(f, "fram operation failed (code {})", code),
            MediaError::Fram(None) => write!(f, "fram operation failed"),
        }
    }
}

/// Errors produced by the persistent storage core.
///
/// Mirrors the taxonomy in the design: not-open, bounds, alignment, full,
/// media, voting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The operation was issued before `storage_init` or after `storage_close`.
    NotOpen,
    /// An index, payload id or slot number was out of the configured range.
    Bounds {
        /// What kind of bound was violated, for diagnostics.
        what: &'static str,
    },
    /// A payload record write/read would straddle a 512-byte page boundary.
    Alignment {
        /// Byte offset of the record start within its section.
        offset: u32,
        /// Record size in bytes.
        size: u16,
    },
    /// No free TLB slot was available and compaction could not reclaim one.
    Full,
    /// The underlying flash or FRAM backend reported an error.
    Media(MediaError),
    /// The three copies of a triple-redundant status variable disagreed on
    /// all three values (no majority).
    Voting,
}

impl From<MediaError> for StorageError {
    fn from(e: MediaError) -> Self {
        StorageError::Media(e)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotOpen => write!(f, "storage not open"),
            StorageError::Bounds { what } => write!(f, "out of bounds: {}", what),
            StorageError::Alignment { offset, size } => write!(
                f,
                "record of size {} at offset {} would straddle a page boundary",
                size, offset
            ),
            StorageError::Full => write!(f, "no free slot and compaction could not reclaim one"),
            StorageError::Media(e) => write!(f, "media error: {}", e),
            StorageError::Voting => write!(f, "status table copies disagree, no majority"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for StorageError {}

/// Result alias used throughout the crate.
pub type StorageResult<T> = Result<T, StorageError>;
