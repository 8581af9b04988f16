//! Durable cache for sync results.
//!
//! Holds the last-known-good [`CacheSnapshot`] and one extracted-text
//! entry per archived page.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml           # Configuration
//! ├── snapshot.json         # Last successful sync (replaced atomically)
//! ├── archives/             # Write-once archive text, one file per id
//! │   ├── 3f9a1c.txt
//! │   └── 8bd04e.txt
//! └── index/                # LocalIndex persistence
//!     └── bookmarks.json
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ArchiveEntry, CacheSnapshot};

// Re-export for convenience
pub use local::LocalStorage;

/// Trait for sync cache backends.
///
/// Writes are whole-value replacements so readers never observe a torn
/// snapshot or archive entry.
#[async_trait]
pub trait SyncCache: Send + Sync {
    /// Load the last persisted snapshot, if any.
    async fn load_snapshot(&self) -> Result<Option<CacheSnapshot>>;

    /// Replace the persisted snapshot.
    async fn save_snapshot(&self, snapshot: &CacheSnapshot) -> Result<()>;

    /// Whether an archive entry exists for a normalized id.
    async fn has_archive(&self, archive_id: &str) -> Result<bool>;

    /// Read the extracted text for a normalized id.
    async fn read_archive(&self, archive_id: &str) -> Result<Option<String>>;

    /// Store an archive entry unless one already exists.
    ///
    /// Returns `false` when an entry was already present and left untouched.
    async fn write_archive(&self, entry: &ArchiveEntry) -> Result<bool>;
}
