//! File ID managers
//!
//! Two implementations of one contract: [`LocalFileIdManager`] reconciles
//! the index against a real filesystem using inode numbers and timestamps,
//! so files moved out-of-band keep their IDs; [`ArbitraryFileIdManager`] is
//! a pure path-keyed index that learns about operations only through
//! explicit calls from the host.

pub mod arbitrary;
pub mod local;
#[cfg(test)]
mod tests;

pub use arbitrary::ArbitraryFileIdManager;
pub use local::LocalFileIdManager;

use crate::error::Result;
use async_trait::async_trait;

/// The file identity capability: a stable, opaque ID per file or directory
/// under a root, surviving renames, moves and (where the backend can tell)
/// in-place edits.
///
/// All paths cross this boundary as API paths: forward-slash, relative to
/// the configured root. Absolute store paths never leave a manager.
#[async_trait]
pub trait FileIdManager: Send + Sync {
    /// Return the ID at `path`, indexing it first if it is unknown.
    /// `None` when `path` does not correspond to an object the backend
    /// accepts.
    async fn index(&self, path: &str) -> Result<Option<String>>;

    /// Return the ID at `path`, or `None` if it was never indexed.
    async fn get_id(&self, path: &str) -> Result<Option<String>>;

    /// Return the API path for `id`, or `None` if the ID is unknown or its
    /// object is gone.
    async fn get_path(&self, id: &str) -> Result<Option<String>>;

    /// Record a move from `old_path` to `new_path`, re-parenting indexed
    /// descendants. Returns the ID now associated with `new_path`.
    async fn rename(&self, old_path: &str, new_path: &str) -> Result<Option<String>>;

    /// Record a copy from `from_path` to `to_path`. The copy gets a fresh
    /// ID; `from_path` keeps its own.
    async fn copy(&self, from_path: &str, to_path: &str) -> Result<Option<String>>;

    /// Drop the record at `path` and all of its descendants.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Record an in-place save at `path`, preserving its ID.
    async fn save(&self, path: &str) -> Result<Option<String>>;
}
