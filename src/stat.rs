//! Filesystem stat probe
//!
//! Produces the compact stat record the reconciliation engine compares
//! against stored records. The probe never dereferences symlinks; callers
//! decide whether to follow.

use std::fs::{self, Metadata};
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Compact stat record for one filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Platform file identifier; unique among live files
    pub ino: i64,
    /// Creation (birth) time in nanoseconds, where the platform records one
    pub crtime: Option<i64>,
    /// Modification time in nanoseconds
    pub mtime: i64,
    pub is_dir: bool,
    pub is_symlink: bool,
}

impl FileStat {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            ino: inode_of(metadata) as i64,
            // `created()` reports the birth time where one exists; on
            // Windows the creation time is exactly what it returns
            crtime: metadata.created().ok().and_then(nanos_since_epoch),
            mtime: metadata
                .modified()
                .ok()
                .and_then(nanos_since_epoch)
                .unwrap_or(0),
            is_dir: metadata.is_dir(),
            is_symlink: metadata.file_type().is_symlink(),
        }
    }
}

/// Stat a path without following symlinks. A missing path is `Ok(None)`;
/// every other failure propagates.
pub fn stat(path: &Path) -> io::Result<Option<FileStat>> {
    match fs::symlink_metadata(path) {
        Ok(metadata) => Ok(Some(FileStat::from_metadata(&metadata))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn nanos_since_epoch(time: SystemTime) -> Option<i64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_nanos() as i64)
}

#[cfg(unix)]
fn inode_of(metadata: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn inode_of(_metadata: &Metadata) -> u64 {
    0
}
