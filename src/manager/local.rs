//! Reconciling file ID manager for local filesystems
//!
//! Tracks files by inode and creation/modification timestamps, so that
//! moves performed out-of-band (a shell `mv`, a drag in another program)
//! are detected after the fact and the moved files keep their IDs.
//!
//! Every public operation wraps its statements in exactly one transaction;
//! the private helpers take the open transaction and never commit.
//! Committing one transaction per operation instead of one per statement
//! is what keeps full-tree syncs affordable.

use crate::{
    config::FileIdConfig,
    database::{entities::file_record, Database, SchemaVariant},
    error::{FileIdError, Result},
    manager::FileIdManager,
    paths,
    stat::{stat, FileStat},
};
use async_trait::async_trait;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait,
    DatabaseTransaction, EntityTrait, QueryFilter, SqlErr, TransactionTrait,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use tracing::info;
use uuid::Uuid;

/// Outcome of syncing one path against the store.
#[derive(Debug, Default)]
struct SyncOutcome {
    /// ID of the record now associated with the path, if it was indexed
    id: Option<String>,
    /// Set when a directory re-parent occurred: any open scan over
    /// directory records holds stale paths and must re-read them
    cursor_invalidated: bool,
}

/// File ID manager for a served local directory tree.
///
/// On construction the directory tree under the root is indexed; regular
/// files are discovered lazily as they are asked about. Queries reconcile
/// the index with the filesystem before answering, using the inode as the
/// cross-check for identity and timestamps as the cross-check for "is this
/// still the same file".
pub struct LocalFileIdManager {
    config: FileIdConfig,
    db: Database,
}

impl LocalFileIdManager {
    /// Open the backing store and index the directory tree under the root.
    pub async fn new(config: FileIdConfig) -> Result<Self> {
        config.validate_root_dir()?;
        info!("Configured root dir: {}", config.root_dir.display());
        info!("Configured database path: {}", config.db_path.display());
        let db = Database::open(&config.db_path, SchemaVariant::Local).await?;

        let manager = Self { config, db };
        manager.index_all().await?;
        Ok(manager)
    }

    /// Flush outstanding work and release the store handle.
    pub async fn close(self) -> Result<()> {
        self.db.close().await?;
        Ok(())
    }

    fn normalize(&self, path: &str) -> PathBuf {
        paths::normalize_path_strict(&self.config.root_dir, path)
    }

    fn to_api(&self, path: &Path) -> Option<String> {
        paths::to_api_path(&self.config.root_dir, path)
    }

    /// Index every directory under the root, the root included. Files are
    /// not indexed eagerly; they are picked up when first asked about.
    async fn index_all(&self) -> Result<()> {
        let txn = self.db.conn().begin().await?;

        let mut pending = vec![self.config.root_dir.clone()];
        while let Some(dir) = pending.pop() {
            let Some(dir_stat) = stat(&dir)? else {
                continue;
            };
            self.index_path(&txn, &dir, Some(dir_stat)).await?;

            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            for entry in entries {
                let entry = entry?;
                // no following here: symlinked directories are left to
                // resolve through index() so link cycles cannot trap the walk
                if entry.file_type()?.is_dir() {
                    pending.push(entry.path());
                }
            }
        }

        txn.commit().await?;
        Ok(())
    }

    /// Create a record for `path` with the given stat info.
    ///
    /// The uniqueness constraint on `ino` makes this reject the insert if a
    /// live record already carries the inode; that is surfaced as an
    /// integrity error rather than recovered from.
    async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        path: &Path,
        file_stat: FileStat,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        file_record::ActiveModel {
            id: Set(id.clone()),
            path: Set(paths::path_str(path)),
            ino: Set(file_stat.ino),
            crtime: Set(file_stat.crtime),
            mtime: Set(file_stat.mtime),
            is_dir: Set(file_stat.is_dir),
        }
        .insert(conn)
        .await
        .map_err(integrity_error)?;
        Ok(id)
    }

    /// Refresh a record's stat columns, e.g. after a save.
    async fn refresh_stat<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
        file_stat: FileStat,
    ) -> Result<()> {
        let active = file_record::ActiveModel {
            id: Set(id.to_string()),
            ino: Set(file_stat.ino),
            crtime: Set(file_stat.crtime),
            mtime: Set(file_stat.mtime),
            ..Default::default()
        };
        active.update(conn).await.map_err(integrity_error)?;
        Ok(())
    }

    /// Reconcile the file at `path` with the store.
    ///
    /// If the inode is known, the matching record is re-pathed to `path`
    /// (re-parenting descendants when the record is a directory that
    /// moved). If the inode is known but the timestamps no longer agree,
    /// a different file now occupies the inode: the record is reaped.
    async fn sync_file<C: ConnectionTrait>(
        &self,
        conn: &C,
        path: &Path,
        file_stat: FileStat,
    ) -> Result<SyncOutcome> {
        // symlinks are never tracked directly
        if file_stat.is_symlink {
            return Ok(SyncOutcome::default());
        }

        let Some(record) = file_record::Entity::find()
            .filter(file_record::Column::Ino.eq(file_stat.ino))
            .one(conn)
            .await?
        else {
            return Ok(SyncOutcome::default());
        };

        if !timestamps_match(&record, &file_stat) {
            file_record::Entity::delete_by_id(record.id).exec(conn).await?;
            return Ok(SyncOutcome::default());
        }

        let id = record.id.clone();
        let old_path = record.path.clone();
        let new_path = paths::path_str(path);
        let is_dir = record.is_dir;

        let mut active: file_record::ActiveModel = record.into();
        active.path = Set(new_path.clone());
        active.update(conn).await?;

        let mut cursor_invalidated = false;
        if is_dir && old_path != new_path {
            self.move_descendants(conn, &old_path, &new_path).await?;
            cursor_invalidated = true;
        }

        Ok(SyncOutcome {
            id: Some(id),
            cursor_invalidated,
        })
    }

    /// Reconcile the immediate contents of a directory, descending into
    /// any unindexed child directory found along the way.
    async fn sync_dir(&self, txn: &DatabaseTransaction, dir_path: &Path) -> Result<bool> {
        let mut cursor_invalidated = false;
        let mut pending = vec![dir_path.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                // raced with a concurrent removal; its record is reaped
                // when something next asks about it
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            for entry in entries {
                let entry = entry?;
                let path = entry.path();
                let Some(entry_stat) = stat(&path)? else {
                    continue;
                };

                let outcome = self.sync_file(txn, &path, entry_stat).await?;
                cursor_invalidated |= outcome.cursor_invalidated;

                if entry_stat.is_dir && outcome.id.is_none() {
                    self.create(txn, &path, entry_stat).await?;
                    pending.push(path);
                }
            }
        }

        Ok(cursor_invalidated)
    }

    /// Full reconciliation pass: visit every indexed directory and sync the
    /// contents of the dirty ones.
    ///
    /// A directory is dirty when its current mtime differs from the stored
    /// one, leaning on the filesystem convention that a directory's mtime
    /// changes when its direct contents change. When a sync step re-parents
    /// descendant records, the directory listing being walked holds stale
    /// paths; the scan restarts from a fresh read.
    async fn sync_all(&self, txn: &DatabaseTransaction) -> Result<()> {
        'scan: loop {
            let dirs = file_record::Entity::find()
                .filter(file_record::Column::IsDir.eq(true))
                .all(txn)
                .await?;

            for dir in dirs {
                let dir_path = PathBuf::from(&dir.path);
                // a missing directory may simply have moved; its records
                // are found through whichever directory it now lives under
                let Some(dir_stat) = stat(&dir_path)? else {
                    continue;
                };

                if dir_stat.mtime != dir.mtime {
                    let mut cursor_invalidated = self.sync_dir(txn, &dir_path).await?;

                    // restore the directory itself: sync keeps its record
                    // current, and a timestamp divergence replaces it
                    let outcome = self.index_path(txn, &dir_path, Some(dir_stat)).await?;
                    cursor_invalidated |= outcome.cursor_invalidated;
                    if let Some(id) = &outcome.id {
                        self.refresh_stat(txn, id, dir_stat).await?;
                    }

                    if cursor_invalidated {
                        continue 'scan;
                    }
                }
            }

            break;
        }

        Ok(())
    }

    /// Sync-then-create step shared by `index` and the sync pass: returns
    /// the existing record for the object at `path` if the filesystem still
    /// vouches for it, creating a fresh record otherwise.
    async fn index_path(
        &self,
        txn: &DatabaseTransaction,
        path: &Path,
        file_stat: Option<FileStat>,
    ) -> Result<SyncOutcome> {
        let file_stat = match file_stat {
            Some(s) => Some(s),
            None => stat(path)?,
        };
        let Some(mut file_stat) = file_stat else {
            return Ok(SyncOutcome::default());
        };

        let mut path = path.to_path_buf();
        if file_stat.is_symlink {
            // index the link target instead; a broken link indexes nothing
            path = match fs::canonicalize(&path) {
                Ok(real) => real,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok(SyncOutcome::default())
                }
                Err(e) => return Err(e.into()),
            };
            let Some(target_stat) = stat(&path)? else {
                return Ok(SyncOutcome::default());
            };
            file_stat = target_stat;
        }

        let outcome = self.sync_file(txn, &path, file_stat).await?;
        if outcome.id.is_some() {
            return Ok(outcome);
        }

        let id = self.create(txn, &path, file_stat).await?;
        Ok(SyncOutcome {
            id: Some(id),
            cursor_invalidated: outcome.cursor_invalidated,
        })
    }

    async fn move_descendants<C: ConnectionTrait>(
        &self,
        conn: &C,
        old_path: &str,
        new_path: &str,
    ) -> Result<()> {
        let glob = paths::descendants_glob(old_path, MAIN_SEPARATOR);
        let records = file_record::Entity::find()
            .filter(Expr::cust_with_values("path GLOB ?", [glob]))
            .all(conn)
            .await?;
        for record in records {
            let rebased = paths::rebase_path(&record.path, old_path, new_path);
            let mut active: file_record::ActiveModel = record.into();
            active.path = Set(rebased);
            active.update(conn).await?;
        }
        Ok(())
    }

    /// Insert records for every indexed descendant of `from_path` whose
    /// counterpart under `to_path` exists on disk. Destinations missing
    /// from disk are skipped; a record is never made up without stat info.
    async fn copy_descendants<C: ConnectionTrait>(
        &self,
        conn: &C,
        from_path: &str,
        to_path: &str,
    ) -> Result<()> {
        let glob = paths::descendants_glob(from_path, MAIN_SEPARATOR);
        let records = file_record::Entity::find()
            .filter(Expr::cust_with_values("path GLOB ?", [glob]))
            .all(conn)
            .await?;
        for record in records {
            let rebased = paths::rebase_path(&record.path, from_path, to_path);
            let rebased_path = PathBuf::from(&rebased);
            let Some(dest_stat) = stat(&rebased_path)? else {
                continue;
            };
            self.create(conn, &rebased_path, dest_stat).await?;
        }
        Ok(())
    }

    async fn delete_descendants<C: ConnectionTrait>(&self, conn: &C, path: &str) -> Result<()> {
        let glob = paths::descendants_glob(path, MAIN_SEPARATOR);
        file_record::Entity::delete_many()
            .filter(Expr::cust_with_values("path GLOB ?", [glob]))
            .exec(conn)
            .await?;
        Ok(())
    }

    async fn find_by_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> Result<Option<file_record::Model>> {
        Ok(file_record::Entity::find_by_id(id).one(conn).await?)
    }
}

#[async_trait]
impl FileIdManager for LocalFileIdManager {
    async fn index(&self, path: &str) -> Result<Option<String>> {
        let path = self.normalize(path);

        let txn = self.db.conn().begin().await?;
        let outcome = self.index_path(&txn, &path, None).await?;
        txn.commit().await?;

        Ok(outcome.id)
    }

    async fn get_id(&self, path: &str) -> Result<Option<String>> {
        let path = self.normalize(path);
        let Some(file_stat) = stat(&path)? else {
            return Ok(None);
        };

        let txn = self.db.conn().begin().await?;
        let outcome = self.sync_file(&txn, &path, file_stat).await?;
        txn.commit().await?;

        Ok(outcome.id)
    }

    async fn get_path(&self, id: &str) -> Result<Option<String>> {
        // optimistic: the stored path usually still holds the same file
        let Some(record) = self.find_by_id(self.db.conn(), id).await? else {
            return Ok(None);
        };
        let record_path = PathBuf::from(&record.path);
        if let Some(file_stat) = stat(&record_path)? {
            if file_stat.ino == record.ino && timestamps_match(&record, &file_stat) {
                return Ok(self.to_api(&record_path));
            }
        }

        // out of agreement; reconcile the whole index and look again
        let txn = self.db.conn().begin().await?;
        self.sync_all(&txn).await?;
        let record = self.find_by_id(&txn, id).await?;
        txn.commit().await?;

        // the sync may have reaped the record
        let Some(record) = record else {
            return Ok(None);
        };
        let record_path = PathBuf::from(&record.path);
        let Some(file_stat) = stat(&record_path)? else {
            return Ok(None);
        };
        if file_stat.ino != record.ino || !timestamps_match(&record, &file_stat) {
            return Ok(None);
        }

        Ok(self.to_api(&record_path))
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> Result<Option<String>> {
        info!(
            "Updating index following move from {} to {}.",
            old_path, new_path
        );
        let old = self.normalize(old_path);
        let new = self.normalize(new_path);

        // the move already happened; the new path is the one that must exist
        let Some(file_stat) = stat(&new)? else {
            return Ok(None);
        };

        let old_s = paths::path_str(&old);
        let new_s = paths::path_str(&new);

        let txn = self.db.conn().begin().await?;
        if file_stat.is_dir {
            self.move_descendants(&txn, &old_s, &new_s).await?;
        }

        // look up by the old path directly: the file no longer lives there,
        // so an inode-checked query would come back empty
        let record = file_record::Entity::find()
            .filter(file_record::Column::Path.eq(&*old_s))
            .one(&txn)
            .await?;

        let id = match record {
            Some(record) => {
                let id = record.id.clone();
                // ino and crtime travel with a rename(2)-style move, but
                // the host may as well have implemented the move as
                // delete-and-create; take whatever now sits at the new path
                let mut active: file_record::ActiveModel = record.into();
                active.path = Set(new_s.clone());
                active.ino = Set(file_stat.ino);
                active.crtime = Set(file_stat.crtime);
                active.mtime = Set(file_stat.mtime);
                active.update(&txn).await.map_err(integrity_error)?;
                id
            }
            None => self.create(&txn, &new, file_stat).await?,
        };
        txn.commit().await?;

        info!(
            "Successfully updated index following move from {} to {}.",
            old_path, new_path
        );
        Ok(Some(id))
    }

    async fn copy(&self, from_path: &str, to_path: &str) -> Result<Option<String>> {
        info!("Indexing {} following copy from {}.", to_path, from_path);
        let from = self.normalize(from_path);
        let to = self.normalize(to_path);

        let txn = self.db.conn().begin().await?;
        if fs::metadata(&to).map(|m| m.is_dir()).unwrap_or(false) {
            self.copy_descendants(&txn, &paths::path_str(&from), &paths::path_str(&to))
                .await?;
        }

        // make sure the source is indexed too, so both sides answer queries
        self.index_path(&txn, &from, None).await?;
        let outcome = self.index_path(&txn, &to, None).await?;
        txn.commit().await?;

        info!(
            "Successfully indexed {} following copy from {}.",
            to_path, from_path
        );
        Ok(outcome.id)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        info!("Deleting index at {}.", path);
        let store_path = self.normalize(path);
        let path_s = paths::path_str(&store_path);

        let txn = self.db.conn().begin().await?;
        if fs::metadata(&store_path).map(|m| m.is_dir()).unwrap_or(false) {
            self.delete_descendants(&txn, &path_s).await?;
        }
        file_record::Entity::delete_many()
            .filter(file_record::Column::Path.eq(&*path_s))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        info!("Successfully deleted index at {}.", path);
        Ok(())
    }

    async fn save(&self, path: &str) -> Result<Option<String>> {
        let store_path = self.normalize(path);
        // the save is assumed to land on a file that was present before;
        // nothing on disk means nothing to record
        let Some(file_stat) = stat(&store_path)? else {
            return Ok(None);
        };
        let path_s = paths::path_str(&store_path);

        let txn = self.db.conn().begin().await?;
        let record = file_record::Entity::find()
            .filter(file_record::Column::Ino.eq(file_stat.ino))
            .filter(file_record::Column::Path.eq(&*path_s))
            .one(&txn)
            .await?;
        let Some(record) = record else {
            return Ok(None);
        };

        let id = record.id.clone();
        self.refresh_stat(&txn, &id, file_stat).await?;
        txn.commit().await?;

        Ok(Some(id))
    }
}

/// Whether the stored and probed timestamps agree. The creation time is
/// authoritative when both sides carry one; otherwise the comparison falls
/// back to the modification time.
fn timestamps_match(record: &file_record::Model, file_stat: &FileStat) -> bool {
    match (record.crtime, file_stat.crtime) {
        (Some(stored), Some(current)) => stored == current,
        _ => record.mtime == file_stat.mtime,
    }
}

fn integrity_error(err: sea_orm::DbErr) -> FileIdError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) => FileIdError::Integrity(message),
        _ => FileIdError::Database(err),
    }
}
