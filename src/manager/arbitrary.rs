//! Path-keyed file ID manager

use crate::{
    config::FileIdConfig,
    database::{entities::path_record, Database, SchemaVariant},
    error::Result,
    manager::FileIdManager,
    paths,
};
use async_trait::async_trait;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait,
    EntityTrait, QueryFilter, TransactionTrait,
};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

// Descendants are delimited with forward slashes regardless of OS: these
// paths are logical, host-supplied API paths, not filesystem paths.
const SEP: char = '/';

/// File ID manager that works over an arbitrary contents backend.
///
/// Each path is assigned a unique ID. The mapping changes only upon
/// explicit `rename`, `copy` and `delete` calls, e.g. upon receipt of
/// contents events from the host; the filesystem is never consulted.
pub struct ArbitraryFileIdManager {
    config: FileIdConfig,
    db: Database,
}

impl ArbitraryFileIdManager {
    /// Open the backing store and create its schema if needed.
    pub async fn new(config: FileIdConfig) -> Result<Self> {
        info!("Configured root dir: {}", config.root_dir.display());
        info!("Configured database path: {}", config.db_path.display());
        let db = Database::open(&config.db_path, SchemaVariant::Arbitrary).await?;
        Ok(Self { config, db })
    }

    /// Flush outstanding work and release the store handle.
    pub async fn close(self) -> Result<()> {
        self.db.close().await?;
        Ok(())
    }

    fn normalize(&self, path: &str) -> String {
        paths::path_str(&paths::normalize_path(&self.config.root_dir, path))
    }

    async fn create<C: ConnectionTrait>(&self, conn: &C, path: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        path_record::ActiveModel {
            id: Set(id.clone()),
            path: Set(path.to_string()),
        }
        .insert(conn)
        .await?;
        Ok(id)
    }

    async fn find_by_path<C: ConnectionTrait>(
        &self,
        conn: &C,
        path: &str,
    ) -> Result<Option<path_record::Model>> {
        Ok(path_record::Entity::find()
            .filter(path_record::Column::Path.eq(path))
            .one(conn)
            .await?)
    }

    async fn move_descendants<C: ConnectionTrait>(
        &self,
        conn: &C,
        old_path: &str,
        new_path: &str,
    ) -> Result<()> {
        let glob = paths::descendants_glob(old_path, SEP);
        let records = path_record::Entity::find()
            .filter(Expr::cust_with_values("path GLOB ?", [glob]))
            .all(conn)
            .await?;
        for record in records {
            let rebased = paths::rebase_path(&record.path, old_path, new_path);
            let mut active: path_record::ActiveModel = record.into();
            active.path = Set(rebased);
            active.update(conn).await?;
        }
        Ok(())
    }

    async fn copy_descendants<C: ConnectionTrait>(
        &self,
        conn: &C,
        from_path: &str,
        to_path: &str,
    ) -> Result<()> {
        let glob = paths::descendants_glob(from_path, SEP);
        let records = path_record::Entity::find()
            .filter(Expr::cust_with_values("path GLOB ?", [glob]))
            .all(conn)
            .await?;
        for record in records {
            let rebased = paths::rebase_path(&record.path, from_path, to_path);
            self.create(conn, &rebased).await?;
        }
        Ok(())
    }

    async fn delete_descendants<C: ConnectionTrait>(&self, conn: &C, path: &str) -> Result<()> {
        let glob = paths::descendants_glob(path, SEP);
        path_record::Entity::delete_many()
            .filter(Expr::cust_with_values("path GLOB ?", [glob]))
            .exec(conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FileIdManager for ArbitraryFileIdManager {
    async fn index(&self, path: &str) -> Result<Option<String>> {
        let path = self.normalize(path);

        let txn = self.db.conn().begin().await?;
        let id = match self.find_by_path(&txn, &path).await? {
            Some(record) => record.id,
            None => self.create(&txn, &path).await?,
        };
        txn.commit().await?;

        Ok(Some(id))
    }

    async fn get_id(&self, path: &str) -> Result<Option<String>> {
        let path = self.normalize(path);
        Ok(self
            .find_by_path(self.db.conn(), &path)
            .await?
            .map(|record| record.id))
    }

    async fn get_path(&self, id: &str) -> Result<Option<String>> {
        let record = path_record::Entity::find_by_id(id)
            .one(self.db.conn())
            .await?;
        Ok(record
            .and_then(|r| paths::to_api_path(&self.config.root_dir, Path::new(&r.path))))
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> Result<Option<String>> {
        let old_path = self.normalize(old_path);
        let new_path = self.normalize(new_path);

        let txn = self.db.conn().begin().await?;
        let id = match self.find_by_path(&txn, &old_path).await? {
            Some(record) => {
                let id = record.id.clone();
                let mut active: path_record::ActiveModel = record.into();
                active.path = Set(new_path.clone());
                active.update(&txn).await?;
                self.move_descendants(&txn, &old_path, &new_path).await?;
                id
            }
            None => self.create(&txn, &new_path).await?,
        };
        txn.commit().await?;

        Ok(Some(id))
    }

    async fn copy(&self, from_path: &str, to_path: &str) -> Result<Option<String>> {
        let from_path = self.normalize(from_path);
        let to_path = self.normalize(to_path);

        let txn = self.db.conn().begin().await?;
        let id = self.create(&txn, &to_path).await?;
        self.copy_descendants(&txn, &from_path, &to_path).await?;
        txn.commit().await?;

        Ok(Some(id))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let path = self.normalize(path);

        let txn = self.db.conn().begin().await?;
        path_record::Entity::delete_many()
            .filter(path_record::Column::Path.eq(&*path))
            .exec(&txn)
            .await?;
        self.delete_descendants(&txn, &path).await?;
        txn.commit().await?;

        Ok(())
    }

    // content is not tracked here; there is nothing to record
    async fn save(&self, _path: &str) -> Result<Option<String>> {
        Ok(None)
    }
}
