//! Database infrastructure using SeaORM

use sea_orm::{
	ConnectOptions, ConnectionTrait, Database as SeaDatabase, DatabaseBackend,
	DatabaseConnection, DbErr, Statement,
};
use sea_orm_migration::MigratorTrait;
use std::path::Path;
use tracing::info;

pub mod entities;
pub mod migration;

/// Which table layout a store file carries. The reconciling manager needs
/// inode and timestamp columns; the path-keyed manager does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVariant {
	Local,
	Arbitrary,
}

/// Wrapper owning the store connection for the life of a manager.
pub struct Database {
	conn: DatabaseConnection,
}

impl Database {
	/// Open the store at `path`, creating it and its schema if absent.
	pub async fn open(path: &Path, variant: SchemaVariant) -> Result<Self, DbErr> {
		// Ensure parent directory exists
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)
				.map_err(|e| DbErr::Custom(format!("Failed to create directory: {}", e)))?;
		}

		let db_url = format!("sqlite://{}?mode=rwc", path.display());

		let mut opt = ConnectOptions::new(db_url);
		// a single connection, held for the lifetime of the manager
		opt.max_connections(1).sqlx_logging(false);

		let conn = SeaDatabase::connect(opt).await?;

		// do not allow reads to block writes; required when multiple
		// processes share the store file
		conn.execute(Statement::from_string(
			DatabaseBackend::Sqlite,
			"PRAGMA journal_mode=WAL",
		))
		.await?;
		conn.execute(Statement::from_string(
			DatabaseBackend::Sqlite,
			"PRAGMA synchronous=NORMAL",
		))
		.await?;

		match variant {
			SchemaVariant::Local => migration::local::Migrator::up(&conn, None).await?,
			SchemaVariant::Arbitrary => migration::arbitrary::Migrator::up(&conn, None).await?,
		}

		info!("Opened file ID store at {:?}", path);

		Ok(Self { conn })
	}

	/// Get the store connection
	pub fn conn(&self) -> &DatabaseConnection {
		&self.conn
	}

	/// Flush outstanding work and release the connection.
	pub async fn close(self) -> Result<(), DbErr> {
		self.conn.close().await
	}
}

/// Drop the `files` table in the store at `path`. The store must already
/// exist; a missing file or table propagates as an error.
pub async fn drop_files_table(path: &Path) -> Result<(), DbErr> {
	let conn = SeaDatabase::connect(format!("sqlite://{}", path.display())).await?;
	conn.execute(Statement::from_string(
		DatabaseBackend::Sqlite,
		"DROP TABLE files",
	))
	.await?;
	conn.close().await
}
