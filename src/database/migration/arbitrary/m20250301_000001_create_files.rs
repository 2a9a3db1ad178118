//! Create the files table for the path-keyed store

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.create_table(
				Table::create()
					.table(Files::Table)
					.if_not_exists()
					.col(ColumnDef::new(Files::Id).text().not_null().primary_key())
					.col(ColumnDef::new(Files::Path).text().not_null().unique_key())
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.if_not_exists()
					.name("ix_files_path")
					.table(Files::Table)
					.col(Files::Path)
					.to_owned(),
			)
			.await?;

		Ok(())
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(Files::Table).to_owned())
			.await
	}
}

#[derive(DeriveIden)]
enum Files {
	Table,
	Id,
	Path,
}
