//! File record entity for the reconciling store

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String, // canonical UUID string
    pub path: String, // absolute normalized store path; not unique, reaped records may linger at a reused path
    #[sea_orm(unique)]
    pub ino: i64, // an inode identifies at most one live file
    pub crtime: Option<i64>, // creation time in nanoseconds; not every platform records one
    pub mtime: i64, // modification time in nanoseconds
    pub is_dir: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
