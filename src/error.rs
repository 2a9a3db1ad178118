//! Error types for the file identity store

use thiserror::Error;

/// File identity manager errors
#[derive(Debug, Error)]
pub enum FileIdError {
    /// Invalid configuration, raised at construction
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operand missing from the index where its presence is required
    #[error("No record found for {0}")]
    NotFound(String),

    /// Two live records would share an inode
    #[error("Inode uniqueness violated: {0}")]
    Integrity(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for file identity operations
pub type Result<T> = std::result::Result<T, FileIdError>;
