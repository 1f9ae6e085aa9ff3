//! Process-level error types for the relay binary.

use thiserror::Error;

/// Errors that stop the relay process.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Runtime or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}
