//! Common error types for spcode

use thiserror::Error;

/// Common result type for spcode bootstrap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading configuration or preparing the data folder
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data folder cannot be created or is not writable
    #[error("Data folder error: {0}")]
    DataFolder(String),
}
