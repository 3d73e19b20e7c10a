//! Error types for payload conversion

use thiserror::Error;

/// Result type for conversion helpers
pub type Result<T> = std::result::Result<T, Error>;

/// Conversion errors
#[derive(Error, Debug)]
pub enum Error {
    /// bincode failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote exchange error
    #[error("Data exchange error: {0}")]
    Exchange(#[from] data_exchange::Error),

    /// Invalid converter/encoder configuration
    #[error("Configuration error: {0}")]
    Config(String),
}
