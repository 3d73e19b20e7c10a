//! Error types for message bus

use thiserror::Error;

/// Message bus error
#[derive(Debug, Error)]
pub enum Error {
    /// Connection could not be opened or is gone
    #[error("Connection error: {0}")]
    Connection(String),

    /// Channel could not be opened or is gone
    #[error("Channel error: {0}")]
    Channel(String),

    /// Queue declaration/deletion failed
    #[error("Queue error: {0}")]
    Queue(String),

    /// Publish error
    #[error("Publish error: {0}")]
    Publish(String),

    /// Receive error
    #[error("Receive error: {0}")]
    Receive(String),

    /// Component was stopped
    #[error("Execution stopped")]
    Stopped,

    /// AMQP error
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
