//! Transport seam between the actors and a concrete broker

use crate::{actions::QueueDeclaration, config::ConnectionSettings, credentials::Credentials, Result};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Opens native connections
#[async_trait]
pub trait Broker: Send + Sync + Debug {
    /// Transport name for logging
    fn name(&self) -> &str;

    /// Open a connection, authenticating with the credentials if given
    async fn connect(
        &self,
        settings: &ConnectionSettings,
        credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn BrokerConnection>>;
}

/// Native connection shared by every actor of a flow
#[async_trait]
pub trait BrokerConnection: Send + Sync + Debug {
    /// Open a channel on this connection
    async fn create_channel(&self) -> Result<Box<dyn BrokerChannel>>;

    /// Whether the connection is still usable
    fn is_open(&self) -> bool;

    /// Close the connection
    async fn close(&self) -> Result<()>;
}

/// Channel owned by exactly one actor
#[async_trait]
pub trait BrokerChannel: Send + Sync + Debug {
    /// Declare a queue, returning its name (server-generated if requested empty)
    async fn declare_queue(&self, queue: &QueueDeclaration) -> Result<String>;

    /// Delete a queue; deleting a missing queue is not an error
    async fn delete_queue(&self, name: &str) -> Result<()>;

    /// Publish a payload; an empty exchange routes directly to the queue
    /// named by the routing key
    async fn publish(&self, exchange: &str, routing_key: &str, payload: &[u8]) -> Result<()>;

    /// Fetch a single message from the queue, if one is waiting
    async fn get(&self, queue: &str) -> Result<Option<Vec<u8>>>;

    /// Whether the channel is still usable
    fn is_open(&self) -> bool;

    /// Close the channel
    async fn close(&self) -> Result<()>;
}
