//! AMQP 0-9-1 transport (RabbitMQ) on top of lapin

use crate::{
    actions::QueueDeclaration,
    broker::{Broker, BrokerChannel, BrokerConnection},
    config::ConnectionSettings,
    credentials::Credentials,
    Error, Result,
};
use async_trait::async_trait;
use lapin::{
    options::{
        BasicAckOptions, BasicGetOptions, BasicPublishOptions, QueueDeclareOptions,
        QueueDeleteOptions,
    },
    types::FieldTable,
    uri::{AMQPAuthority, AMQPUri, AMQPUserInfo},
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const REPLY_SUCCESS: u16 = 200;

/// Connects to an AMQP broker
#[derive(Debug, Default, Clone, Copy)]
pub struct AmqpBroker;

impl AmqpBroker {
    /// Create new AMQP broker
    pub fn new() -> Self {
        Self
    }

    fn uri(settings: &ConnectionSettings, credentials: Option<&Credentials>) -> AMQPUri {
        let userinfo = match credentials {
            Some(c) => AMQPUserInfo {
                username: c.user.clone(),
                password: c.password.clone(),
            },
            None => AMQPUserInfo::default(),
        };

        AMQPUri {
            authority: AMQPAuthority {
                userinfo,
                host: settings.host.clone(),
                port: settings.port,
            },
            vhost: settings.vhost.clone(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    fn name(&self) -> &str {
        "amqp"
    }

    async fn connect(
        &self,
        settings: &ConnectionSettings,
        credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn BrokerConnection>> {
        let uri = Self::uri(settings, credentials);
        let connection = Connection::connect_uri(uri, ConnectionProperties::default())
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        Ok(Arc::new(AmqpConnection { inner: connection }))
    }
}

struct AmqpConnection {
    inner: Connection,
}

impl fmt::Debug for AmqpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmqpConnection")
            .field("connected", &self.inner.status().connected())
            .finish()
    }
}

#[async_trait]
impl BrokerConnection for AmqpConnection {
    async fn create_channel(&self) -> Result<Box<dyn BrokerChannel>> {
        let channel = self
            .inner
            .create_channel()
            .await
            .map_err(|e| Error::Channel(e.to_string()))?;

        debug!("Opened channel {}", channel.id());
        Ok(Box::new(AmqpChannel { inner: channel }))
    }

    fn is_open(&self) -> bool {
        self.inner.status().connected()
    }

    async fn close(&self) -> Result<()> {
        if self.is_open() {
            self.inner.close(REPLY_SUCCESS, "Bye").await?;
        }
        Ok(())
    }
}

struct AmqpChannel {
    inner: Channel,
}

impl fmt::Debug for AmqpChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmqpChannel")
            .field("id", &self.inner.id())
            .finish()
    }
}

#[async_trait]
impl BrokerChannel for AmqpChannel {
    async fn declare_queue(&self, queue: &QueueDeclaration) -> Result<String> {
        let options = QueueDeclareOptions {
            durable: queue.durable,
            exclusive: queue.exclusive,
            auto_delete: queue.auto_delete,
            ..Default::default()
        };

        let declared = self
            .inner
            .queue_declare(&queue.name, options, FieldTable::default())
            .await
            .map_err(|e| Error::Queue(format!("declare {}: {}", queue.name, e)))?;

        Ok(declared.name().as_str().to_string())
    }

    async fn delete_queue(&self, name: &str) -> Result<()> {
        self.inner
            .queue_delete(name, QueueDeleteOptions::default())
            .await
            .map_err(|e| Error::Queue(format!("delete {}: {}", name, e)))?;
        Ok(())
    }

    async fn publish(&self, exchange: &str, routing_key: &str, payload: &[u8]) -> Result<()> {
        self.inner
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default(),
            )
            .await
            .map_err(|e| Error::Publish(e.to_string()))?
            .await
            .map_err(|e| Error::Publish(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, queue: &str) -> Result<Option<Vec<u8>>> {
        let message = self
            .inner
            .basic_get(queue, BasicGetOptions { no_ack: false })
            .await
            .map_err(|e| Error::Receive(e.to_string()))?;

        match message {
            Some(message) => {
                let delivery = message.delivery;
                delivery.acker.ack(BasicAckOptions::default()).await?;
                Ok(Some(delivery.data))
            }
            None => Ok(None),
        }
    }

    fn is_open(&self) -> bool {
        self.inner.status().connected()
    }

    async fn close(&self) -> Result<()> {
        if self.is_open() {
            self.inner.close(REPLY_SUCCESS, "Bye").await?;
        }
        Ok(())
    }
}
