//! Sink actor publishing encoded values

use crate::{
    broker::BrokerChannel,
    config::PublisherConfig,
    connection::ConnectionManager,
    metrics::{self, MESSAGE_PUBLISH_DURATION, MESSAGE_PUBLISH_TOTAL},
};
use payload_converters::{Encoder, ErrorSink, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Encodes values and publishes them on its own channel
#[derive(Debug)]
pub struct Publisher {
    manager: Arc<ConnectionManager>,
    config: PublisherConfig,
    encoder: Encoder,
    channel: Option<Box<dyn BrokerChannel>>,
}

impl Publisher {
    /// Create new publisher
    pub fn new(manager: Arc<ConnectionManager>, config: PublisherConfig, encoder: Encoder) -> Self {
        Self {
            manager,
            config,
            encoder,
            channel: None,
        }
    }

    /// Publisher configuration
    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    async fn ensure_channel(&mut self) -> Result<&dyn BrokerChannel, String> {
        if self.channel.as_ref().is_some_and(|c| !c.is_open()) {
            warn!("Publisher channel was closed, opening a new one");
            self.channel = None;
        }

        if self.channel.is_none() {
            let channel = self.manager.channel().await?;

            if let Some(queue) = &self.config.declare {
                let name = channel.declare_queue(queue).await.map_err(|e| {
                    error!("Failed to declare queue {}: {}", queue.name, e);
                    format!("Failed to declare queue {}: {}", queue.name, e)
                })?;
                if queue.remove_at_wrap_up {
                    self.manager.register_auto_created(name).await;
                }
            }

            self.channel = Some(channel);
        }

        self.channel
            .as_deref()
            .ok_or_else(|| "No channel available".to_string())
    }

    /// Encode the value and publish it
    pub async fn publish(&mut self, value: &Value) -> Result<(), String> {
        let start = Instant::now();

        let mut errors = ErrorSink::new();
        let payload = self.encoder.encode(Some(value), &mut errors).await;
        let payload = match payload {
            Some(payload) if errors.is_empty() => payload,
            _ => {
                MESSAGE_PUBLISH_TOTAL.with_label_values(&["error"]).inc();
                let message = errors
                    .to_message()
                    .unwrap_or_else(|| format!("{}: no payload produced", self.encoder.name()));
                error!("Failed to encode value: {}", message);
                return Err(message);
            }
        };

        let exchange = self.config.exchange.clone();
        let routing_key = self.config.routing_key.clone();
        let channel = self.ensure_channel().await?;
        let result = channel.publish(&exchange, &routing_key, &payload).await;

        MESSAGE_PUBLISH_DURATION
            .with_label_values(&[self.encoder.name()])
            .observe(start.elapsed().as_secs_f64());
        MESSAGE_PUBLISH_TOTAL
            .with_label_values(&[metrics::status(&result)])
            .inc();

        match result {
            Ok(()) => {
                debug!(
                    "Published {} bytes to '{}' with key '{}'",
                    payload.len(),
                    exchange,
                    routing_key
                );
                Ok(())
            }
            Err(e) => {
                error!("Failed to publish to '{}': {}", routing_key, e);
                Err(format!("Failed to publish to '{}': {}", routing_key, e))
            }
        }
    }

    async fn release(&mut self) {
        if let Some(channel) = self.channel.take() {
            if let Err(e) = channel.close().await {
                warn!("Failed to close publisher channel: {}", e);
            }
        }
    }

    /// Close the channel
    pub async fn wrap_up(&mut self) {
        self.release().await;
        info!("Publisher for '{}' wrapped up", self.config.routing_key);
    }

    /// Stop and release the channel; safe to call repeatedly
    pub async fn stop_execution(&mut self) {
        self.release().await;
    }
}
