//! Source actor receiving and converting messages

use crate::{
    actions::QueueDeclaration,
    broker::BrokerChannel,
    config::SubscriberConfig,
    connection::ConnectionManager,
    metrics::MESSAGE_RECEIVE_TOTAL,
};
use payload_converters::{Converter, ErrorSink, Value};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

enum Polled {
    Message(Vec<u8>),
    TimedOut,
    Stopped,
    Failed(String),
}

/// Polls a queue on its own channel and converts what arrives
#[derive(Debug)]
pub struct Subscriber {
    manager: Arc<ConnectionManager>,
    config: SubscriberConfig,
    converter: Converter,
    channel: Option<Box<dyn BrokerChannel>>,
    queue: Option<String>,
    stop: CancellationToken,
}

impl Subscriber {
    /// Create new subscriber
    pub fn new(manager: Arc<ConnectionManager>, config: SubscriberConfig, converter: Converter) -> Self {
        Self {
            manager,
            config,
            converter,
            channel: None,
            queue: None,
            stop: CancellationToken::new(),
        }
    }

    /// Subscriber configuration
    pub fn config(&self) -> &SubscriberConfig {
        &self.config
    }

    /// Name of the queue being consumed, once known
    pub fn queue(&self) -> Option<&str> {
        self.queue.as_deref()
    }

    /// Token interrupting a pending [`receive`](Self::receive) from another
    /// task; valid until the next wrap-up
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    async fn ensure_channel(&mut self) -> Result<(), String> {
        if self.channel.as_ref().is_some_and(|c| !c.is_open()) {
            warn!("Subscriber channel was closed, opening a new one");
            self.channel = None;
        }

        if self.channel.is_some() {
            return Ok(());
        }

        let channel = self.manager.channel().await?;

        let queue = if self.config.auto_create {
            let declaration = QueueDeclaration::named(self.config.queue.clone());
            let name = channel.declare_queue(&declaration).await.map_err(|e| {
                error!("Failed to create queue {}: {}", self.config.queue, e);
                format!("Failed to create queue {}: {}", self.config.queue, e)
            })?;
            self.manager.register_auto_created(name.clone()).await;
            name
        } else {
            self.config.queue.clone()
        };

        info!("Subscribed to queue {}", queue);
        self.queue = Some(queue);
        self.channel = Some(channel);
        Ok(())
    }

    async fn poll(&self) -> Polled {
        let (Some(channel), Some(queue)) = (self.channel.as_deref(), self.queue.as_deref()) else {
            return Polled::Failed("Not subscribed".to_string());
        };

        let deadline = Instant::now() + self.config.timeout();

        loop {
            match channel.get(queue).await {
                Ok(Some(bytes)) => return Polled::Message(bytes),
                Ok(None) => {}
                Err(e) => return Polled::Failed(format!("Failed to receive from {}: {}", queue, e)),
            }

            let now = Instant::now();
            if now >= deadline {
                return Polled::TimedOut;
            }

            let wait = self.config.poll_interval().min(deadline - now);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.stop.cancelled() => return Polled::Stopped,
            }
        }
    }

    /// Wait for the next message and convert it
    ///
    /// Returns `Ok(None)` when nothing arrived within the timeout or the
    /// subscriber was stopped.
    pub async fn receive(&mut self) -> Result<Option<Value>, String> {
        if self.stop.is_cancelled() {
            return Ok(None);
        }

        self.ensure_channel().await?;

        let bytes = match self.poll().await {
            Polled::Message(bytes) => bytes,
            Polled::TimedOut => {
                MESSAGE_RECEIVE_TOTAL.with_label_values(&["timeout"]).inc();
                debug!(
                    "No message on {} within {:?}",
                    self.queue.as_deref().unwrap_or_default(),
                    self.config.timeout()
                );
                return Ok(None);
            }
            Polled::Stopped => {
                MESSAGE_RECEIVE_TOTAL.with_label_values(&["stopped"]).inc();
                self.release().await;
                return Ok(None);
            }
            Polled::Failed(message) => {
                MESSAGE_RECEIVE_TOTAL.with_label_values(&["error"]).inc();
                error!("{}", message);
                return Err(message);
            }
        };

        let mut errors = ErrorSink::new();
        let value = self.converter.convert(Some(bytes.as_slice()), &mut errors).await;

        for cleanup in errors.cleanup_errors() {
            warn!("{}", cleanup);
        }

        match value {
            Some(value) => {
                MESSAGE_RECEIVE_TOTAL.with_label_values(&["success"]).inc();
                debug!("Received {} bytes, converted to {}", bytes.len(), value.data_type());
                Ok(Some(value))
            }
            None => {
                MESSAGE_RECEIVE_TOTAL.with_label_values(&["error"]).inc();
                let message = errors
                    .to_message()
                    .unwrap_or_else(|| format!("{}: no value produced", self.converter.name()));
                error!("Failed to convert message: {}", message);
                Err(message)
            }
        }
    }

    async fn release(&mut self) {
        if let Some(channel) = self.channel.take() {
            if let Err(e) = channel.close().await {
                warn!("Failed to close subscriber channel: {}", e);
            }
        }
    }

    /// Close the channel
    pub async fn wrap_up(&mut self) {
        self.release().await;
        self.queue = None;
        self.stop = CancellationToken::new();
        info!("Subscriber for '{}' wrapped up", self.config.queue);
    }

    /// Interrupt a pending receive and release the channel; safe to call
    /// repeatedly
    pub async fn stop_execution(&mut self) {
        self.stop.cancel();
        self.release().await;
    }
}
