//! Channel actions and the actor that applies them

use crate::{
    broker::BrokerChannel,
    connection::ConnectionManager,
    metrics::{self, CHANNEL_ACTIONS_TOTAL},
    Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Queue to declare
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueDeclaration {
    /// Queue name; empty lets the broker pick one
    pub name: String,
    /// Survive broker restarts
    pub durable: bool,
    /// Only usable by the declaring connection
    pub exclusive: bool,
    /// Deleted by the broker once the last consumer is gone
    pub auto_delete: bool,
    /// Delete the queue when the connection manager wraps up
    pub remove_at_wrap_up: bool,
}

impl QueueDeclaration {
    /// Non-durable, shared queue with the given name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Operation applied to a channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelAction {
    /// Do nothing
    #[default]
    Noop,
    /// Declare a queue
    DeclareQueue(QueueDeclaration),
    /// Delete a queue
    DeleteQueue {
        /// Queue name
        name: String,
    },
}

impl ChannelAction {
    /// Label used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            ChannelAction::Noop => "noop",
            ChannelAction::DeclareQueue(_) => "declare_queue",
            ChannelAction::DeleteQueue { .. } => "delete_queue",
        }
    }

    /// Apply the action; returns the declared queue's name, if any
    pub async fn apply(&self, channel: &dyn BrokerChannel) -> Result<Option<String>> {
        match self {
            ChannelAction::Noop => Ok(None),
            ChannelAction::DeclareQueue(queue) => {
                let name = channel.declare_queue(queue).await?;
                debug!("Declared queue {}", name);
                Ok(Some(name))
            }
            ChannelAction::DeleteQueue { name } => {
                channel.delete_queue(name).await?;
                debug!("Deleted queue {}", name);
                Ok(None)
            }
        }
    }
}

/// Applies a [`ChannelAction`] on every execution
///
/// The channel is opened on the first execution and kept until wrap-up.
/// Nothing is cached between executions: declaring twice declares twice.
#[derive(Debug)]
pub struct ChannelActionExecutor {
    manager: Arc<ConnectionManager>,
    action: ChannelAction,
    channel: Option<Box<dyn BrokerChannel>>,
}

impl ChannelActionExecutor {
    /// Create new executor
    pub fn new(manager: Arc<ConnectionManager>, action: ChannelAction) -> Self {
        Self {
            manager,
            action,
            channel: None,
        }
    }

    /// Configured action
    pub fn action(&self) -> &ChannelAction {
        &self.action
    }

    /// Whether a channel is currently held
    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    async fn ensure_channel(&mut self) -> std::result::Result<&dyn BrokerChannel, String> {
        if self.channel.as_ref().is_some_and(|c| !c.is_open()) {
            warn!("Channel was closed, opening a new one");
            self.channel = None;
        }

        if self.channel.is_none() {
            self.channel = Some(self.manager.channel().await?);
        }

        self.channel
            .as_deref()
            .ok_or_else(|| "No channel available".to_string())
    }

    /// Apply the action
    pub async fn execute(&mut self) -> std::result::Result<(), String> {
        let action = self.action.clone();
        let channel = self.ensure_channel().await?;

        let result = action.apply(channel).await;
        CHANNEL_ACTIONS_TOTAL
            .with_label_values(&[action.name(), metrics::status(&result)])
            .inc();

        match result {
            Ok(declared) => {
                if let (Some(name), ChannelAction::DeclareQueue(queue)) = (declared, &action) {
                    if queue.remove_at_wrap_up {
                        self.manager.register_auto_created(name).await;
                    }
                }
                Ok(())
            }
            Err(e) => {
                error!("Channel action {} failed: {}", action.name(), e);
                Err(format!("Failed to apply {}: {}", action.name(), e))
            }
        }
    }

    async fn release(&mut self) {
        if let Some(channel) = self.channel.take() {
            if let Err(e) = channel.close().await {
                warn!("Failed to close channel: {}", e);
            }
        }
    }

    /// Close the channel
    pub async fn wrap_up(&mut self) {
        self.release().await;
        info!("Channel action executor ({}) wrapped up", self.action.name());
    }

    /// Stop and release the channel; safe to call repeatedly
    pub async fn stop_execution(&mut self) {
        self.release().await;
    }
}
