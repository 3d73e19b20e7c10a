//! Connection and actor configuration

use crate::{actions::QueueDeclaration, flow::StopMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// AMQP default port
pub const DEFAULT_PORT: u16 = 5672;

/// Default stop message when the credentials prompt is dismissed
pub const DEFAULT_CANCEL_MESSAGE: &str = "Credentials prompt canceled";

/// What to do when the user dismisses the credentials prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CancelAction {
    /// Stop the owning flow with the message
    StopFlow {
        /// Scope to stop
        #[serde(default)]
        mode: StopMode,
        /// Stop message
        #[serde(default = "default_cancel_message")]
        message: String,
    },
    /// Carry on without credentials
    Ignore,
}

fn default_cancel_message() -> String {
    DEFAULT_CANCEL_MESSAGE.to_string()
}

impl Default for CancelAction {
    fn default() -> Self {
        CancelAction::StopFlow {
            mode: StopMode::Global,
            message: default_cancel_message(),
        }
    }
}

/// Broker connection settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Broker host
    pub host: String,

    /// Broker port
    pub port: u16,

    /// Virtual host
    pub vhost: String,

    /// User; no user means the broker's default login
    pub user: Option<String>,

    /// Password for the user
    pub password: Option<String>,

    /// Ask for the password when a user is set but no password
    pub prompt_for_password: bool,

    /// No graphical environment, interactive prompts unavailable
    pub headless: bool,

    /// Reaction to a dismissed prompt
    pub on_prompt_cancel: CancelAction,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            vhost: "/".to_string(),
            user: None,
            password: None,
            prompt_for_password: false,
            headless: false,
            on_prompt_cancel: CancelAction::default(),
        }
    }
}

impl ConnectionSettings {
    /// Settings for host and port with defaults otherwise
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set user and password
    pub fn with_login(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Whether the password still has to be obtained from the user
    pub fn needs_password(&self) -> bool {
        self.user.as_deref().is_some_and(|u| !u.is_empty()) && self.password.is_none()
    }

    /// `host:port/vhost` for logging
    pub fn address(&self) -> String {
        format!("{}:{}{}", self.host, self.port, self.vhost)
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("vhost", &self.vhost)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("prompt_for_password", &self.prompt_for_password)
            .field("headless", &self.headless)
            .field("on_prompt_cancel", &self.on_prompt_cancel)
            .finish()
    }
}

/// Publisher configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Exchange to publish to; empty means the default exchange
    pub exchange: String,

    /// Routing key; the queue name when using the default exchange
    pub routing_key: String,

    /// Queue to declare before the first publish
    pub declare: Option<QueueDeclaration>,
}

impl PublisherConfig {
    /// Publish straight to the queue through the default exchange
    pub fn to_queue(queue: impl Into<String>) -> Self {
        Self {
            exchange: String::new(),
            routing_key: queue.into(),
            declare: None,
        }
    }
}

/// Subscriber configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberConfig {
    /// Queue to consume from
    pub queue: String,

    /// Declare the queue on activation and delete it at wrap-up
    pub auto_create: bool,

    /// Delay between polls of an empty queue, in milliseconds
    pub poll_interval_ms: u64,

    /// Give up waiting for a message after this many milliseconds
    pub timeout_ms: u64,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            queue: String::new(),
            auto_create: false,
            poll_interval_ms: 100,
            timeout_ms: 5_000,
        }
    }
}

impl SubscriberConfig {
    /// Consume from the queue with default timings
    pub fn for_queue(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            ..Default::default()
        }
    }

    /// Poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Receive timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_password() {
        let mut settings = ConnectionSettings::default();
        assert!(!settings.needs_password());

        settings.user = Some("admin".to_string());
        assert!(settings.needs_password());

        settings.password = Some(String::new());
        assert!(!settings.needs_password());
    }

    #[test]
    fn test_settings_from_json() {
        let settings: ConnectionSettings = serde_json::from_str(
            r#"{
                "host": "rabbit",
                "user": "adams",
                "prompt_for_password": true,
                "on_prompt_cancel": {"action": "stop_flow", "mode": "local"}
            }"#,
        )
        .unwrap();

        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.address(), "rabbit:5672/");
        assert_eq!(
            settings.on_prompt_cancel,
            CancelAction::StopFlow {
                mode: StopMode::Local,
                message: DEFAULT_CANCEL_MESSAGE.to_string()
            }
        );
    }

    #[test]
    fn test_password_hidden() {
        let settings = ConnectionSettings::default().with_login("adams", "hunter2");
        assert!(!format!("{:?}", settings).contains("hunter2"));
    }
}
