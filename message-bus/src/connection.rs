//! Connection shared by every broker actor of a flow

use crate::{
    broker::{Broker, BrokerChannel, BrokerConnection},
    config::{CancelAction, ConnectionSettings},
    credentials::{ConsolePrompt, CredentialPrompt, Credentials, PromptOutcome},
    flow::FlowScope,
    metrics::BROKER_CONNECTIONS_TOTAL,
    Error,
};
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle of the managed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never executed
    Uninitialized,
    /// Waiting for the user to enter credentials
    AcquiringCredentials,
    /// Opening the native connection
    Connecting,
    /// Connection open and cached
    Open,
    /// Wrapped up or stopped
    Closed,
}

#[derive(Debug)]
struct Inner {
    state: ConnectionState,
    connection: Option<Arc<dyn BrokerConnection>>,
    credentials: Option<Credentials>,
    credentials_acquired: bool,
    auto_created: Vec<String>,
}

/// Owns the native connection of a flow
///
/// Connects lazily on the first [`execute`](Self::execute), obtaining the
/// password from a prompt if configured. Dependents receive the manager as an
/// `Arc` and open their own channels on the shared connection.
pub struct ConnectionManager {
    settings: ConnectionSettings,
    broker: Arc<dyn Broker>,
    flow: FlowScope,
    interactive_prompt: Option<Arc<dyn CredentialPrompt>>,
    console_prompt: Arc<dyn CredentialPrompt>,
    inner: Mutex<Inner>,
    stop: StdMutex<CancellationToken>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("address", &self.settings.address())
            .field("broker", &self.broker.name())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create new manager; nothing is opened until the first execution
    pub fn new(settings: ConnectionSettings, broker: Arc<dyn Broker>, flow: FlowScope) -> Self {
        Self {
            settings,
            broker,
            flow,
            interactive_prompt: None,
            console_prompt: Arc::new(ConsolePrompt),
            inner: Mutex::new(Inner {
                state: ConnectionState::Uninitialized,
                connection: None,
                credentials: None,
                credentials_acquired: false,
                auto_created: Vec::new(),
            }),
            stop: StdMutex::new(CancellationToken::new()),
        }
    }

    /// Prompt used when not running headless
    pub fn with_interactive_prompt(mut self, prompt: Arc<dyn CredentialPrompt>) -> Self {
        self.interactive_prompt = Some(prompt);
        self
    }

    /// Prompt used when headless or no interactive prompt was supplied
    pub fn with_console_prompt(mut self, prompt: Arc<dyn CredentialPrompt>) -> Self {
        self.console_prompt = prompt;
        self
    }

    /// Connection settings
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Scope of the owning flow
    pub fn flow(&self) -> &FlowScope {
        &self.flow
    }

    /// Current lifecycle state
    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    /// Cached native connection, if open
    pub async fn connection(&self) -> Option<Arc<dyn BrokerConnection>> {
        self.inner.lock().await.connection.clone()
    }

    fn stop_token(&self) -> CancellationToken {
        match self.stop.lock() {
            Ok(token) => token.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn reset_stop_token(&self) {
        match self.stop.lock() {
            Ok(mut token) => *token = CancellationToken::new(),
            Err(poisoned) => *poisoned.into_inner() = CancellationToken::new(),
        }
    }

    fn select_prompt(&self) -> Option<Arc<dyn CredentialPrompt>> {
        if !self.settings.headless {
            if let Some(prompt) = &self.interactive_prompt {
                if prompt.is_supported() {
                    return Some(prompt.clone());
                }
            }
        }

        if self.console_prompt.is_supported() {
            Some(self.console_prompt.clone())
        } else {
            None
        }
    }

    async fn acquire_credentials(&self) -> Result<Option<Credentials>, String> {
        let user = match self.settings.user.as_deref() {
            Some(user) if !user.is_empty() => user,
            _ => return Ok(None),
        };

        if let Some(password) = &self.settings.password {
            return Ok(Some(Credentials::new(user, password.clone())));
        }

        if !self.settings.prompt_for_password {
            return Ok(Some(Credentials::new(user, "")));
        }

        let Some(prompt) = self.select_prompt() else {
            warn!("No credentials prompt available, connecting without password");
            return Ok(Some(Credentials::new(user, "")));
        };

        match prompt.prompt(user).await {
            PromptOutcome::Provided(credentials) => Ok(Some(credentials)),
            PromptOutcome::Canceled => match &self.settings.on_prompt_cancel {
                CancelAction::StopFlow { mode, message } => {
                    self.flow.stop(*mode, message.clone());
                    Err(message.clone())
                }
                CancelAction::Ignore => {
                    info!("Credentials prompt canceled, connecting without credentials");
                    Ok(None)
                }
            },
        }
    }

    /// Make sure the connection is open
    ///
    /// The first call obtains credentials and connects; later calls reuse the
    /// cached connection without authenticating again.
    pub async fn execute(&self) -> Result<(), String> {
        let stop = self.stop_token();
        if stop.is_cancelled() {
            return Err(Error::Stopped.to_string());
        }

        let mut inner = self.inner.lock().await;

        if let Some(connection) = &inner.connection {
            if connection.is_open() {
                debug!("Reusing connection to {}", self.settings.address());
                return Ok(());
            }
            warn!("Connection to {} was lost, reconnecting", self.settings.address());
            inner.connection = None;
        }

        if !inner.credentials_acquired {
            inner.state = ConnectionState::AcquiringCredentials;
            let acquired = tokio::select! {
                result = self.acquire_credentials() => result,
                _ = stop.cancelled() => {
                    info!("Credential prompt for {} abandoned", self.settings.address());
                    Err(Error::Stopped.to_string())
                }
            };
            match acquired {
                Ok(credentials) => {
                    inner.credentials = credentials;
                    inner.credentials_acquired = true;
                }
                Err(message) => {
                    inner.state = ConnectionState::Uninitialized;
                    return Err(message);
                }
            }
        }

        inner.state = ConnectionState::Connecting;
        info!(
            "Connecting to {} via {}",
            self.settings.address(),
            self.broker.name()
        );

        let result = tokio::select! {
            result = self.broker.connect(&self.settings, inner.credentials.as_ref()) => result,
            _ = stop.cancelled() => Err(Error::Stopped),
        };

        match result {
            Ok(connection) => {
                BROKER_CONNECTIONS_TOTAL.with_label_values(&["opened"]).inc();
                info!("Connected to {}", self.settings.address());
                inner.connection = Some(connection);
                inner.state = ConnectionState::Open;
                Ok(())
            }
            Err(e) => {
                BROKER_CONNECTIONS_TOTAL.with_label_values(&["failed"]).inc();
                error!("Failed to connect to {}: {}", self.settings.address(), e);
                inner.state = ConnectionState::Uninitialized;
                Err(format!(
                    "Failed to connect to {}: {}",
                    self.settings.address(),
                    e
                ))
            }
        }
    }

    /// Open a channel on the shared connection, connecting first if needed
    pub async fn channel(&self) -> Result<Box<dyn BrokerChannel>, String> {
        self.execute().await?;

        let connection = self
            .connection()
            .await
            .ok_or_else(|| "No connection available".to_string())?;

        connection.create_channel().await.map_err(|e| {
            error!("Failed to open channel: {}", e);
            format!("Failed to open channel: {}", e)
        })
    }

    /// Remember a queue to delete at wrap-up
    pub async fn register_auto_created(&self, name: impl Into<String>) {
        let name = name.into();
        let mut inner = self.inner.lock().await;
        if !inner.auto_created.contains(&name) {
            debug!("Queue {} will be deleted at wrap-up", name);
            inner.auto_created.push(name);
        }
    }

    /// Queues registered for deletion, in registration order
    pub async fn auto_created(&self) -> Vec<String> {
        self.inner.lock().await.auto_created.clone()
    }

    /// Delete auto-created queues in order and close the connection
    ///
    /// Failures are logged and skipped. A later execution opens a fresh
    /// connection.
    pub async fn wrap_up(&self) {
        let mut inner = self.inner.lock().await;
        let auto_created = std::mem::take(&mut inner.auto_created);

        if let Some(connection) = inner.connection.take() {
            self.release(connection.as_ref(), &auto_created).await;
            info!("Connection to {} closed", self.settings.address());
        } else if !auto_created.is_empty() {
            warn!(
                "No connection, {} auto-created queue(s) left behind",
                auto_created.len()
            );
        }

        inner.state = ConnectionState::Closed;
        drop(inner);
        self.reset_stop_token();
    }

    async fn release(&self, connection: &dyn BrokerConnection, auto_created: &[String]) {
        if !auto_created.is_empty() {
            match connection.create_channel().await {
                Ok(channel) => {
                    for name in auto_created {
                        match channel.delete_queue(name).await {
                            Ok(()) => info!("Deleted auto-created queue {}", name),
                            Err(e) => warn!("Failed to delete queue {}: {}", name, e),
                        }
                    }
                    if let Err(e) = channel.close().await {
                        warn!("Failed to close cleanup channel: {}", e);
                    }
                }
                Err(e) => warn!(
                    "Failed to open channel, {} auto-created queue(s) left behind: {}",
                    auto_created.len(),
                    e
                ),
            }
        }

        if let Err(e) = connection.close().await {
            warn!("Failed to close connection: {}", e);
        }
    }

    /// Stop any pending prompt or connect and release the connection
    ///
    /// Auto-created queues are deleted before the connection goes away.
    /// Idempotent, also before the first execution.
    pub async fn stop_execution(&self) {
        self.stop_token().cancel();

        let mut inner = self.inner.lock().await;
        if let Some(connection) = inner.connection.take() {
            let auto_created = std::mem::take(&mut inner.auto_created);
            self.release(connection.as_ref(), &auto_created).await;
            info!("Connection to {} released", self.settings.address());
        }
        if inner.state != ConnectionState::Uninitialized {
            inner.state = ConnectionState::Closed;
        }
    }
}
