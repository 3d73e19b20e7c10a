//! In-process broker
//!
//! Queues live in a shared map; only the default exchange is supported, so
//! the routing key of a publish names the target queue. Used for local flows
//! and tests.

use crate::{
    actions::QueueDeclaration,
    broker::{Broker, BrokerChannel, BrokerConnection},
    config::ConnectionSettings,
    credentials::Credentials,
    Error, Result,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct State {
    queues: HashMap<String, VecDeque<Vec<u8>>>,
    deleted: Vec<String>,
    generated: usize,
}

#[derive(Debug, Default)]
struct Counters {
    connections_opened: AtomicUsize,
    open_connections: AtomicUsize,
    channels_opened: AtomicUsize,
    open_channels: AtomicUsize,
}

/// Broker keeping its queues in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<State>>,
    counters: Arc<Counters>,
    login: Option<Credentials>,
}

fn lock(state: &Mutex<State>) -> Result<MutexGuard<'_, State>> {
    state
        .lock()
        .map_err(|_| Error::Connection("Broker state poisoned".to_string()))
}

impl InMemoryBroker {
    /// Create an empty broker accepting any login
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept connections with these credentials
    pub fn with_login(mut self, credentials: Credentials) -> Self {
        self.login = Some(credentials);
        self
    }

    /// Names of all existing queues, sorted
    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.state)
            .map(|s| s.queues.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Messages waiting in the queue, `None` if the queue does not exist
    pub fn queue_len(&self, name: &str) -> Option<usize> {
        lock(&self.state).ok()?.queues.get(name).map(VecDeque::len)
    }

    /// Every queue deletion requested so far, in order
    pub fn deleted_queues(&self) -> Vec<String> {
        lock(&self.state)
            .map(|s| s.deleted.clone())
            .unwrap_or_default()
    }

    /// Connections opened so far
    pub fn connections_opened(&self) -> usize {
        self.counters.connections_opened.load(Ordering::SeqCst)
    }

    /// Connections currently open
    pub fn open_connections(&self) -> usize {
        self.counters.open_connections.load(Ordering::SeqCst)
    }

    /// Channels opened so far
    pub fn channels_opened(&self) -> usize {
        self.counters.channels_opened.load(Ordering::SeqCst)
    }

    /// Channels currently open
    pub fn open_channels(&self) -> usize {
        self.counters.open_channels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    fn name(&self) -> &str {
        "memory"
    }

    async fn connect(
        &self,
        _settings: &ConnectionSettings,
        credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn BrokerConnection>> {
        if let Some(expected) = &self.login {
            if credentials != Some(expected) {
                return Err(Error::Connection("ACCESS_REFUSED: login refused".to_string()));
            }
        }

        self.counters.connections_opened.fetch_add(1, Ordering::SeqCst);
        self.counters.open_connections.fetch_add(1, Ordering::SeqCst);

        Ok(Arc::new(InMemoryConnection {
            state: self.state.clone(),
            counters: self.counters.clone(),
            open: Arc::new(AtomicBool::new(true)),
        }))
    }
}

#[derive(Debug)]
struct InMemoryConnection {
    state: Arc<Mutex<State>>,
    counters: Arc<Counters>,
    open: Arc<AtomicBool>,
}

#[async_trait]
impl BrokerConnection for InMemoryConnection {
    async fn create_channel(&self) -> Result<Box<dyn BrokerChannel>> {
        if !self.is_open() {
            return Err(Error::Connection("Connection closed".to_string()));
        }

        self.counters.channels_opened.fetch_add(1, Ordering::SeqCst);
        self.counters.open_channels.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(InMemoryChannel {
            state: self.state.clone(),
            counters: self.counters.clone(),
            connection_open: self.open.clone(),
            open: AtomicBool::new(true),
        }))
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        if self.open.swap(false, Ordering::SeqCst) {
            self.counters.open_connections.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[derive(Debug)]
struct InMemoryChannel {
    state: Arc<Mutex<State>>,
    counters: Arc<Counters>,
    connection_open: Arc<AtomicBool>,
    open: AtomicBool,
}

impl InMemoryChannel {
    fn check_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::Channel("Channel closed".to_string()))
        }
    }
}

#[async_trait]
impl BrokerChannel for InMemoryChannel {
    async fn declare_queue(&self, queue: &QueueDeclaration) -> Result<String> {
        self.check_open()?;
        let mut state = lock(&self.state)?;

        let name = if queue.name.is_empty() {
            state.generated += 1;
            format!("amq.gen-{}", state.generated)
        } else {
            queue.name.clone()
        };

        state.queues.entry(name.clone()).or_default();
        Ok(name)
    }

    async fn delete_queue(&self, name: &str) -> Result<()> {
        self.check_open()?;
        let mut state = lock(&self.state)?;
        state.queues.remove(name);
        state.deleted.push(name.to_string());
        Ok(())
    }

    async fn publish(&self, exchange: &str, routing_key: &str, payload: &[u8]) -> Result<()> {
        self.check_open()?;
        if !exchange.is_empty() {
            return Err(Error::Publish(format!("Unknown exchange: {}", exchange)));
        }

        match lock(&self.state)?.queues.get_mut(routing_key) {
            Some(queue) => queue.push_back(payload.to_vec()),
            None => debug!("No queue {}, message dropped", routing_key),
        }
        Ok(())
    }

    async fn get(&self, queue: &str) -> Result<Option<Vec<u8>>> {
        self.check_open()?;
        let mut state = lock(&self.state)?;

        match state.queues.get_mut(queue) {
            Some(messages) => Ok(messages.pop_front()),
            None => Err(Error::Receive(format!("NOT_FOUND: no queue '{}'", queue))),
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && self.connection_open.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        if self.open.swap(false, Ordering::SeqCst) {
            self.counters.open_channels.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_get() {
        let broker = InMemoryBroker::new();
        let connection = broker
            .connect(&ConnectionSettings::default(), None)
            .await
            .unwrap();
        let channel = connection.create_channel().await.unwrap();

        channel.declare_queue(&QueueDeclaration::named("q")).await.unwrap();
        channel.publish("", "q", b"one").await.unwrap();
        channel.publish("", "q", b"two").await.unwrap();

        assert_eq!(channel.get("q").await.unwrap(), Some(b"one".to_vec()));
        assert_eq!(channel.get("q").await.unwrap(), Some(b"two".to_vec()));
        assert_eq!(channel.get("q").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_server_named_queue() {
        let broker = InMemoryBroker::new();
        let connection = broker
            .connect(&ConnectionSettings::default(), None)
            .await
            .unwrap();
        let channel = connection.create_channel().await.unwrap();

        let name = channel
            .declare_queue(&QueueDeclaration::default())
            .await
            .unwrap();
        assert!(name.starts_with("amq.gen-"));
    }

    #[tokio::test]
    async fn test_closed_connection_closes_channels() {
        let broker = InMemoryBroker::new();
        let connection = broker
            .connect(&ConnectionSettings::default(), None)
            .await
            .unwrap();
        let channel = connection.create_channel().await.unwrap();

        connection.close().await.unwrap();

        assert!(!channel.is_open());
        assert!(channel.get("q").await.is_err());
        assert_eq!(broker.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_login_enforced() {
        let broker = InMemoryBroker::new().with_login(Credentials::new("adams", "secret"));
        let settings = ConnectionSettings::default();

        assert!(broker.connect(&settings, None).await.is_err());
        assert!(broker
            .connect(&settings, Some(&Credentials::new("adams", "wrong")))
            .await
            .is_err());
        assert!(broker
            .connect(&settings, Some(&Credentials::new("adams", "secret")))
            .await
            .is_ok());
    }
}
