//! Broker plumbing for flows
//!
//! Provides:
//! - A broker abstraction with an AMQP transport (lapin) and an in-memory one
//! - A connection manager shared by all broker actors of a flow, with lazy
//!   connect, credential prompting and wrap-up of auto-created queues
//! - Channel actions (declare/delete queue) applied through a per-actor channel
//! - Publisher (sink) and subscriber (source) actors built on the payload
//!   converter chain
//! - Observability via Prometheus metrics
//!
//! ```text
//!   Publisher ──┐                       ┌── channel ──► broker
//!   Subscriber ─┼─► ConnectionManager ──┼── channel ──► broker
//!   Executor ───┘    (one connection)   └── channel ──► broker
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod actions;
pub mod amqp;
pub mod broker;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod error;
pub mod flow;
pub mod memory;
pub mod metrics;
pub mod publisher;
pub mod subscriber;

pub use actions::{ChannelAction, ChannelActionExecutor, QueueDeclaration};
pub use amqp::AmqpBroker;
pub use broker::{Broker, BrokerChannel, BrokerConnection};
pub use config::{CancelAction, ConnectionSettings, PublisherConfig, SubscriberConfig};
pub use connection::{ConnectionManager, ConnectionState};
pub use credentials::{ConsolePrompt, CredentialPrompt, Credentials, PromptOutcome};
pub use error::{Error, Result};
pub use flow::{FlowScope, StopMode};
pub use memory::InMemoryBroker;
pub use publisher::Publisher;
pub use subscriber::Subscriber;
