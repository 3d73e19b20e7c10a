//! Remote Data Exchange
//!
//! Token-based blob store used to move large payloads out of band:
//! - `POST /upload` stores a payload and hands back a token
//! - `POST /download` returns the payload stored under a token
//! - `POST /remove` drops a token (always succeeds)
//!
//! Every operation is gated by an optional [`Authentication`] scheme that is
//! evaluated against the multipart form fields before the backend is touched.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐        multipart         ┌──────────────────────┐
//! │ DataExchangeClient   │ ───────────────────────▶ │  axum Router         │
//! │ (reqwest)            │ ◀─────────────────────── │  (server::router)    │
//! └──────────────────────┘   token / octet-stream   └──────────┬───────────┘
//!                                                              │
//!                                                   ┌──────────▼───────────┐
//!                                                   │ DataExchange         │
//!                                                   │ auth gate + backend  │
//!                                                   └──────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod auth;
pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod exchange;
pub mod metrics;
pub mod server;

pub use auth::{Authentication, ClientAuthentication};
pub use backend::{Backend, InMemoryBackend};
pub use client::{ClientConfig, DataExchangeClient};
pub use config::Config;
pub use error::{Error, Result};
pub use exchange::{DataExchange, ExchangeForm};

/// Form field carrying the binary payload on upload
pub const PAYLOAD_FIELD: &str = "payload";

/// Form field carrying the exchange token on download/remove
pub const TOKEN_FIELD: &str = "token";
