//! Payload conversion chain
//!
//! Broker message bodies and exchange downloads are raw bytes. A
//! [`Converter`] turns bytes into a [`Value`], an [`Encoder`] does the
//! reverse. Both come in base flavours (binary, text) and offload flavours
//! that move the actual bytes out of band:
//!
//! - file offload: the wire payload is a filename inside a shared directory
//! - remote offload: the wire payload is a token on a remote data exchange
//!
//! Errors are accumulated in a caller-supplied [`ErrorSink`]; a conversion
//! either produces a value with an empty sink or nothing with a non-empty one.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod converter;
pub mod encoder;
pub mod error;
pub mod offload;
pub mod serialization;
pub mod sink;
pub mod value;

pub use config::{ConverterConfig, EncoderConfig};
pub use converter::Converter;
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use offload::{FileOffload, FileOffloadEncoder, RemoteOffload, RemoteOffloadEncoder};
pub use sink::ErrorSink;
pub use value::{DataType, Value};
