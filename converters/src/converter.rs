//! Bytes -> value conversion

use crate::{
    offload::{FileOffload, RemoteOffload},
    serialization,
    sink::ErrorSink,
    value::{DataType, Value},
};
use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

/// Turns a received byte payload into a [`Value`]
#[derive(Debug, Clone)]
pub enum Converter {
    /// bincode-serialized [`Value`]
    Binary,
    /// UTF-8 string
    Text,
    /// Payload is a filename in a shared directory
    FileOffload(FileOffload),
    /// Payload is a token on a remote data exchange
    RemoteOffload(RemoteOffload),
}

impl Converter {
    /// Short name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Converter::Binary => "BinaryConverter",
            Converter::Text => "StringConverter",
            Converter::FileOffload(_) => "FileOffloadConverter",
            Converter::RemoteOffload(_) => "RemoteOffloadConverter",
        }
    }

    /// Type of the values this converter produces
    pub fn generates(&self) -> DataType {
        match self {
            Converter::Binary => DataType::Object,
            Converter::Text => DataType::Text,
            Converter::FileOffload(f) => f.base().generates(),
            Converter::RemoteOffload(r) => r.base().generates(),
        }
    }

    /// Convert the payload
    ///
    /// Returns a value only if no errors were recorded in `errors`.
    pub fn convert<'a>(
        &'a self,
        payload: Option<&'a [u8]>,
        errors: &'a mut ErrorSink,
    ) -> BoxFuture<'a, Option<Value>> {
        async move {
            let Some(payload) = payload else {
                errors.add(format!("{}: no payload provided!", self.name()));
                return None;
            };

            let result = self.do_convert(payload, errors).await;

            if !errors.is_empty() {
                return None;
            }
            if result.is_none() {
                errors.add(format!("{}: conversion produced no result!", self.name()));
            }
            result
        }
        .boxed()
    }

    async fn do_convert(&self, payload: &[u8], errors: &mut ErrorSink) -> Option<Value> {
        debug!("{} converting {} bytes", self.name(), payload.len());

        match self {
            Converter::Binary => match serialization::from_bytes::<Value>(payload) {
                Ok(value) => Some(value),
                Err(e) => {
                    errors.add(format!("Failed to deserialize object: {}", e));
                    None
                }
            },
            Converter::Text => match std::str::from_utf8(payload) {
                Ok(s) => Some(Value::Text(s.to_string())),
                Err(e) => {
                    errors.add(format!("Payload is not valid UTF-8: {}", e));
                    None
                }
            },
            Converter::FileOffload(f) => f.resolve(payload, errors).await,
            Converter::RemoteOffload(r) => r.resolve(payload, errors).await,
        }
    }
}
