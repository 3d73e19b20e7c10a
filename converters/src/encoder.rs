//! Value -> bytes conversion for the sending side

use crate::{
    offload::{FileOffloadEncoder, RemoteOffloadEncoder},
    serialization,
    sink::ErrorSink,
    value::{DataType, Value},
};
use futures::future::{BoxFuture, FutureExt};

/// Turns a [`Value`] into the byte payload to transmit
#[derive(Debug, Clone)]
pub enum Encoder {
    /// bincode-serialize the value
    Binary,
    /// UTF-8 bytes of a text value
    Text,
    /// Write the encoded bytes to a shared directory, send the filename
    FileOffload(FileOffloadEncoder),
    /// Upload the encoded bytes to a data exchange, send the token
    RemoteOffload(RemoteOffloadEncoder),
}

impl Encoder {
    /// Short name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Encoder::Binary => "BinaryEncoder",
            Encoder::Text => "StringEncoder",
            Encoder::FileOffload(_) => "FileOffloadEncoder",
            Encoder::RemoteOffload(_) => "RemoteOffloadEncoder",
        }
    }

    /// Type of the values this encoder accepts
    pub fn accepts(&self) -> DataType {
        match self {
            Encoder::Binary => DataType::Object,
            Encoder::Text => DataType::Text,
            Encoder::FileOffload(f) => f.base().accepts(),
            Encoder::RemoteOffload(r) => r.base().accepts(),
        }
    }

    /// Encode the value
    ///
    /// Returns bytes only if no errors were recorded in `errors`.
    pub fn encode<'a>(
        &'a self,
        value: Option<&'a Value>,
        errors: &'a mut ErrorSink,
    ) -> BoxFuture<'a, Option<Vec<u8>>> {
        async move {
            let Some(value) = value else {
                errors.add(format!("{}: no value provided!", self.name()));
                return None;
            };

            if !self.accepts().accepts(value) {
                errors.add(format!(
                    "{}: expected {} value, got {}",
                    self.name(),
                    self.accepts(),
                    value.data_type()
                ));
                return None;
            }

            let result = match self {
                Encoder::Binary => match serialization::to_bytes(value) {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        errors.add(format!("Failed to serialize object: {}", e));
                        None
                    }
                },
                Encoder::Text => value.as_text().map(|s| s.as_bytes().to_vec()),
                Encoder::FileOffload(f) => f.offload(value, errors).await,
                Encoder::RemoteOffload(r) => r.offload(value, errors).await,
            };

            if errors.is_empty() {
                result
            } else {
                None
            }
        }
        .boxed()
    }
}
