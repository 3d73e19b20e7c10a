//! Remote-store offload: the wire payload is a data exchange token

use super::decode_reference;
use crate::{converter::Converter, encoder::Encoder, sink::ErrorSink, value::Value};
use data_exchange::DataExchangeClient;
use tracing::{debug, error};

/// Receiving side: downloads the token's bytes, hands them to the base
/// converter and optionally removes the token afterwards.
#[derive(Debug, Clone)]
pub struct RemoteOffload {
    client: DataExchangeClient,
    remove_after_retrieval: bool,
    base: Box<Converter>,
}

impl RemoteOffload {
    /// Create new remote offload converter
    pub fn new(client: DataExchangeClient, remove_after_retrieval: bool, base: Converter) -> Self {
        Self {
            client,
            remove_after_retrieval,
            base: Box::new(base),
        }
    }

    /// Exchange client
    pub fn client(&self) -> &DataExchangeClient {
        &self.client
    }

    /// Whether tokens are removed once their data was converted
    pub fn remove_after_retrieval(&self) -> bool {
        self.remove_after_retrieval
    }

    /// Wrapped converter
    pub fn base(&self) -> &Converter {
        &self.base
    }

    pub(crate) async fn resolve(&self, payload: &[u8], errors: &mut ErrorSink) -> Option<Value> {
        let token = decode_reference(payload, "token", errors)?;

        let bytes = match self.client.download(&token).await {
            Ok(bytes) => bytes,
            Err(e) => {
                errors.add(format!(
                    "Failed to download data for token {} from {}: {}",
                    token,
                    self.client.base_url(),
                    e
                ));
                return None;
            }
        };

        debug!("Downloaded {} bytes for token {}", bytes.len(), token);

        let result = self.base.convert(Some(bytes.as_slice()), errors).await;

        if result.is_some() && self.remove_after_retrieval {
            if let Err(e) = self.client.remove(&token).await {
                error!("Failed to remove token {} after retrieval: {}", token, e);
                errors.add_cleanup(format!("Failed to remove token {}: {}", token, e));
            }
        }

        result
    }
}

/// Sending side: encodes with the base encoder, uploads the bytes and sends
/// the returned token.
#[derive(Debug, Clone)]
pub struct RemoteOffloadEncoder {
    client: DataExchangeClient,
    base: Box<Encoder>,
}

impl RemoteOffloadEncoder {
    /// Create new remote offload encoder
    pub fn new(client: DataExchangeClient, base: Encoder) -> Self {
        Self {
            client,
            base: Box::new(base),
        }
    }

    /// Exchange client
    pub fn client(&self) -> &DataExchangeClient {
        &self.client
    }

    /// Wrapped encoder
    pub fn base(&self) -> &Encoder {
        &self.base
    }

    pub(crate) async fn offload(&self, value: &Value, errors: &mut ErrorSink) -> Option<Vec<u8>> {
        let bytes = self.base.encode(Some(value), errors).await?;

        match self.client.upload(bytes).await {
            Ok(token) => Some(token.into_bytes()),
            Err(e) => {
                errors.add(format!(
                    "Failed to upload payload to {}: {}",
                    self.client.base_url(),
                    e
                ));
                None
            }
        }
    }
}
