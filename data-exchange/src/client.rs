//! Client helper for a remote data exchange

use crate::{
    auth::ClientAuthentication, server::UploadResponse, Error, Result, PAYLOAD_FIELD, TOKEN_FIELD,
};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the exchange, e.g. `http://localhost:8080`
    pub url: String,

    /// Authentication fields sent with every request
    #[serde(default)]
    pub auth: ClientAuthentication,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    crate::config::DEFAULT_REQUEST_TIMEOUT_SECONDS
}

impl ClientConfig {
    /// Configuration for the given URL without authentication
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth: ClientAuthentication::None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Upload/download/remove against a remote exchange
#[derive(Debug, Clone)]
pub struct DataExchangeClient {
    base_url: String,
    auth: ClientAuthentication,
    http: reqwest::Client,
}

impl DataExchangeClient {
    /// Create new client
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            auth: config.auth.clone(),
            http,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn form(&self) -> Form {
        self.auth
            .fields()
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value))
    }

    async fn post(&self, operation: &'static str, form: Form) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.base_url, operation);
        debug!("POST {}", url);

        let response = self.http.post(&url).multipart(form).send().await?;
        let status = response.status();

        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or(body);

            error!("Data exchange {} failed ({}): {}", operation, status, message);
            return Err(Error::Status {
                operation,
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    /// Upload the data, returning the token it is stored under
    pub async fn upload(&self, data: Vec<u8>) -> Result<String> {
        let size = data.len();
        let part = Part::bytes(data)
            .file_name(PAYLOAD_FIELD)
            .mime_str("application/octet-stream")?;

        let response = self.post("upload", self.form().part(PAYLOAD_FIELD, part)).await?;
        let upload: UploadResponse = response.json().await?;

        if upload.token.is_empty() {
            return Err(Error::InvalidResponse("Empty token returned".to_string()));
        }

        info!("Uploaded {} bytes, token {}", size, upload.token);
        Ok(upload.token)
    }

    /// Download the data stored under the token
    pub async fn download(&self, token: &str) -> Result<Vec<u8>> {
        let form = self.form().text(TOKEN_FIELD, token.to_string());
        let response = self.post("download", form).await?;
        let data = response.bytes().await?;

        debug!("Downloaded {} bytes for token {}", data.len(), token);
        Ok(data.to_vec())
    }

    /// Remove the token from the exchange
    pub async fn remove(&self, token: &str) -> Result<()> {
        let form = self.form().text(TOKEN_FIELD, token.to_string());
        self.post("remove", form).await?;

        debug!("Removed token {}", token);
        Ok(())
    }
}
