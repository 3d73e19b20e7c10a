//! REST surface of the data exchange

use crate::{
    exchange::{DataExchange, ExchangeForm},
    metrics::{self, EXCHANGE_PAYLOAD_BYTES, STORED_BLOBS},
    Error, Result, PAYLOAD_FIELD,
};
use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Exchange logic
    pub exchange: Arc<DataExchange>,
}

/// Body of a successful upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Token identifying the stored payload
    pub token: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    stored_blobs: usize,
}

/// Build the router with all exchange endpoints
pub fn router(exchange: Arc<DataExchange>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/download", post(download))
        .route("/remove", post(remove))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(AppState { exchange })
}

/// Serve the router until the shutdown future resolves
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    info!("Data exchange listening on {}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Split a multipart body into text fields and the binary payload
pub async fn read_form(mut multipart: Multipart) -> Result<ExchangeForm> {
    let mut fields = HashMap::new();
    let mut payload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Multipart(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let is_payload = name == PAYLOAD_FIELD || field.file_name().is_some();

        if is_payload {
            let data = field
                .bytes()
                .await
                .map_err(|e| Error::Multipart(e.to_string()))?;
            debug!("Received payload part '{}' ({} bytes)", name, data.len());
            payload = Some(data);
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| Error::Multipart(e.to_string()))?;
            fields.insert(name, value);
        }
    }

    Ok(ExchangeForm { fields, payload })
}

fn track<T>(operation: &str, result: Result<T>) -> Result<T> {
    metrics::record_request(operation, result.is_ok());
    result
}

async fn form(multipart: std::result::Result<Multipart, MultipartRejection>) -> Result<ExchangeForm> {
    let multipart = multipart.map_err(|e| Error::Multipart(e.to_string()))?;
    read_form(multipart).await
}

async fn upload(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    let result = async {
        let form = form(multipart).await?;
        let size = form.payload.as_ref().map(|p| p.len()).unwrap_or(0);
        let token = state.exchange.upload(&form)?;
        Ok::<_, Error>((token, size))
    }
    .await;
    let (token, size) = track("upload", result)?;

    EXCHANGE_PAYLOAD_BYTES
        .with_label_values(&["upload"])
        .observe(size as f64);
    STORED_BLOBS.set(state.exchange.backend().len() as i64);

    Ok(Json(UploadResponse { token }))
}

async fn download(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Response> {
    let result = async {
        let form = form(multipart).await?;
        state.exchange.download(&form)
    }
    .await;
    let data = track("download", result)?;

    EXCHANGE_PAYLOAD_BYTES
        .with_label_values(&["download"])
        .observe(data.len() as f64);

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        data,
    )
        .into_response())
}

async fn remove(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<StatusCode> {
    let result = async {
        let form = form(multipart).await?;
        state.exchange.remove(&form)
    }
    .await;
    track("remove", result)?;

    STORED_BLOBS.set(state.exchange.backend().len() as i64);

    Ok(StatusCode::OK)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "data-exchange",
        version: env!("CARGO_PKG_VERSION"),
        stored_blobs: state.exchange.backend().len(),
    })
}

async fn metrics_handler() -> Result<String> {
    metrics::export().map_err(|e| Error::InvalidResponse(format!("Failed to export metrics: {}", e)))
}
