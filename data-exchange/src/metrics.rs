//! Prometheus metrics for the data exchange

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge, CounterVec, HistogramVec,
    IntGauge,
};

lazy_static! {
    /// Total exchange requests
    pub static ref EXCHANGE_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "data_exchange_requests_total",
        "Total data exchange requests",
        &["operation", "status"]
    )
    .expect("data_exchange_requests_total can be registered");

    /// Payload sizes moved through the exchange
    pub static ref EXCHANGE_PAYLOAD_BYTES: HistogramVec = register_histogram_vec!(
        "data_exchange_payload_bytes",
        "Payload size in bytes per operation",
        &["operation"],
        prometheus::exponential_buckets(64.0, 4.0, 12).unwrap_or_default()
    )
    .expect("data_exchange_payload_bytes can be registered");

    /// Blobs currently held by the backend
    pub static ref STORED_BLOBS: IntGauge = register_int_gauge!(
        "data_exchange_stored_blobs",
        "Number of blobs currently stored"
    )
    .expect("data_exchange_stored_blobs can be registered");
}

/// Record the outcome of one request
pub fn record_request(operation: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    EXCHANGE_REQUESTS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}

/// Render all registered metrics in the text exposition format
pub fn export() -> prometheus::Result<String> {
    prometheus::TextEncoder::new().encode_to_string(&prometheus::gather())
}
