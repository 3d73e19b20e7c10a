//! Prometheus metrics for message bus

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

lazy_static! {
    /// Broker connection attempts
    pub static ref BROKER_CONNECTIONS_TOTAL: CounterVec = register_counter_vec!(
        "message_bus_connections_total",
        "Broker connection attempts",
        &["status"]
    )
    .expect("metric can be registered");

    /// Total messages published
    pub static ref MESSAGE_PUBLISH_TOTAL: CounterVec = register_counter_vec!(
        "message_bus_publish_total",
        "Total messages published",
        &["status"]
    )
    .expect("metric can be registered");

    /// Message publish duration
    pub static ref MESSAGE_PUBLISH_DURATION: HistogramVec = register_histogram_vec!(
        "message_bus_publish_duration_seconds",
        "Message publish duration in seconds, including encoding",
        &["encoder"]
    )
    .expect("metric can be registered");

    /// Total messages received
    pub static ref MESSAGE_RECEIVE_TOTAL: CounterVec = register_counter_vec!(
        "message_bus_receive_total",
        "Total receive attempts by outcome",
        &["status"]
    )
    .expect("metric can be registered");

    /// Channel actions applied
    pub static ref CHANNEL_ACTIONS_TOTAL: CounterVec = register_counter_vec!(
        "message_bus_channel_actions_total",
        "Channel actions applied",
        &["action", "status"]
    )
    .expect("metric can be registered");
}

/// Label for a result
pub fn status<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "error"
    }
}
