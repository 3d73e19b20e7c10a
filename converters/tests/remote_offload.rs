//! Remote offload against a live exchange on loopback

use data_exchange::{
    server, Authentication, Backend, ClientAuthentication, ClientConfig, DataExchange,
    DataExchangeClient, InMemoryBackend,
};
use payload_converters::{
    Converter, Encoder, ErrorSink, RemoteOffload, RemoteOffloadEncoder, Value,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn spawn_exchange() -> (DataExchangeClient, Arc<InMemoryBackend>) {
    let backend = Arc::new(InMemoryBackend::new());
    let exchange = Arc::new(DataExchange::new(backend.clone(), Authentication::None));
    let app = server::router(exchange, 16 * 1024 * 1024);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(server::serve(listener, app, std::future::pending()));

    let mut config = ClientConfig::new(url);
    config.auth = ClientAuthentication::None;
    (DataExchangeClient::new(&config).unwrap(), backend)
}

fn pair(client: &DataExchangeClient, remove: bool) -> (Encoder, Converter) {
    (
        Encoder::RemoteOffload(RemoteOffloadEncoder::new(client.clone(), Encoder::Binary)),
        Converter::RemoteOffload(RemoteOffload::new(client.clone(), remove, Converter::Binary)),
    )
}

#[tokio::test]
async fn test_transparent_roundtrip() {
    let (client, backend) = spawn_exchange().await;
    let (encoder, converter) = pair(&client, true);

    let value = Value::List((0..1000).map(Value::Int).collect());

    let mut errors = ErrorSink::new();
    let token = encoder.encode(Some(&value), &mut errors).await.unwrap();
    assert_eq!(backend.len(), 1);

    let received = converter.convert(Some(token.as_slice()), &mut errors).await;

    assert_eq!(received, Some(value));
    assert!(errors.is_empty());
    assert_eq!(backend.len(), 0);
}

#[tokio::test]
async fn test_token_kept_without_removal() {
    let (client, backend) = spawn_exchange().await;
    let (encoder, converter) = pair(&client, false);

    let mut errors = ErrorSink::new();
    let token = encoder
        .encode(Some(&Value::from("kept")), &mut errors)
        .await
        .unwrap();

    converter.convert(Some(token.as_slice()), &mut errors).await.unwrap();
    assert_eq!(backend.len(), 1);

    // still retrievable a second time
    let again = converter.convert(Some(token.as_slice()), &mut errors).await;
    assert_eq!(again, Some(Value::from("kept")));
}

#[tokio::test]
async fn test_unknown_token() {
    let (client, _backend) = spawn_exchange().await;
    let (_, converter) = pair(&client, true);

    let mut errors = ErrorSink::new();
    let result = converter.convert(Some(&b"no-such-token"[..]), &mut errors).await;

    assert!(result.is_none());
    assert!(errors.errors()[0].contains("no-such-token"));
}

#[tokio::test]
async fn test_base_failure_keeps_token() {
    let (client, backend) = spawn_exchange().await;
    let token = client.upload(vec![0xff, 0xfe]).await.unwrap();

    let converter = Converter::RemoteOffload(RemoteOffload::new(client, true, Converter::Text));
    let mut errors = ErrorSink::new();
    let result = converter.convert(Some(token.as_bytes()), &mut errors).await;

    assert!(result.is_none());
    assert!(!errors.is_empty());
    assert_eq!(backend.len(), 1);
}

#[tokio::test]
async fn test_remove_failure_keeps_value() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/download"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/remove"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(serde_json::json!({"error": "backend down"})),
        )
        .mount(&server)
        .await;

    let client = DataExchangeClient::new(&ClientConfig::new(server.uri())).unwrap();
    let converter = Converter::RemoteOffload(RemoteOffload::new(client, true, Converter::Text));

    let mut errors = ErrorSink::new();
    let result = converter.convert(Some(&b"tok"[..]), &mut errors).await;

    assert_eq!(result, Some(Value::from("payload")));
    assert!(errors.is_empty());
    assert_eq!(errors.cleanup_errors().len(), 1);
    assert!(errors.cleanup_errors()[0].contains("backend down"));
}
