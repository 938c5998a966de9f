//! `ReqwestTransport` against local mock backends.

use std::time::Duration;
use url::Url;
use uuid::Uuid;

use server_api::dispatcher::events::{event_channel, DispatcherEvent, Exchange, ReplySink};
use server_api::net::{NetworkRequest, ReqwestTransport, Transport, TransportError};
use server_api::request::{ApiRequest, JsonPayload, RequestType, WeakRequest};

mod common;

fn network_request(method: RequestType, url: &str, timeout: Duration) -> NetworkRequest {
    NetworkRequest {
        method,
        url: Url::parse(url).unwrap(),
        timeout,
        body: None,
        content_type: None,
        ignore_ssl_errors: false,
        dns_servers: Vec::new(),
    }
}

fn exchange() -> Exchange {
    let weak: WeakRequest =
        std::sync::Weak::<ApiRequest<JsonPayload<serde_json::Value>>>::new();
    Exchange {
        id: Uuid::new_v4(),
        request: weak,
        hostname: "test".into(),
        through_failover: false,
    }
}

async fn run(request: NetworkRequest) -> Result<Vec<u8>, TransportError> {
    let transport = ReqwestTransport::new("server-api-tests").unwrap();
    let (tx, mut rx) = event_channel();
    transport.execute(request, ReplySink::new(exchange(), tx));

    match common::finished(rx.recv()).await {
        Some(DispatcherEvent::ExchangeFinished { result, .. }) => result,
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_success_body() {
    let addr = common::start_mock_backend("127.0.0.1:0".parse().unwrap(), r#"{"ok":true}"#).await;
    let body = run(network_request(
        RequestType::Get,
        &format!("http://{}/status", addr),
        Duration::from_secs(2),
    ))
    .await
    .unwrap();
    assert_eq!(body, br#"{"ok":true}"#);
}

#[tokio::test]
async fn test_post_with_body() {
    let addr = common::start_mock_backend("127.0.0.1:0".parse().unwrap(), "{}").await;
    let mut request = network_request(
        RequestType::Post,
        &format!("http://{}/session", addr),
        Duration::from_secs(2),
    );
    request.body = Some(br#"{"user":"a"}"#.to_vec());
    request.content_type = Some("application/json".into());

    assert_eq!(run(request).await.unwrap(), b"{}");
}

#[tokio::test]
async fn test_error_status_is_completed_exchange() {
    let addr = common::start_programmable_backend("127.0.0.1:0".parse().unwrap(), || async {
        (503, r#"{"errorCode":503}"#.to_string())
    })
    .await;

    let body = run(network_request(
        RequestType::Get,
        &format!("http://{}/", addr),
        Duration::from_secs(2),
    ))
    .await
    .unwrap();
    assert_eq!(body, br#"{"errorCode":503}"#);
}

#[tokio::test]
async fn test_connection_refused() {
    let addr = common::closed_addr().await;
    let err = run(network_request(
        RequestType::Get,
        &format!("http://{}/", addr),
        Duration::from_secs(2),
    ))
    .await
    .unwrap_err();
    assert!(matches!(err, TransportError::Connect(_)), "got {:?}", err);
    assert!(!err.is_ssl());
}

#[tokio::test]
async fn test_timeout() {
    let addr = common::start_programmable_backend("127.0.0.1:0".parse().unwrap(), || async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        (200, "{}".to_string())
    })
    .await;

    let err = run(network_request(
        RequestType::Get,
        &format!("http://{}/slow", addr),
        Duration::from_millis(200),
    ))
    .await
    .unwrap_err();
    assert_eq!(err, TransportError::Timeout(Duration::from_millis(200)));
}

#[tokio::test]
async fn test_tls_handshake_failure() {
    // Plain HTTP server answering an https URL fails the handshake.
    let addr = common::start_mock_backend("127.0.0.1:0".parse().unwrap(), "{}").await;
    let err = run(network_request(
        RequestType::Get,
        &format!("https://{}/", addr),
        Duration::from_secs(2),
    ))
    .await
    .unwrap_err();
    assert!(err.is_ssl(), "got {:?}", err);
}
