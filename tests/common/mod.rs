//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use server_api::config::ApiConfig;
use server_api::connect_state::ConnectStateSource;
use server_api::dispatcher::{AnswerSink, Collaborators};
use server_api::failover::{ApiResolutionSettings, FailoverAnswer, FailoverResolver};
use server_api::net::{NetworkDetector, ReqwestTransport};
use server_api::storage::{MemoryStore, PersistentHostnameStore};

/// Start a simple mock backend that returns a fixed response.
///
/// Pass port 0 to bind an ephemeral port; the bound address is returned.
pub async fn start_mock_backend(addr: SocketAddr, response: &'static str) -> SocketAddr {
    start_programmable_backend(addr, move || async move { (200, response.to_string()) }).await
}

/// Start a programmable mock backend with async support.
pub async fn start_programmable_backend<F, Fut>(addr: SocketAddr, f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let local = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    local
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Config pointing at local plain-HTTP backends.
pub fn test_config(primary: SocketAddr) -> ApiConfig {
    let mut config = ApiConfig::default();
    config.api.primary_hostname = primary.to_string();
    config.api.scheme = "http".to_string();
    config.api.default_timeout_ms = 2_000;
    config
}

/// Resolver answering from a fixed script, then `Failed`.
#[derive(Clone, Default)]
pub struct ScriptedResolver {
    answers: Arc<Mutex<VecDeque<FailoverAnswer>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedResolver {
    pub fn new(answers: Vec<FailoverAnswer>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(answers.into())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FailoverResolver for ScriptedResolver {
    fn get_next_hostname(&mut self, _ignore_ssl_errors: bool, answer: AnswerSink) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(FailoverAnswer::Failed);
        answer.send(next);
    }

    fn set_api_resolution_settings(&mut self, _settings: ApiResolutionSettings) {}
}

/// Resolver that never answers; discovery stays outstanding.
#[derive(Clone, Default)]
pub struct ParkedResolver {
    parked: Arc<Mutex<Vec<AnswerSink>>>,
}

impl ParkedResolver {
    pub fn parked(&self) -> usize {
        self.parked.lock().unwrap().len()
    }
}

impl FailoverResolver for ParkedResolver {
    fn get_next_hostname(&mut self, _ignore_ssl_errors: bool, answer: AnswerSink) {
        self.parked.lock().unwrap().push(answer);
    }

    fn set_api_resolution_settings(&mut self, _settings: ApiResolutionSettings) {}
}

/// Collaborators with the real HTTP transport.
pub fn collaborators(
    connect_state: Arc<dyn ConnectStateSource>,
    resolver: Box<dyn FailoverResolver>,
    store: MemoryStore,
) -> Collaborators {
    Collaborators {
        connect_state,
        reachability: Arc::new(NetworkDetector::default()),
        transport: Arc::new(ReqwestTransport::new("server-api-tests").unwrap()),
        resolver,
        hostname_store: PersistentHostnameStore::new(Arc::new(store)),
    }
}

/// Wait for a request with a deadline.
pub async fn finished<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(10), fut)
        .await
        .expect("request did not finish in time")
}
