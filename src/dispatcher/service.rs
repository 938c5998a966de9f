//! Public handle over the running dispatcher.
//!
//! # Responsibilities
//! - Spawn the dispatcher task and wire its collaborators from config
//! - Submit caller-owned requests without blocking
//! - Build typed JSON requests against the configured scheme and timeout
//! - Forward runtime settings (ignore SSL errors, resolution settings)

use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;
use arc_swap::ArcSwapOption;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::{RecvError, TryRecvError}};
use tokio::task::JoinHandle;

use crate::config::ApiConfig;
use crate::connect_state::{ConnectStateEvent, ConnectStateSource};
use crate::dispatcher::engine::{Collaborators, DispatcherSettings, RequestDispatcher};
use crate::dispatcher::events::{event_channel, DispatcherEvent, EventReceiver, EventSender};
use crate::failover::{ApiResolutionSettings, FailoverResolver, HostnameListResolver};
use crate::lifecycle::Shutdown;
use crate::net::{NetworkReachability, ReqwestTransport};
use crate::request::{ApiRequest, JsonPayload, Request, RequestType, RetCode, WeakRequest};
use crate::storage::{FileStore, KeyValueStore, MemoryStore, PersistentHostnameStore, StorageError};

/// Errors raised while wiring the service from config.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Failed to build HTTP client: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to open store: {0}")]
    Storage(#[from] StorageError),
}

/// Cloneable handle used by every API caller.
#[derive(Clone)]
pub struct ServerApi {
    events: EventSender,
    failover_hostname: Arc<ArcSwapOption<String>>,
    connect_state: Arc<dyn ConnectStateSource>,
    primary_hostname: String,
    scheme: String,
    default_timeout: Duration,
}

impl ServerApi {
    /// Spawn the dispatcher task with the given collaborators.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        config: &ApiConfig,
        collaborators: Collaborators,
        shutdown: &Shutdown,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = event_channel();
        let connect_state = collaborators.connect_state.clone();
        // Subscribe before the dispatcher reads the initial state.
        let connect_events = connect_state.subscribe();

        let settings = DispatcherSettings {
            primary_hostname: config.api.primary_hostname.clone(),
            ignore_ssl_errors: config.api.ignore_ssl_errors,
            log_api_response: config.api.log_api_response,
            dns_servers: config.transport.dns_servers.clone(),
        };
        let dispatcher = RequestDispatcher::new(settings, collaborators, tx.clone());
        let failover_hostname = dispatcher.published_hostname();

        let task = DispatcherTask {
            dispatcher,
            events: rx,
            connect_events,
            shutdown: shutdown.subscribe(),
        };
        let handle = tokio::spawn(task.run());

        tracing::info!(
            primary_hostname = %config.api.primary_hostname,
            failover_hostnames = config.failover.hostnames.len(),
            "Server API started"
        );

        let api = Self {
            events: tx,
            failover_hostname,
            connect_state,
            primary_hostname: config.api.primary_hostname.clone(),
            scheme: config.api.scheme.clone(),
            default_timeout: config.api.default_timeout(),
        };
        (api, handle)
    }

    /// Build the concrete collaborators from config and spawn the dispatcher.
    pub fn from_config(
        config: &ApiConfig,
        connect_state: Arc<dyn ConnectStateSource>,
        reachability: Arc<dyn NetworkReachability>,
        shutdown: &Shutdown,
    ) -> Result<(Self, JoinHandle<()>), ServiceError> {
        let transport = ReqwestTransport::new(&config.transport.user_agent)?;

        let store: Arc<dyn KeyValueStore> = if config.storage.path.is_empty() {
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(FileStore::open(Path::new(&config.storage.path), &config.storage.secret)?)
        };

        let mut resolver = HostnameListResolver::new(config.failover.hostnames.clone(), connect_state.clone());
        resolver.set_api_resolution_settings(config.failover.resolution.clone());

        let collaborators = Collaborators {
            connect_state,
            reachability,
            transport: Arc::new(transport),
            resolver: Box::new(resolver),
            hostname_store: PersistentHostnameStore::new(store),
        };
        Ok(Self::spawn(config, collaborators, shutdown))
    }

    /// Hand a request to the dispatcher. Never blocks; the request's
    /// completion fires later, unless the caller drops it first.
    pub fn submit<R: Request + 'static>(&self, request: &Arc<R>) {
        let weak: Weak<R> = Arc::downgrade(request);
        let weak: WeakRequest = weak;
        if self.events.send(DispatcherEvent::Submit(weak)).is_err() {
            tracing::error!(request = %request.name(), "Dispatcher stopped, failing request");
            request.set_ret_code(RetCode::NetworkError);
            request.notify_finished();
        }
    }

    /// Build a JSON request with the configured scheme and timeout, and submit it.
    pub fn json_request<T>(&self, payload: JsonPayload<T>) -> Arc<ApiRequest<JsonPayload<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let request = Arc::new(ApiRequest::new(
            payload.with_scheme(self.scheme.clone()),
            self.default_timeout,
        ));
        self.submit(&request);
        request
    }

    pub fn json_get<T>(&self, name: &str, path: &str, query: &[(&str, &str)]) -> Arc<ApiRequest<JsonPayload<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let payload = query
            .iter()
            .fold(JsonPayload::new(name, RequestType::Get, path), |p, (k, v)| p.with_query(*k, *v));
        self.json_request(payload)
    }

    pub fn json_post<T>(&self, name: &str, path: &str, body: serde_json::Value) -> Arc<ApiRequest<JsonPayload<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.json_request(JsonPayload::new(name, RequestType::Post, path).with_body(body))
    }

    pub fn json_put<T>(&self, name: &str, path: &str, body: serde_json::Value) -> Arc<ApiRequest<JsonPayload<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.json_request(JsonPayload::new(name, RequestType::Put, path).with_body(body))
    }

    pub fn json_delete<T>(&self, name: &str, path: &str) -> Arc<ApiRequest<JsonPayload<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.json_request(JsonPayload::new(name, RequestType::Delete, path))
    }

    pub fn set_ignore_ssl_errors(&self, ignore: bool) {
        self.send(DispatcherEvent::SetIgnoreSslErrors(ignore));
    }

    /// Only used while disconnected.
    pub fn set_api_resolution_settings(&self, settings: ApiResolutionSettings) {
        self.send(DispatcherEvent::SetApiResolutionSettings(settings));
    }

    /// Hostname requests currently go to.
    pub fn hostname(&self) -> String {
        if self.connect_state.current_state().is_disconnected_like() {
            if let Some(hostname) = self.failover_hostname.load_full() {
                return hostname.as_ref().clone();
            }
        }
        self.primary_hostname.clone()
    }

    fn send(&self, event: DispatcherEvent) {
        if self.events.send(event).is_err() {
            tracing::warn!("Dispatcher stopped, dropping settings update");
        }
    }
}

/// Event loop owning the dispatcher.
struct DispatcherTask {
    dispatcher: RequestDispatcher,
    events: EventReceiver,
    connect_events: broadcast::Receiver<ConnectStateEvent>,
    shutdown: broadcast::Receiver<()>,
}

impl DispatcherTask {
    async fn run(mut self) {
        let mut connect_open = true;

        loop {
            // Connect-state transitions are applied before any event queued
            // after them, so a request never routes on a stale hostname.
            tokio::select! {
                biased;

                _ = self.shutdown.recv() => {
                    tracing::info!(
                        pending = self.dispatcher.pending_len(),
                        in_flight = self.dispatcher.in_flight_len(),
                        "Dispatcher shutting down"
                    );
                    break;
                }
                result = self.connect_events.recv(), if connect_open => {
                    connect_open = self.on_connect_event(result);
                }
                event = self.events.recv() => match event {
                    Some(event) => {
                        if connect_open {
                            connect_open = self.sync_connect_state();
                        }
                        self.dispatcher.handle_event(event);
                    }
                    None => break,
                },
            }
        }

        // Refuse new events, then settle everything already queued.
        self.events.close();
        let mut leftover = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            leftover.push(event);
        }
        self.dispatcher.shutdown(leftover);
    }

    /// Apply connect-state events already broadcast. Returns false once the
    /// stream is closed.
    fn sync_connect_state(&mut self) -> bool {
        loop {
            let result = match self.connect_events.try_recv() {
                Ok(event) => Ok(event),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Lagged(missed)) => Err(RecvError::Lagged(missed)),
                Err(TryRecvError::Closed) => Err(RecvError::Closed),
            };
            if !self.on_connect_event(result) {
                return false;
            }
        }
    }

    fn on_connect_event(&mut self, result: Result<ConnectStateEvent, RecvError>) -> bool {
        match result {
            Ok(event) => {
                tracing::debug!(state = ?event.state, "Connect state changed");
                self.dispatcher.on_connect_state_changed(&event);
                true
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Connect state stream lagged, resyncing");
                let state = self.dispatcher.current_connect_state();
                self.dispatcher.on_connect_state_changed(&ConnectStateEvent::new(state));
                true
            }
            Err(RecvError::Closed) => {
                tracing::debug!("Connect state stream closed");
                false
            }
        }
    }
}
