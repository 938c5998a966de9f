//! Request dispatcher state machine.
//!
//! # Responsibilities
//! - Route every request: primary hostname, cached failover hostname,
//!   pending queue, or a new failover probe
//! - Own the single outstanding probe (designated request + watcher)
//! - Classify exchange results and advance or finish the probe
//! - Drain queued requests in FIFO order when a probe ends
//! - Persist a failover hostname once a request succeeded through it
//! - Finish every request still owed a completion when the loop stops
//!
//! # State Transitions
//! ```text
//! NoProbe → ProbeOutstanding: disconnected-like request with FailoverState::Unknown
//! ProbeOutstanding → ProbeOutstanding: probe request failed, connect state unchanged
//!                                       (ask the resolver for the next hostname)
//! ProbeOutstanding → NoProbe: probe request finished, or resolver answered
//!                             SslError/Failed
//! ```
//!
//! # Design Decisions
//! - Synchronous: every method handles one event to completion
//! - Immediate failures are posted back to the event channel so completion
//!   always lands after `submit` returned
//! - Probe bookkeeping is cleared before any replay so re-routed requests
//!   never see a stale probe

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use arc_swap::ArcSwapOption;
use uuid::Uuid;

use crate::connect_state::{ConnectState, ConnectStateEvent, ConnectStateSource};
use crate::dispatcher::events::{
    AnswerSink, DeferredFinish, DispatcherEvent, EventSender, Exchange, ReplySink,
};
use crate::dispatcher::queue::PendingQueue;
use crate::dispatcher::watcher::ConnectStateWatcher;
use crate::failover::{ApiResolutionSettings, FailoverAnswer, FailoverResolver, FailoverState};
use crate::net::reachability::NetworkReachability;
use crate::net::transport::{NetworkRequest, Transport, TransportError};
use crate::observability::metrics;
use crate::request::{Request, RetCode, WeakRequest};
use crate::storage::PersistentHostnameStore;

/// Static settings of the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Hostname used while connected, and the default otherwise.
    pub primary_hostname: String,
    pub ignore_ssl_errors: bool,
    /// Log full response bodies.
    pub log_api_response: bool,
    pub dns_servers: Vec<std::net::IpAddr>,
}

/// External collaborators the dispatcher drives.
pub struct Collaborators {
    pub connect_state: Arc<dyn ConnectStateSource>,
    pub reachability: Arc<dyn NetworkReachability>,
    pub transport: Arc<dyn Transport>,
    pub resolver: Box<dyn FailoverResolver>,
    pub hostname_store: PersistentHostnameStore,
}

/// The probe currently outstanding.
struct ActiveProbe {
    request: WeakRequest,
    watcher: ConnectStateWatcher,
}

/// Routes API requests and runs the failover protocol.
pub struct RequestDispatcher {
    settings: DispatcherSettings,
    connect_state: Arc<dyn ConnectStateSource>,
    reachability: Arc<dyn NetworkReachability>,
    transport: Arc<dyn Transport>,
    resolver: Box<dyn FailoverResolver>,
    hostname_store: PersistentHostnameStore,
    events: EventSender,

    /// Exchanges handed to the transport and not yet answered.
    in_flight: HashMap<Uuid, WeakRequest>,
    ignore_ssl_errors: bool,
    failover_state: FailoverState,
    probe: Option<ActiveProbe>,
    pending: PendingQueue,
    failover_hostname: Option<String>,
    /// Failover hostname readable outside the event loop.
    published_hostname: Arc<ArcSwapOption<String>>,
    using_hostname_from_settings: bool,
    was_connected: bool,
    failover_failed_logged: bool,
}

impl RequestDispatcher {
    pub fn new(settings: DispatcherSettings, collaborators: Collaborators, events: EventSender) -> Self {
        let failover_hostname = collaborators.hostname_store.load();
        let using_hostname_from_settings = failover_hostname.is_some();
        if let Some(hostname) = &failover_hostname {
            tracing::info!(hostname = %hostname, "Loaded cached failover hostname");
        }

        let published_hostname = Arc::new(ArcSwapOption::from(failover_hostname.clone().map(Arc::new)));

        Self {
            ignore_ssl_errors: settings.ignore_ssl_errors,
            settings,
            connect_state: collaborators.connect_state,
            reachability: collaborators.reachability,
            transport: collaborators.transport,
            resolver: collaborators.resolver,
            hostname_store: collaborators.hostname_store,
            events,
            in_flight: HashMap::new(),
            failover_state: FailoverState::Unknown,
            probe: None,
            pending: PendingQueue::new(),
            failover_hostname,
            published_hostname,
            using_hostname_from_settings,
            was_connected: false,
            failover_failed_logged: false,
        }
    }

    /// Shared view of the cached failover hostname.
    pub fn published_hostname(&self) -> Arc<ArcSwapOption<String>> {
        self.published_hostname.clone()
    }

    pub fn failover_state(&self) -> FailoverState {
        self.failover_state
    }

    pub fn is_probe_outstanding(&self) -> bool {
        self.probe.is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn current_connect_state(&self) -> ConnectState {
        self.connect_state.current_state()
    }

    pub fn failover_hostname(&self) -> Option<&str> {
        self.failover_hostname.as_deref()
    }

    /// Process one event from the loop.
    pub fn handle_event(&mut self, event: DispatcherEvent) {
        match event {
            DispatcherEvent::Submit(request) => match request.upgrade() {
                Some(request) => self.execute_request(&request),
                None => tracing::trace!("Submitted request dropped before dispatch"),
            },
            DispatcherEvent::ExchangeFinished { exchange, result } => {
                self.on_exchange_finished(exchange, result)
            }
            DispatcherEvent::FailoverAnswer(answer) => self.on_failover_answer(answer),
            DispatcherEvent::FinishDeferred { request, reason } => {
                self.finish_deferred(request, reason)
            }
            DispatcherEvent::SetIgnoreSslErrors(ignore) => {
                tracing::debug!(ignore, "Ignore SSL errors updated");
                self.ignore_ssl_errors = ignore;
            }
            DispatcherEvent::SetApiResolutionSettings(settings) => {
                self.set_api_resolution_settings(settings)
            }
        }
    }

    /// Final step once the loop stops. Every request still owed a completion
    /// finishes with `NetworkError`: queued ones, the designated request, those
    /// with an exchange in flight, and those in `leftover` (events received
    /// but never processed).
    pub fn shutdown(&mut self, leftover: Vec<DispatcherEvent>) {
        let mut owed: Vec<WeakRequest> = Vec::new();
        for event in leftover {
            match event {
                DispatcherEvent::Submit(request) => owed.push(request),
                DispatcherEvent::FinishDeferred { request, reason } => self.finish_deferred(request, reason),
                DispatcherEvent::FailoverAnswer(answer) => {
                    tracing::debug!(answer = answer.label(), "Dropping failover answer at shutdown");
                }
                // Unanswered exchanges are still in `in_flight`.
                DispatcherEvent::ExchangeFinished { .. }
                | DispatcherEvent::SetIgnoreSslErrors(_)
                | DispatcherEvent::SetApiResolutionSettings(_) => {}
            }
        }
        owed.extend(self.in_flight.drain().map(|(_, request)| request));
        if let Some(probe) = self.probe.take() {
            owed.push(probe.request);
        }
        owed.extend(self.pending.take_all());

        let mut settled: Vec<WeakRequest> = Vec::with_capacity(owed.len());
        for request in owed {
            if settled.iter().any(|done| Weak::ptr_eq(done, &request)) {
                continue;
            }
            if let Some(live) = request.upgrade() {
                self.finish_with_error(&live, RetCode::NetworkError, "Dispatcher stopped");
            }
            settled.push(request);
        }
        if !settled.is_empty() {
            tracing::info!(requests = settled.len(), "Finished outstanding requests at shutdown");
        }
    }

    /// Forward resolution settings to the resolver; they only matter while disconnected.
    pub fn set_api_resolution_settings(&mut self, settings: ApiResolutionSettings) {
        tracing::debug!(automatic = settings.automatic, "Set API resolution settings");
        self.resolver.set_api_resolution_settings(settings);
    }

    /// A hostname loaded from storage is dropped after the first
    /// connected → disconnected cycle following startup.
    pub fn on_connect_state_changed(&mut self, event: &ConnectStateEvent) {
        if !self.using_hostname_from_settings {
            return;
        }
        match event.state {
            ConnectState::Connected => self.was_connected = true,
            ConnectState::Disconnected if self.was_connected => {
                tracing::info!("Disconnected after using cached failover hostname, forgetting it");
                self.set_failover_hostname(None);
                self.using_hostname_from_settings = false;
            }
            _ => {}
        }
    }

    /// Route a request: send it, queue it, start a probe, or finish it.
    pub fn execute_request(&mut self, request: &Arc<dyn Request>) {
        if !self.reachability.is_online() {
            self.post_deferred(request, DeferredFinish::NoNetworkConnection);
            return;
        }

        if self.probe.is_some() {
            tracing::trace!(request = %request.name(), queued = self.pending.len() + 1, "Failover in progress, queueing request");
            self.pending.enqueue(Arc::downgrade(request));
            return;
        }

        let (hostname, through_failover) = if !self.is_disconnected_state() {
            (self.settings.primary_hostname.clone(), false)
        } else {
            match self.failover_state {
                FailoverState::Unknown => {
                    self.set_current_failover_request(request);
                    match &self.failover_hostname {
                        Some(hostname) => (hostname.clone(), true),
                        None => {
                            self.request_next_hostname();
                            return;
                        }
                    }
                }
                FailoverState::Failed => {
                    self.post_deferred(request, DeferredFinish::FailoverFailed);
                    return;
                }
                FailoverState::Ready => (self.hostname(), true),
            }
        };

        self.start_exchange(request, hostname, through_failover);
    }

    /// Hostname a request would be sent to right now.
    pub fn hostname(&self) -> String {
        match &self.failover_hostname {
            Some(hostname) if self.is_disconnected_state() => hostname.clone(),
            _ => self.settings.primary_hostname.clone(),
        }
    }

    fn start_exchange(&mut self, request: &Arc<dyn Request>, hostname: String, through_failover: bool) {
        let id = Uuid::new_v4();
        let exchange = Exchange {
            id,
            request: Arc::downgrade(request),
            hostname: hostname.clone(),
            through_failover,
        };
        self.in_flight.insert(id, Arc::downgrade(request));
        let reply = ReplySink::new(exchange, self.events.clone());

        let url = match request.url(&hostname) {
            Ok(url) => url,
            Err(e) => {
                reply.finish(Err(TransportError::InvalidUrl(format!("{}: {}", hostname, e))));
                return;
            }
        };

        tracing::debug!(
            exchange = %id,
            request = %request.name(),
            method = %request.request_type(),
            hostname = %hostname,
            through_failover,
            "Sending API request"
        );

        let network_request = NetworkRequest {
            method: request.request_type(),
            url,
            timeout: request.timeout(),
            body: if request.request_type().has_body() { request.body() } else { None },
            content_type: request.content_type().map(str::to_string),
            ignore_ssl_errors: self.ignore_ssl_errors,
            dns_servers: self.settings.dns_servers.clone(),
        };
        self.transport.execute(network_request, reply);
    }

    fn on_exchange_finished(&mut self, exchange: Exchange, result: Result<Vec<u8>, TransportError>) {
        self.in_flight.remove(&exchange.id);
        match &result {
            Ok(body) => tracing::trace!(exchange = %exchange.id, bytes = body.len(), "Exchange completed"),
            Err(e) => tracing::debug!(exchange = %exchange.id, hostname = %exchange.hostname, error = %e, "Exchange failed"),
        }
        let is_probe = self.is_current_failover_request(&exchange.request);

        let Some(request) = exchange.request.upgrade() else {
            if is_probe {
                self.on_dropped_probe_request_finished(&exchange, &result);
            }
            self.execute_waiting_in_queue_requests();
            return;
        };

        match result {
            Err(e) if e.is_ssl() && !self.ignore_ssl_errors => {
                self.finish_with_error(&request, RetCode::SslError, &e.to_string());
                if is_probe {
                    debug_assert!(exchange.through_failover);
                    self.clear_current_failover_request();
                    self.execute_waiting_in_queue_requests();
                }
            }
            Err(e) => {
                if is_probe {
                    debug_assert!(exchange.through_failover);
                    self.retry_or_escalate_probe(&request, &e.to_string());
                } else {
                    self.finish_with_error(&request, RetCode::NetworkError, &e.to_string());
                }
            }
            Ok(body) => {
                if self.settings.log_api_response {
                    tracing::debug!(request = %request.name(), response = %String::from_utf8_lossy(&body), "API response");
                }
                request.handle(&body);

                if is_probe && request.ret_code() == RetCode::IncorrectJson {
                    self.retry_or_escalate_probe(&request, "incorrect response payload");
                    return;
                }

                metrics::record_request_finished(request.name(), request.ret_code());
                request.notify_finished();

                if is_probe {
                    debug_assert!(exchange.through_failover);
                    if !self.probe_connect_state_changed() && !self.using_hostname_from_settings {
                        self.mark_failover_ready(&exchange.hostname);
                    }
                    self.clear_current_failover_request();
                    self.execute_waiting_in_queue_requests();
                }
            }
        }
    }

    /// The probe request was dropped by its owner before its exchange ended.
    /// The probe still ends; a successful exchange still proves the hostname.
    fn on_dropped_probe_request_finished(&mut self, exchange: &Exchange, result: &Result<Vec<u8>, TransportError>) {
        tracing::debug!(exchange = %exchange.id, hostname = %exchange.hostname, "Failover request dropped by its owner, ending probe");
        if result.is_ok() && !self.probe_connect_state_changed() && !self.using_hostname_from_settings {
            self.mark_failover_ready(&exchange.hostname);
        }
        self.clear_current_failover_request();
    }

    fn on_failover_answer(&mut self, answer: FailoverAnswer) {
        if self.probe.is_none() {
            tracing::warn!(answer = answer.label(), "Failover answer without an outstanding probe, ignoring");
            return;
        }
        metrics::record_failover_answer(answer.label());
        self.using_hostname_from_settings = false;

        match answer {
            FailoverAnswer::Success(hostname) => {
                tracing::info!(hostname = %hostname, "Failover resolver returned a hostname");
                self.set_failover_hostname(Some(hostname));
                self.replay_probe_request();
            }
            FailoverAnswer::ConnectStateChanged => {
                tracing::info!("Connect state changed during failover, retrying request");
                self.replay_probe_request();
            }
            FailoverAnswer::SslError => {
                if let Some(request) = self.clear_current_failover_request() {
                    self.finish_with_error(&request, RetCode::SslError, "Failover return Ssl error");
                }
                self.finish_waiting_in_queue_requests(RetCode::SslError, "Failover return Ssl error");
            }
            FailoverAnswer::Failed => {
                tracing::warn!("Failover failed, API is not reachable while disconnected");
                self.failover_state = FailoverState::Failed;
                if let Some(request) = self.clear_current_failover_request() {
                    self.finish_with_error(&request, RetCode::FailoverFailed, "Failover API not ready");
                }
                self.finish_waiting_in_queue_requests(RetCode::FailoverFailed, "Failover API not ready");
            }
        }
    }

    /// The designated request goes first, then the queue in FIFO order. The
    /// queue is emptied before the designated request is re-routed, so a new
    /// probe never starts with requests still queued.
    fn replay_probe_request(&mut self) {
        let queued = self.pending.take_all();
        match self.clear_current_failover_request() {
            Some(request) => self.execute_request(&request),
            None => tracing::debug!("Failover request dropped by its owner before replay"),
        }
        self.reroute(queued);
    }

    fn retry_or_escalate_probe(&mut self, request: &Arc<dyn Request>, error: &str) {
        if !self.probe_connect_state_changed() {
            tracing::debug!(request = %request.name(), error = %error, "Failover hostname did not work, trying next");
            self.request_next_hostname();
        } else {
            self.finish_with_error(request, RetCode::NetworkError, error);
            self.clear_current_failover_request();
            self.execute_waiting_in_queue_requests();
        }
    }

    fn request_next_hostname(&mut self) {
        metrics::record_failover_probe();
        let answer = AnswerSink::new(self.events.clone());
        self.resolver.get_next_hostname(self.ignore_ssl_errors, answer);
    }

    fn mark_failover_ready(&mut self, hostname: &str) {
        tracing::info!(hostname = %hostname, "Failover hostname confirmed, saving it");
        self.failover_state = FailoverState::Ready;
        self.hostname_store.save(hostname);
        metrics::record_hostname_persisted();
    }

    fn execute_waiting_in_queue_requests(&mut self) {
        let queued = self.pending.take_all();
        self.reroute(queued);
    }

    fn reroute(&mut self, queued: VecDeque<WeakRequest>) {
        for request in queued {
            if let Some(request) = request.upgrade() {
                self.execute_request(&request);
            }
        }
    }

    fn finish_waiting_in_queue_requests(&mut self, code: RetCode, error: &str) {
        let queued = self.pending.take_all();
        for request in queued {
            if let Some(request) = request.upgrade() {
                self.finish_with_error(&request, code, error);
            }
        }
    }

    fn finish_with_error(&self, request: &Arc<dyn Request>, code: RetCode, error: &str) {
        request.set_ret_code(code);
        if request.is_write_to_log() {
            tracing::debug!(request = %request.name(), code = %code, error = %error, "API request failed");
        }
        metrics::record_request_finished(request.name(), code);
        request.notify_finished();
    }

    fn post_deferred(&self, request: &Arc<dyn Request>, reason: DeferredFinish) {
        let event = DispatcherEvent::FinishDeferred {
            request: Arc::downgrade(request),
            reason,
        };
        if self.events.send(event).is_err() {
            tracing::error!(request = %request.name(), "Dispatcher event channel closed");
        }
    }

    fn finish_deferred(&mut self, request: WeakRequest, reason: DeferredFinish) {
        let Some(request) = request.upgrade() else {
            return;
        };
        let code = match reason {
            DeferredFinish::NoNetworkConnection => {
                tracing::debug!(request = %request.name(), "API request failed: no network connection");
                RetCode::NoNetworkConnection
            }
            DeferredFinish::FailoverFailed => {
                if !self.failover_failed_logged {
                    tracing::debug!(request = %request.name(), "API request failed: API not ready");
                    self.failover_failed_logged = true;
                }
                RetCode::FailoverFailed
            }
        };
        request.set_ret_code(code);
        metrics::record_request_finished(request.name(), code);
        request.notify_finished();
    }

    fn set_current_failover_request(&mut self, request: &Arc<dyn Request>) {
        debug_assert!(self.probe.is_none());
        debug_assert!(self.pending.is_empty(), "requests queued before a new failover request");
        self.probe = Some(ActiveProbe {
            request: Arc::downgrade(request),
            watcher: ConnectStateWatcher::new(self.connect_state.as_ref()),
        });
    }

    /// End the outstanding probe, returning its designated request if still alive.
    fn clear_current_failover_request(&mut self) -> Option<Arc<dyn Request>> {
        debug_assert!(self.probe.is_some(), "no outstanding failover probe");
        self.probe.take().and_then(|probe| probe.request.upgrade())
    }

    fn is_current_failover_request(&self, request: &WeakRequest) -> bool {
        self.probe
            .as_ref()
            .is_some_and(|probe| Weak::ptr_eq(&probe.request, request))
    }

    fn probe_connect_state_changed(&mut self) -> bool {
        self.probe
            .as_mut()
            .is_some_and(|probe| probe.watcher.is_vpn_connect_state_changed())
    }

    fn is_disconnected_state(&self) -> bool {
        self.current_connect_state().is_disconnected_like()
    }

    fn set_failover_hostname(&mut self, hostname: Option<String>) {
        self.published_hostname.store(hostname.clone().map(Arc::new));
        self.failover_hostname = hostname;
    }
}
