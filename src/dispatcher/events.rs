//! Events processed by the dispatcher, and the sinks collaborators answer through.

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::failover::{ApiResolutionSettings, FailoverAnswer};
use crate::net::transport::TransportError;
use crate::request::WeakRequest;

pub type EventSender = mpsc::UnboundedSender<DispatcherEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<DispatcherEvent>;

/// Create the dispatcher's event channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Why a request is finished without a network exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredFinish {
    NoNetworkConnection,
    FailoverFailed,
}

/// Tag carried by an in-flight exchange.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// Correlates send, completion and failure logs.
    pub id: Uuid,
    pub request: WeakRequest,
    pub hostname: String,
    /// Routed through failover (disconnected-like) rather than the primary hostname.
    pub through_failover: bool,
}

/// One unit of work for the dispatcher event loop.
#[derive(Debug)]
pub enum DispatcherEvent {
    Submit(WeakRequest),
    ExchangeFinished {
        exchange: Exchange,
        result: Result<Vec<u8>, TransportError>,
    },
    FailoverAnswer(FailoverAnswer),
    /// Completion posted to the next turn of the loop.
    FinishDeferred {
        request: WeakRequest,
        reason: DeferredFinish,
    },
    SetIgnoreSslErrors(bool),
    SetApiResolutionSettings(ApiResolutionSettings),
}

/// Reply handle given to the transport for one exchange.
///
/// Dropping it without calling `finish` reports a transport failure.
#[derive(Debug)]
pub struct ReplySink {
    exchange: Option<Exchange>,
    events: EventSender,
}

impl ReplySink {
    pub fn new(exchange: Exchange, events: EventSender) -> Self {
        Self {
            exchange: Some(exchange),
            events,
        }
    }

    pub fn finish(mut self, result: Result<Vec<u8>, TransportError>) {
        self.deliver(result);
    }

    fn deliver(&mut self, result: Result<Vec<u8>, TransportError>) {
        if let Some(exchange) = self.exchange.take() {
            let id = exchange.id;
            if self
                .events
                .send(DispatcherEvent::ExchangeFinished { exchange, result })
                .is_err()
            {
                tracing::debug!(exchange = %id, "Dispatcher stopped, dropping exchange result");
            }
        }
    }
}

impl Drop for ReplySink {
    fn drop(&mut self) {
        if self.exchange.is_some() {
            self.deliver(Err(TransportError::Other(
                "exchange dropped without a reply".to_string(),
            )));
        }
    }
}

/// Answer handle given to the failover resolver for one discovery attempt.
///
/// Dropping it without calling `send` answers `Failed`.
#[derive(Debug)]
pub struct AnswerSink {
    events: Option<EventSender>,
}

impl AnswerSink {
    pub fn new(events: EventSender) -> Self {
        Self {
            events: Some(events),
        }
    }

    pub fn send(mut self, answer: FailoverAnswer) {
        self.deliver(answer);
    }

    fn deliver(&mut self, answer: FailoverAnswer) {
        if let Some(events) = self.events.take() {
            if events.send(DispatcherEvent::FailoverAnswer(answer)).is_err() {
                tracing::debug!("Dispatcher stopped, dropping failover answer");
            }
        }
    }
}

impl Drop for AnswerSink {
    fn drop(&mut self) {
        if self.events.is_some() {
            tracing::warn!("Failover resolver dropped its answer, treating as failed");
            self.deliver(FailoverAnswer::Failed);
        }
    }
}
