//! Connect-state holder driven by the VPN engine.

use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::broadcast;

use crate::connect_state::{ConnectState, ConnectStateEvent, ConnectStateSource};

const EVENT_CAPACITY: usize = 64;

/// Current VPN state plus a broadcast stream of transitions.
#[derive(Debug)]
pub struct ConnectStateController {
    state: AtomicU8,
    tx: broadcast::Sender<ConnectStateEvent>,
}

impl ConnectStateController {
    pub fn new(initial: ConnectState) -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: AtomicU8::new(initial as u8),
            tx,
        }
    }

    /// Record a new state and notify subscribers.
    pub fn set_state(&self, event: ConnectStateEvent) {
        let prev = ConnectState::from(self.state.swap(event.state as u8, Ordering::SeqCst));
        tracing::debug!(from = ?prev, to = ?event.state, reason = ?event.reason, "Connect state changed");
        // No subscribers is fine, nobody is waiting on the stream yet.
        let _ = self.tx.send(event);
    }

    /// Shorthand for `set_state` with default reason and error.
    pub fn set(&self, state: ConnectState) {
        self.set_state(ConnectStateEvent::new(state));
    }
}

impl Default for ConnectStateController {
    fn default() -> Self {
        Self::new(ConnectState::Disconnected)
    }
}

impl ConnectStateSource for ConnectStateController {
    fn current_state(&self) -> ConnectState {
        ConnectState::from(self.state.load(Ordering::SeqCst))
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectStateEvent> {
        self.tx.subscribe()
    }
}
