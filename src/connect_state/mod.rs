//! VPN connect-state subsystem.
//!
//! # Data Flow
//! ```text
//! VPN engine:
//!     → controller.rs set_state(state, reason, error, location)
//!     → stores current state, broadcasts ConnectStateEvent
//!
//! Consumers:
//!     → dispatcher reads current_state() on every routing decision
//!     → dispatcher task and ConnectStateWatcher subscribe() to the stream
//! ```
//!
//! # Design Decisions
//! - Disconnected and Connecting count as "disconnected-like" for API routing
//! - State stored as an atomic so reads never block the event loop

pub mod controller;

pub use controller::ConnectStateController;

use tokio::sync::broadcast;

/// VPN tunnel state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectState {
    Disconnected = 0,
    Connected = 1,
    Connecting = 2,
    Disconnecting = 3,
}

impl ConnectState {
    /// Whether API calls should go through failover routing in this state.
    pub fn is_disconnected_like(&self) -> bool {
        matches!(self, ConnectState::Disconnected | ConnectState::Connecting)
    }
}

impl From<u8> for ConnectState {
    fn from(val: u8) -> Self {
        match val {
            1 => ConnectState::Connected,
            2 => ConnectState::Connecting,
            3 => ConnectState::Disconnecting,
            _ => ConnectState::Disconnected,
        }
    }
}

/// Why the tunnel went down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisconnectReason {
    #[default]
    Itself,
    ByUser,
    ReconnectionTimeoutExceeded,
    WithError,
}

/// Error reported alongside a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectError {
    #[default]
    None,
    AuthError,
    CouldNotFetchCredentials,
    LocationNotExist,
    LocationNoActiveNodes,
    CantResolveHostname,
    ConnectionBlocked,
    WireGuardConnectionError,
    Other(u32),
}

/// One entry of the connect-state stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectStateEvent {
    pub state: ConnectState,
    pub reason: DisconnectReason,
    pub error: ConnectError,
    /// Location the tunnel is (or was) connected to, if any.
    pub location: Option<String>,
}

impl ConnectStateEvent {
    pub fn new(state: ConnectState) -> Self {
        Self {
            state,
            reason: DisconnectReason::default(),
            error: ConnectError::default(),
            location: None,
        }
    }
}

/// Source of the VPN connect state consumed by the dispatcher.
pub trait ConnectStateSource: Send + Sync {
    fn current_state(&self) -> ConnectState;

    /// Subscribe to state changes made after this call.
    fn subscribe(&self) -> broadcast::Receiver<ConnectStateEvent>;
}
