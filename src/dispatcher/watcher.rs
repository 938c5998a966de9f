//! Connect-state watcher scoped to one failover probe.

use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::connect_state::{ConnectState, ConnectStateEvent, ConnectStateSource};

/// Answers "has the VPN connect state changed since this watcher was created?".
///
/// Latches on the first observed transition to a state other than the one
/// current at creation. Lagging behind the stream also counts as a change.
pub struct ConnectStateWatcher {
    initial: ConnectState,
    rx: broadcast::Receiver<ConnectStateEvent>,
    changed: bool,
}

impl ConnectStateWatcher {
    pub fn new(source: &dyn ConnectStateSource) -> Self {
        // Subscribe first so a change racing with the read is not missed.
        let rx = source.subscribe();
        Self {
            initial: source.current_state(),
            rx,
            changed: false,
        }
    }

    pub fn is_vpn_connect_state_changed(&mut self) -> bool {
        while !self.changed {
            match self.rx.try_recv() {
                Ok(event) => {
                    if event.state != self.initial {
                        self.changed = true;
                    }
                }
                Err(TryRecvError::Lagged(_)) => self.changed = true,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        self.changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect_state::ConnectStateController;

    #[test]
    fn test_unchanged_without_events() {
        let controller = ConnectStateController::default();
        let mut watcher = ConnectStateWatcher::new(&controller);
        assert!(!watcher.is_vpn_connect_state_changed());
    }

    #[test]
    fn test_latches_on_transition() {
        let controller = ConnectStateController::default();
        let mut watcher = ConnectStateWatcher::new(&controller);

        controller.set(ConnectState::Connecting);
        assert!(watcher.is_vpn_connect_state_changed());

        controller.set(ConnectState::Disconnected);
        assert!(watcher.is_vpn_connect_state_changed());
    }

    #[test]
    fn test_same_state_repeat_is_not_a_change() {
        let controller = ConnectStateController::new(ConnectState::Disconnected);
        let mut watcher = ConnectStateWatcher::new(&controller);
        controller.set(ConnectState::Disconnected);
        assert!(!watcher.is_vpn_connect_state_changed());
    }

    #[test]
    fn test_changes_before_creation_are_ignored() {
        let controller = ConnectStateController::default();
        controller.set(ConnectState::Connected);
        let mut watcher = ConnectStateWatcher::new(&controller);
        assert!(!watcher.is_vpn_connect_state_changed());
    }
}
