//! Candidate-list failover resolver.
//!
//! # Responsibilities
//! - Hand out configured alternate hostnames one per call
//! - Put the manual address first when resolution is not automatic
//! - Report `ConnectStateChanged` if the VPN state moved during a walk
//! - Report `Failed` once every candidate has been handed out

use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::connect_state::{ConnectState, ConnectStateEvent, ConnectStateSource};
use crate::dispatcher::events::AnswerSink;
use crate::failover::{ApiResolutionSettings, FailoverAnswer, FailoverResolver};

/// Walks a fixed list of candidate hostnames.
pub struct HostnameListResolver {
    hostnames: Vec<String>,
    settings: ApiResolutionSettings,
    connect_state: Arc<dyn ConnectStateSource>,
    /// Subscription opened at the start of the current walk, with the state
    /// seen at that moment.
    walk: Option<(broadcast::Receiver<ConnectStateEvent>, ConnectState)>,
    next: usize,
}

impl HostnameListResolver {
    pub fn new(hostnames: Vec<String>, connect_state: Arc<dyn ConnectStateSource>) -> Self {
        Self {
            hostnames,
            settings: ApiResolutionSettings::default(),
            connect_state,
            walk: None,
            next: 0,
        }
    }

    fn candidates(&self) -> Vec<&str> {
        let mut list = Vec::with_capacity(self.hostnames.len() + 1);
        if !self.settings.automatic && !self.settings.manual_address.is_empty() {
            list.push(self.settings.manual_address.as_str());
        }
        list.extend(self.hostnames.iter().map(String::as_str));
        list
    }

    /// Repeats of the walk's starting state do not count; a lagged stream does.
    fn state_changed_during_walk(&mut self) -> bool {
        let Some((rx, initial)) = self.walk.as_mut() else {
            return false;
        };
        loop {
            match rx.try_recv() {
                Ok(event) if event.state == *initial => continue,
                Ok(_) | Err(TryRecvError::Lagged(_)) => return true,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return false,
            }
        }
    }

    fn reset_walk(&mut self) {
        self.walk = None;
        self.next = 0;
    }
}

impl FailoverResolver for HostnameListResolver {
    fn get_next_hostname(&mut self, ignore_ssl_errors: bool, answer: AnswerSink) {
        if self.state_changed_during_walk() {
            tracing::info!("Connect state changed during failover walk, restarting it");
            self.reset_walk();
            answer.send(FailoverAnswer::ConnectStateChanged);
            return;
        }
        if self.walk.is_none() {
            let rx = self.connect_state.subscribe();
            self.walk = Some((rx, self.connect_state.current_state()));
        }

        let candidate = self.candidates().get(self.next).map(|h| h.to_string());
        match candidate {
            Some(hostname) => {
                tracing::info!(
                    hostname = %hostname,
                    index = self.next,
                    ignore_ssl_errors,
                    "Trying failover hostname"
                );
                self.next += 1;
                answer.send(FailoverAnswer::Success(hostname));
            }
            None => {
                tracing::warn!(tried = self.next, "All failover hostnames exhausted");
                self.walk = None;
                answer.send(FailoverAnswer::Failed);
            }
        }
    }

    fn set_api_resolution_settings(&mut self, settings: ApiResolutionSettings) {
        if settings != self.settings {
            tracing::debug!(automatic = settings.automatic, manual_address = %settings.manual_address, "API resolution settings updated");
            self.settings = settings;
            self.reset_walk();
        }
    }
}
