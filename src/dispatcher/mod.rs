//! Request dispatch and failover orchestration.
//!
//! # Data Flow
//! ```text
//! ServerApi::submit (service.rs)
//!     → DispatcherEvent::Submit on the event channel (events.rs)
//!     → DispatcherTask loop → RequestDispatcher::execute_request (engine.rs)
//!         connected          → Transport with the primary hostname
//!         probe outstanding  → PendingQueue (queue.rs)
//!         disconnected       → cached failover hostname, or
//!                              FailoverResolver::get_next_hostname
//!
//! Transport / resolver / connect state:
//!     → ReplySink / AnswerSink / broadcast
//!     → DispatcherTask loop → RequestDispatcher completion handlers
//!     → request finished, probe advanced, queue drained
//! ```
//!
//! # Design Decisions
//! - One task owns all dispatcher state; collaborators only post events
//! - Connect-state transitions are applied before later events, so routing
//!   always sees the state change that preceded a submit
//! - At most one failover probe; everything else waits in the queue
//! - The probe watches connect-state changes through its own
//!   subscription (watcher.rs), created and dropped with the probe

pub mod engine;
pub mod events;
pub mod queue;
pub mod service;
pub mod watcher;

pub use engine::{Collaborators, DispatcherSettings, RequestDispatcher};
pub use events::{AnswerSink, DispatcherEvent, Exchange, ReplySink};
pub use service::{ServerApi, ServiceError};
pub use watcher::ConnectStateWatcher;
