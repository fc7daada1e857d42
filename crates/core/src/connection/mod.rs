//! Background connection bookkeeping.
//!
//! [`ConnectionState`] is the per-record lifecycle state machine; it is pure and
//! never calls the platform. [`ConnectionRegistry`] owns the records, enforces
//! at most one live connection per identifier, and sequences the bind/unbind
//! collaborator calls around the state transitions.
//!
//! ```text
//! (none) --request--> Binding --bind ok--> Bound --release--> Unbinding --unbound--> (removed)
//!                        |                                        ^
//!                        +--bind failed--> Failed --> (removed)    |
//!                        +--release (bind in flight)---------------+
//! ```

mod registry;

use std::fmt;

use thiserror::Error;

pub use registry::{BindOutcome, ConnectionRegistry, ReleaseSummary};

/// Lifecycle state of a single connection record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
	/// Bind requested, platform call in flight.
	Binding,
	/// Connection established.
	Bound,
	/// Teardown requested; the record is no longer reachable through the registry.
	Unbinding,
	/// Bind was refused; the record is evicted immediately.
	Failed,
}

/// Inputs that drive [`ConnectionState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
	BindSucceeded,
	BindFailed,
	ReleaseRequested,
	UnbindCompleted,
}

/// Result of applying a [`LifecycleEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
	To(ConnectionState),
	/// The record reached the end of its life and must be dropped.
	Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid connection transition: {event:?} while {from}")]
pub struct InvalidTransition {
	pub from: ConnectionState,
	pub event: LifecycleEvent,
}

impl ConnectionState {
	/// Applies `event`, returning the next state or the removal marker.
	pub fn on(self, event: LifecycleEvent) -> Result<Transition, InvalidTransition> {
		use ConnectionState::*;
		use LifecycleEvent::*;

		match (self, event) {
			(Binding, BindSucceeded) => Ok(Transition::To(Bound)),
			(Binding, BindFailed) => Ok(Transition::To(Failed)),
			(Binding | Bound, ReleaseRequested) => Ok(Transition::To(Unbinding)),
			// A bind that completes after teardown started is unbound right away.
			(Unbinding, BindSucceeded) => Ok(Transition::To(Unbinding)),
			(Unbinding, UnbindCompleted) => Ok(Transition::Removed),
			(from, event) => Err(InvalidTransition { from, event }),
		}
	}

	/// Live records satisfy the at-most-one-connection guarantee; a new bind is never issued for them.
	pub fn is_live(self) -> bool {
		matches!(self, Self::Binding | Self::Bound)
	}
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Binding => write!(f, "binding"),
			Self::Bound => write!(f, "bound"),
			Self::Unbinding => write!(f, "unbinding"),
			Self::Failed => write!(f, "failed"),
		}
	}
}
