//! Keyed registry of background connections.
//!
//! Uses [`DashMap`] entries so the "is there already a record?" check and the
//! insertion of a `Binding` record happen under one shard lock. The lock is
//! released before the bind collaborator is awaited; concurrent callers for the
//! same identifier observe the `Binding` record and return without binding.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use super::{ConnectionState, LifecycleEvent, Transition};
use crate::error::{Error, Result};
use crate::resolver::ConnectionId;

struct ConnectionRecord<H> {
	state: ConnectionState,
	handle: Option<H>,
	/// Distinguishes a record from a later one created for the same identifier.
	epoch: u64,
}

impl<H> ConnectionRecord<H> {
	fn binding(epoch: u64) -> Self {
		Self {
			state: ConnectionState::Binding,
			handle: None,
			epoch,
		}
	}

	/// Applies `event`; returns false once the record should be dropped.
	fn advance(&mut self, id: &ConnectionId, event: LifecycleEvent) -> bool {
		match self.state.on(event) {
			Ok(Transition::To(next)) => {
				debug!(target = "applink.registry", id = %id, from = %self.state, to = %next, "connection transition");
				self.state = next;
				true
			}
			Ok(Transition::Removed) => {
				debug!(target = "applink.registry", id = %id, from = %self.state, "connection removed");
				false
			}
			Err(err) => {
				warn!(target = "applink.registry", id = %id, error = %err, "ignoring invalid transition");
				true
			}
		}
	}
}

/// Evicts the `Binding` record of an `ensure_connected` call that is dropped
/// before its bind returns (timeout, `select!`, aborted task).
struct PendingBind<'a, H> {
	records: &'a DashMap<ConnectionId, ConnectionRecord<H>>,
	id: &'a ConnectionId,
	epoch: u64,
	armed: bool,
}

impl<H> PendingBind<'_, H> {
	fn disarm(mut self) {
		self.armed = false;
	}
}

impl<H> Drop for PendingBind<'_, H> {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}
		let epoch = self.epoch;
		if self.records.remove_if(self.id, |_, record| record.epoch == epoch).is_some() {
			debug!(target = "applink.registry", id = %self.id, epoch, "bind abandoned; record evicted");
		}
	}
}

/// What [`ConnectionRegistry::ensure_connected`] did.
#[derive(Debug)]
pub enum BindOutcome<H> {
	/// A live record already existed; no bind was attempted.
	AlreadyConnected,
	/// A new connection was bound and recorded.
	Bound,
	/// The bind succeeded after `release_all` dropped its record. The caller
	/// owns the handle and must unbind it.
	Orphaned(H),
}

/// Tally returned by [`ConnectionRegistry::release_all`].
#[derive(Debug, Default)]
pub struct ReleaseSummary {
	pub unbound: usize,
	/// Records whose bind was still in flight; their handles are unbound when the bind returns.
	pub in_flight: usize,
	pub failed: Vec<(ConnectionId, String)>,
}

impl ReleaseSummary {
	pub fn is_clean(&self) -> bool {
		self.failed.is_empty()
	}
}

pub struct ConnectionRegistry<H> {
	records: DashMap<ConnectionId, ConnectionRecord<H>>,
	next_epoch: AtomicU64,
}

impl<H> Default for ConnectionRegistry<H> {
	fn default() -> Self {
		Self::new()
	}
}

impl<H> ConnectionRegistry<H> {
	pub fn new() -> Self {
		Self {
			records: DashMap::new(),
			next_epoch: AtomicU64::new(0),
		}
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn state_of(&self, id: &ConnectionId) -> Option<ConnectionState> {
		self.records.get(id).map(|record| record.state)
	}

	/// Identifiers currently tracked, sorted for stable output.
	pub fn identifiers(&self) -> Vec<ConnectionId> {
		let mut ids: Vec<_> = self.records.iter().map(|entry| entry.key().clone()).collect();
		ids.sort();
		ids
	}

	/// Ensures a connection for `id` exists, invoking `bind` only if none is live.
	///
	/// # Errors
	///
	/// Returns `Error::BindFail` if `bind` fails. The record is evicted so the
	/// next call for `id` attempts a fresh bind. The same holds when the returned
	/// future is dropped before `bind` completes.
	pub async fn ensure_connected<F, Fut>(&self, id: &ConnectionId, bind: F) -> Result<BindOutcome<H>>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = anyhow::Result<H>>,
	{
		let epoch = match self.records.entry(id.clone()) {
			Entry::Occupied(mut entry) => {
				if entry.get().state.is_live() {
					debug!(target = "applink.registry", id = %id, state = %entry.get().state, "connection already live");
					return Ok(BindOutcome::AlreadyConnected);
				}
				let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
				entry.insert(ConnectionRecord::binding(epoch));
				epoch
			}
			Entry::Vacant(entry) => {
				let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
				entry.insert(ConnectionRecord::binding(epoch));
				epoch
			}
		};

		debug!(target = "applink.registry", id = %id, epoch, "binding");

		let pending = PendingBind {
			records: &self.records,
			id,
			epoch,
			armed: true,
		};
		let result = bind().await;
		pending.disarm();

		match result {
			Ok(handle) => {
				let mut handle = Some(handle);
				if let Some(mut record) = self.records.get_mut(id) {
					if record.epoch == epoch {
						record.advance(id, LifecycleEvent::BindSucceeded);
						record.handle = handle.take();
					}
				}
				match handle {
					None => Ok(BindOutcome::Bound),
					Some(handle) => {
						debug!(target = "applink.registry", id = %id, epoch, "record released while binding");
						Ok(BindOutcome::Orphaned(handle))
					}
				}
			}
			Err(err) => {
				let reason = format!("{err:#}");
				if let Some((_, mut record)) = self.records.remove_if(id, |_, record| record.epoch == epoch) {
					record.advance(id, LifecycleEvent::BindFailed);
				}
				warn!(target = "applink.registry", id = %id, %reason, "bind failed");
				Err(Error::BindFail {
					identifier: id.to_string(),
					reason,
				})
			}
		}
	}

	/// Tears down every record, unbinding each bound handle.
	///
	/// Best effort: a failed unbind is recorded in the summary and the remaining
	/// records are still released. The registry is empty afterwards unless a new
	/// bind was requested concurrently.
	pub async fn release_all<F, Fut>(&self, mut unbind: F) -> ReleaseSummary
	where
		F: FnMut(H) -> Fut,
		Fut: Future<Output = anyhow::Result<()>>,
	{
		let ids: Vec<ConnectionId> = self.records.iter().map(|entry| entry.key().clone()).collect();
		let mut summary = ReleaseSummary::default();

		for id in ids {
			let Some((id, mut record)) = self.records.remove(&id) else {
				continue;
			};
			record.advance(&id, LifecycleEvent::ReleaseRequested);

			let Some(handle) = record.handle.take() else {
				debug!(target = "applink.registry", id = %id, "bind in flight; handle released on completion");
				summary.in_flight += 1;
				continue;
			};

			match unbind(handle).await {
				Ok(()) => {
					record.advance(&id, LifecycleEvent::UnbindCompleted);
					summary.unbound += 1;
				}
				Err(err) => {
					warn!(target = "applink.registry", id = %id, error = %err, "unbind failed");
					summary.failed.push((id, format!("{err:#}")));
				}
			}
		}

		debug!(
			target = "applink.registry",
			unbound = summary.unbound,
			in_flight = summary.in_flight,
			failed = summary.failed.len(),
			"released all connections"
		);
		summary
	}
}
