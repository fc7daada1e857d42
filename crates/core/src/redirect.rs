//! Single-slot buffer for redirect payloads that arrive before the UI is ready.
//!
//! A deep link can be delivered while no UI channel is attached yet. The
//! payload is parked here and handed to the first channel that attaches,
//! exactly once. Later payloads overwrite an unconsumed earlier one.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};

/// Query parameter that carries the redirect payload in a deep link.
pub const REDIRECT_PARAM: &str = "redirect";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRedirect {
	pub payload: String,
	/// Unix timestamp (seconds) at which the payload was published.
	pub received_at: u64,
}

impl PendingRedirect {
	pub fn new(payload: impl Into<String>) -> Self {
		Self {
			payload: payload.into(),
			received_at: now_ts(),
		}
	}
}

/// Receiver side of a UI channel capable of acting on a redirect.
pub trait RedirectSink: Send + Sync {
	/// Hands `redirect` to the UI, or gives it back if the channel is closed.
	fn deliver(&self, redirect: PendingRedirect) -> std::result::Result<(), PendingRedirect>;
}

impl RedirectSink for mpsc::UnboundedSender<PendingRedirect> {
	fn deliver(&self, redirect: PendingRedirect) -> std::result::Result<(), PendingRedirect> {
		self.send(redirect).map_err(|err| err.0)
	}
}

#[derive(Default)]
struct RedirectState {
	pending: Option<PendingRedirect>,
	channel: Option<Arc<dyn RedirectSink>>,
}

#[derive(Default)]
pub struct RedirectBuffer {
	state: Mutex<RedirectState>,
}

impl RedirectBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Delivers `payload` to the attached channel, or buffers it (replacing any
	/// unconsumed payload) when none is attached.
	pub fn publish(&self, payload: impl Into<String>) {
		let redirect = PendingRedirect::new(payload);

		let channel = {
			let mut state = self.state.lock();
			match state.channel.clone() {
				Some(channel) => channel,
				None => {
					if let Some(previous) = state.pending.replace(redirect) {
						debug!(
							target = "applink.redirect",
							dropped = %previous.payload,
							"unconsumed redirect overwritten"
						);
					} else {
						trace!(target = "applink.redirect", "redirect buffered");
					}
					return;
				}
			}
		};

		match channel.deliver(redirect) {
			Ok(()) => trace!(target = "applink.redirect", "redirect delivered to attached channel"),
			Err(redirect) => self.requeue(&channel, redirect),
		}
	}

	/// Makes `channel` the active receiver and flushes any buffered payload to it.
	///
	/// Replaces a previously attached channel. A channel that turns out to be
	/// closed is detached again and the payload stays buffered.
	pub fn attach_channel(&self, channel: Arc<dyn RedirectSink>) {
		let pending = {
			let mut state = self.state.lock();
			state.channel = Some(Arc::clone(&channel));
			state.pending.take()
		};

		if let Some(redirect) = pending {
			debug!(target = "applink.redirect", "flushing buffered redirect to new channel");
			if let Err(redirect) = channel.deliver(redirect) {
				self.requeue(&channel, redirect);
			}
		}
	}

	/// Drops the active channel; subsequent payloads are buffered again.
	pub fn detach_channel(&self) {
		self.state.lock().channel = None;
	}

	pub fn has_channel(&self) -> bool {
		self.state.lock().channel.is_some()
	}

	/// Returns the buffered payload without consuming it.
	pub fn pending(&self) -> Option<PendingRedirect> {
		self.state.lock().pending.clone()
	}

	/// Detaches `closed` after it refused `redirect`, then routes the payload
	/// to whichever channel is attached now or back into the slot.
	///
	/// A payload published while the delivery was failing is newer and wins.
	fn requeue(&self, closed: &Arc<dyn RedirectSink>, redirect: PendingRedirect) {
		debug!(target = "applink.redirect", "redirect channel closed; detaching");

		let channel = {
			let mut state = self.state.lock();
			if state.channel.as_ref().is_some_and(|current| Arc::ptr_eq(current, closed)) {
				state.channel = None;
			}
			match state.channel.clone() {
				Some(channel) => channel,
				None => {
					if state.pending.is_none() {
						state.pending = Some(redirect);
					} else {
						debug!(target = "applink.redirect", dropped = %redirect.payload, "newer redirect already buffered");
					}
					return;
				}
			}
		};

		if let Err(redirect) = channel.deliver(redirect) {
			self.requeue(&channel, redirect);
		}
	}
}

/// Extracts the redirect payload from an inbound deep link.
///
/// # Errors
///
/// Returns `Error::InvalidArgument` if `url` does not parse or carries no
/// `redirect` query parameter.
pub fn parse_redirect_url(url: &str) -> Result<String> {
	let parsed = Url::parse(url).map_err(|err| Error::InvalidArgument(format!("malformed deep link '{url}': {err}")))?;

	parsed
		.query_pairs()
		.find(|(name, _)| *name == REDIRECT_PARAM)
		.map(|(_, value)| value.into_owned())
		.ok_or_else(|| Error::InvalidArgument(format!("deep link '{url}' has no '{REDIRECT_PARAM}' parameter")))
}

fn now_ts() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.unwrap_or_default()
		.as_secs()
}
