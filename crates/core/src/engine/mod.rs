//! Shared execution engine with claim/release reference counting.
//!
//! One engine instance is shared by every UI surface that needs it. The first
//! claim bootstraps it; later claims reuse it. Under
//! [`EngineRetention::DestroyOnLastRelease`] the release that brings the claim
//! count to zero destroys it, and the next claim bootstraps from scratch.
//!
//! The slot (instance + claim count) sits behind an async mutex that is held
//! across bootstrap and teardown, so concurrent claimants wait for the first
//! bootstrap instead of starting their own.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::EngineRetention;
use crate::error::{BootstrapStage, Error, Result};
use crate::platform::EngineHost;

struct EngineSlot<T> {
	instance: Option<T>,
	/// Allocated by a bootstrap that has not finished. Still set on the next
	/// lock only if that bootstrap was cancelled, and then destroyed.
	partial: Option<T>,
	claims: usize,
}

pub struct EngineBroker<E: EngineHost> {
	host: Arc<E>,
	entrypoint: String,
	retention: EngineRetention,
	slot: Mutex<EngineSlot<E::Engine>>,
}

impl<E: EngineHost> EngineBroker<E> {
	pub fn new(host: Arc<E>, entrypoint: impl Into<String>, retention: EngineRetention) -> Self {
		Self {
			host,
			entrypoint: entrypoint.into(),
			retention,
			slot: Mutex::new(EngineSlot {
				instance: None,
				partial: None,
				claims: 0,
			}),
		}
	}

	pub fn retention(&self) -> EngineRetention {
		self.retention
	}

	/// Current number of outstanding claims.
	pub async fn claims(&self) -> usize {
		self.slot.lock().await.claims
	}

	pub async fn is_running(&self) -> bool {
		self.slot.lock().await.instance.is_some()
	}

	/// Claims the shared engine, bootstrapping it if no instance exists.
	///
	/// # Errors
	///
	/// Returns `Error::Bootstrap` if any bootstrap step fails. The claim is not
	/// recorded and no instance is left behind. If the returned future is
	/// dropped mid-bootstrap, the allocated engine is destroyed by the next
	/// `claim` or `dispose`.
	pub async fn claim(&self, context: &E::Context) -> Result<E::Engine> {
		let mut slot = self.slot.lock().await;
		self.reap_partial(&mut slot).await;

		let engine = match slot.instance.clone() {
			Some(engine) => engine,
			None => {
				let engine = self.bootstrap(&mut slot, context).await?;
				slot.instance = Some(engine.clone());
				engine
			}
		};

		slot.claims += 1;
		debug!(target = "applink.engine", claims = slot.claims, "engine claimed");
		Ok(engine)
	}

	/// Drops one claim, destroying the engine when the last claim goes away
	/// (unless the broker keeps it alive).
	pub async fn release(&self) {
		let mut slot = self.slot.lock().await;

		if slot.claims == 0 {
			warn!(target = "applink.engine", "release without an outstanding claim ignored");
			return;
		}
		slot.claims -= 1;
		debug!(target = "applink.engine", claims = slot.claims, "engine released");

		if slot.claims > 0 || self.retention == EngineRetention::KeepAlive {
			return;
		}
		if let Some(engine) = slot.instance.take() {
			info!(target = "applink.engine", "last claim released; destroying engine");
			self.host.destroy(engine).await;
		}
	}

	/// Destroys the engine regardless of outstanding claims.
	///
	/// Intended for process teardown; outstanding claims are forgotten.
	pub async fn dispose(&self) {
		let mut slot = self.slot.lock().await;
		if slot.claims > 0 {
			warn!(target = "applink.engine", claims = slot.claims, "disposing engine with outstanding claims");
		}
		slot.claims = 0;
		self.reap_partial(&mut slot).await;
		if let Some(engine) = slot.instance.take() {
			info!(target = "applink.engine", "disposing engine");
			self.host.destroy(engine).await;
		}
	}

	async fn bootstrap(&self, slot: &mut EngineSlot<E::Engine>, context: &E::Context) -> Result<E::Engine> {
		info!(target = "applink.engine", entrypoint = %self.entrypoint, "bootstrapping engine");

		let engine = self.host.allocate(context).await.map_err(|err| Error::Bootstrap {
			stage: BootstrapStage::Allocate,
			reason: format!("{err:#}"),
		})?;
		slot.partial = Some(engine.clone());

		if let Err(err) = self.host.initialize_loader(&engine, context).await {
			slot.partial = None;
			return Err(self.abandon(engine, BootstrapStage::InitializeLoader, err).await);
		}
		if let Err(err) = self.host.start_entrypoint(&engine, &self.entrypoint).await {
			slot.partial = None;
			return Err(self.abandon(engine, BootstrapStage::StartEntrypoint, err).await);
		}

		slot.partial = None;
		Ok(engine)
	}

	async fn reap_partial(&self, slot: &mut EngineSlot<E::Engine>) {
		if let Some(engine) = slot.partial.take() {
			warn!(target = "applink.engine", "destroying engine left by an interrupted bootstrap");
			self.host.destroy(engine).await;
		}
	}

	/// Tears down a partially built engine and converts the step failure.
	async fn abandon(&self, engine: E::Engine, stage: BootstrapStage, err: anyhow::Error) -> Error {
		warn!(target = "applink.engine", %stage, error = %err, "bootstrap failed; destroying partial engine");
		self.host.destroy(engine).await;
		Error::Bootstrap {
			stage,
			reason: format!("{err:#}"),
		}
	}
}

#[cfg(test)]
mod tests;
