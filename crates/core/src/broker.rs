//! Inbound command surface.
//!
//! [`LinkBroker`] owns one instance of each lifecycle component and routes the
//! application layer's calls to them. It is created once per hosting process
//! and shared by handle (typically `Arc<LinkBroker<..>>`).

use std::sync::Arc;

use applink_protocol::{LaunchMode, Request, Response};
use tracing::{debug, info, warn};

use crate::config::BrokerConfig;
use crate::connection::{BindOutcome, ConnectionRegistry, ReleaseSummary};
use crate::engine::EngineBroker;
use crate::error::{Error, Result};
use crate::platform::{EngineHost, Platform};
use crate::redirect::{RedirectBuffer, RedirectSink, parse_redirect_url};
use crate::resolver::ComponentResolver;

pub struct LinkBroker<P: Platform, E: EngineHost> {
	config: BrokerConfig,
	resolver: ComponentResolver,
	platform: Arc<P>,
	connections: ConnectionRegistry<P::Handle>,
	engine: EngineBroker<E>,
	redirects: RedirectBuffer,
}

impl<P: Platform, E: EngineHost> LinkBroker<P, E> {
	/// Creates a broker after validating `config`.
	pub fn new(config: BrokerConfig, platform: Arc<P>, engine_host: Arc<E>) -> Result<Self> {
		config.validate()?;
		Ok(Self {
			resolver: ComponentResolver::new(config.background_component.as_str()),
			engine: EngineBroker::new(engine_host, config.entrypoint.as_str(), config.engine_retention),
			platform,
			connections: ConnectionRegistry::new(),
			redirects: RedirectBuffer::new(),
			config,
		})
	}

	pub fn config(&self) -> &BrokerConfig {
		&self.config
	}

	pub fn resolver(&self) -> &ComponentResolver {
		&self.resolver
	}

	pub fn connections(&self) -> &ConnectionRegistry<P::Handle> {
		&self.connections
	}

	pub fn engine(&self) -> &EngineBroker<E> {
		&self.engine
	}

	pub fn redirects(&self) -> &RedirectBuffer {
		&self.redirects
	}

	/// Opens a component of another application.
	///
	/// Foreground targets are launched once and forgotten. Background targets
	/// are bound at most once per owner until [`release_all`](Self::release_all).
	///
	/// # Errors
	///
	/// - `Error::InvalidArgument` for blank identifiers
	/// - `Error::BindFail` if the platform refuses the background bind
	/// - `Error::Launch` if the foreground launch fails
	pub async fn open(&self, owner_id: &str, component_id: &str, mode: LaunchMode) -> Result<()> {
		let target = self.resolver.resolve(owner_id, component_id, mode)?;

		match mode {
			LaunchMode::Foreground => {
				info!(target = "applink.broker", descriptor = %target, "launching foreground target");
				self.platform
					.launch_foreground_target(&target)
					.await
					.map_err(|source| Error::Launch {
						target: target.to_string(),
						source,
					})
			}
			LaunchMode::Background => {
				let id = target.connection_id();
				let outcome = self
					.connections
					.ensure_connected(&id, || self.platform.bind_background_target(&target))
					.await?;

				match outcome {
					BindOutcome::Bound => info!(target = "applink.broker", %id, "background target bound"),
					BindOutcome::AlreadyConnected => debug!(target = "applink.broker", %id, "background target already bound"),
					BindOutcome::Orphaned(handle) => {
						debug!(target = "applink.broker", %id, "unbinding connection released during bind");
						if let Err(err) = self.platform.unbind_target(handle).await {
							warn!(target = "applink.broker", %id, error = %err, "unbind of orphaned connection failed");
						}
					}
				}
				Ok(())
			}
		}
	}

	/// Releases every background connection. Called when the hosting context shuts down.
	pub async fn release_all(&self) -> ReleaseSummary {
		let summary = self
			.connections
			.release_all(|handle| self.platform.unbind_target(handle))
			.await;
		if !summary.is_clean() {
			warn!(
				target = "applink.broker",
				failed = summary.failed.len(),
				"some connections failed to unbind"
			);
		}
		summary
	}

	/// Claims the shared engine, bootstrapping it on first use.
	pub async fn claim_engine(&self, context: &E::Context) -> Result<E::Engine> {
		self.engine.claim(context).await
	}

	pub async fn release_engine(&self) {
		self.engine.release().await;
	}

	pub fn publish_redirect(&self, payload: impl Into<String>) {
		self.redirects.publish(payload);
	}

	/// Extracts the `redirect` parameter from `url` and publishes it.
	pub fn handle_deep_link(&self, url: &str) -> Result<()> {
		let payload = parse_redirect_url(url)?;
		debug!(target = "applink.broker", %url, "deep link carried redirect");
		self.redirects.publish(payload);
		Ok(())
	}

	pub fn attach_redirect_channel(&self, channel: Arc<dyn RedirectSink>) {
		self.redirects.attach_channel(channel);
	}

	pub fn detach_redirect_channel(&self) {
		self.redirects.detach_channel();
	}

	/// Executes a wire request and reports the outcome as a [`Response`].
	pub async fn dispatch(&self, request: Request) -> Response {
		let method = request.method();

		let result = match request {
			Request::Open {
				package,
				component,
				in_background,
			} => {
				self.open(&package, &component, LaunchMode::from_in_background(in_background))
					.await
			}
			Request::PublishRedirect { payload } => {
				self.publish_redirect(payload);
				Ok(())
			}
			Request::OpenUrl { url } => self.handle_deep_link(&url),
			Request::Shutdown => {
				self.release_all().await;
				Ok(())
			}
		};

		match result {
			Ok(()) => Response::Ok,
			Err(err) => {
				debug!(target = "applink.broker", method, error = %err, "request failed");
				Response::Error {
					code: err.code(),
					message: err.to_string(),
				}
			}
		}
	}
}
