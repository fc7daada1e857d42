//! Collaborator traits implemented by the host platform.
//!
//! The broker never talks to the operating system directly. Binding services,
//! launching activities, and constructing the execution engine are delegated
//! to these traits so the lifecycle bookkeeping can be exercised with fakes.

use async_trait::async_trait;

use crate::resolver::TargetDescriptor;

/// Component binding and launching.
#[async_trait]
pub trait Platform: Send + Sync + 'static {
	/// Opaque handle for an established background connection.
	type Handle: Send + Sync + 'static;

	/// Binds the owner's background service. An `Err` is reported to the caller as `BindFail`.
	async fn bind_background_target(&self, target: &TargetDescriptor) -> anyhow::Result<Self::Handle>;

	/// Releases a previously bound connection.
	async fn unbind_target(&self, handle: Self::Handle) -> anyhow::Result<()>;

	/// Fire-and-forget launch of a foreground component.
	async fn launch_foreground_target(&self, target: &TargetDescriptor) -> anyhow::Result<()>;
}

/// Construction and teardown of the shared execution engine.
///
/// Bootstrap runs as three ordered steps. If a step after [`allocate`](Self::allocate)
/// fails, the broker hands the partially built instance to [`destroy`](Self::destroy).
#[async_trait]
pub trait EngineHost: Send + Sync + 'static {
	/// Whatever the host needs to construct an engine (application context, assets, ...).
	type Context: Send + Sync;
	/// Shared engine instance; clones refer to the same engine.
	type Engine: Clone + Send + Sync + 'static;

	async fn allocate(&self, context: &Self::Context) -> anyhow::Result<Self::Engine>;

	/// Runs the platform loader initialization to completion.
	async fn initialize_loader(&self, engine: &Self::Engine, context: &Self::Context) -> anyhow::Result<()>;

	async fn start_entrypoint(&self, engine: &Self::Engine, entrypoint: &str) -> anyhow::Result<()>;

	async fn destroy(&self, engine: Self::Engine);
}
