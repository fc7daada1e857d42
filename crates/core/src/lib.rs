//! applink - Connection and engine lifecycle broker
//!
//! Lets one application invoke or bind a component exposed by another locally
//! installed application, shares one long-running execution engine between UI
//! entry points, and parks deep-link redirects until a UI channel is ready:
//!
//! - **Resolver**: turns (owner, component, mode) into an addressable target
//! - **Connections**: at most one background connection per identifier
//! - **Engine**: claim/release reference counting around a single engine
//! - **Redirects**: single-slot, exactly-once redirect delivery
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 LinkBroker                   │  open / claim / publish
//! │  ┌──────────┐  ┌─────────────┐  ┌──────────┐ │
//! │  │ Resolver │─▶│ Connections │  │  Engine  │ │
//! │  └──────────┘  └──────┬──────┘  └────┬─────┘ │
//! │                       │              │       │  ┌───────────┐
//! │                       │              │       │  │ Redirects │
//! └───────────────────────┼──────────────┼───────┘  └───────────┘
//!                 ┌───────▼──────┐ ┌─────▼──────┐
//!                 │   Platform   │ │ EngineHost │   host-provided
//!                 └──────────────┘ └────────────┘
//! ```
//!
//! All platform work goes through the [`Platform`] and [`EngineHost`] traits;
//! the broker itself only sequences those calls and records state.

pub mod broker;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod logging;
pub mod platform;
pub mod redirect;
pub mod resolver;

// Re-export key types at crate root
pub use applink_protocol::{ErrorCode, LaunchMode, Request, Response};
pub use broker::LinkBroker;
pub use config::{BrokerConfig, EngineRetention};
pub use connection::{BindOutcome, ConnectionRegistry, ConnectionState, ReleaseSummary};
pub use engine::EngineBroker;
pub use error::{BootstrapStage, Error, Result};
pub use platform::{EngineHost, Platform};
pub use redirect::{PendingRedirect, RedirectBuffer, RedirectSink, parse_redirect_url};
pub use resolver::{ComponentResolver, ConnectionId, TargetDescriptor};
