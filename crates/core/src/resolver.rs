//! Turns caller-supplied (owner, component, mode) triples into addressable targets.

use std::fmt;
use std::sync::Arc;

use applink_protocol::LaunchMode;
use tracing::trace;

use crate::error::{Error, Result};

/// Separates owner and component inside a [`ConnectionId`].
pub const IDENTIFIER_SEPARATOR: char = '/';

/// Immutable invocation target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetDescriptor {
	owner_id: Arc<str>,
	component_id: Arc<str>,
	mode: LaunchMode,
}

impl TargetDescriptor {
	/// Owning application identifier (package name).
	pub fn owner_id(&self) -> &str {
		&self.owner_id
	}

	/// Resolved component; the background service when `mode` is background.
	pub fn component_id(&self) -> &str {
		&self.component_id
	}

	pub fn mode(&self) -> LaunchMode {
		self.mode
	}

	/// Registry key for this target.
	pub fn connection_id(&self) -> ConnectionId {
		ConnectionId(Arc::from(format!(
			"{}{IDENTIFIER_SEPARATOR}{}",
			self.owner_id, self.component_id
		)))
	}
}

impl fmt::Display for TargetDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}{IDENTIFIER_SEPARATOR}{} ({})",
			self.owner_id, self.component_id, self.mode
		)
	}
}

/// Registry key derived from an owner and a resolved component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Arc<str>);

impl ConnectionId {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ConnectionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Debug, Clone)]
pub struct ComponentResolver {
	background_component: Arc<str>,
}

impl ComponentResolver {
	pub fn new(background_component: impl Into<Arc<str>>) -> Self {
		Self {
			background_component: background_component.into(),
		}
	}

	pub fn background_component(&self) -> &str {
		&self.background_component
	}

	/// Resolves a request into a [`TargetDescriptor`].
	///
	/// Background targets are addressable per owner only: the requested
	/// component is validated and then replaced by the background service.
	///
	/// # Errors
	///
	/// Returns `Error::InvalidArgument` if either identifier is blank, or if the
	/// owner contains the identifier separator.
	pub fn resolve(&self, owner_id: &str, requested_component: &str, mode: LaunchMode) -> Result<TargetDescriptor> {
		let owner_id = owner_id.trim();
		let requested_component = requested_component.trim();

		if owner_id.is_empty() {
			return Err(Error::InvalidArgument("owner id must not be empty".into()));
		}
		if owner_id.contains(IDENTIFIER_SEPARATOR) {
			return Err(Error::InvalidArgument(format!(
				"owner id '{owner_id}' must not contain '{IDENTIFIER_SEPARATOR}'"
			)));
		}
		if requested_component.is_empty() {
			return Err(Error::InvalidArgument("component id must not be empty".into()));
		}

		let component_id = match mode {
			LaunchMode::Background => Arc::clone(&self.background_component),
			LaunchMode::Foreground => Arc::from(requested_component),
		};

		trace!(
			target = "applink.resolver",
			owner = owner_id,
			requested = requested_component,
			resolved = %component_id,
			%mode,
			"resolved target"
		);

		Ok(TargetDescriptor {
			owner_id: Arc::from(owner_id),
			component_id,
			mode,
		})
	}
}
