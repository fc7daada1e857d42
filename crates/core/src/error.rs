//! Error types for the applink broker.

use std::fmt;

use applink_protocol::ErrorCode;
use thiserror::Error;

/// Result type alias for broker operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Engine bootstrap step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStage {
	/// Allocating the engine instance.
	Allocate,
	/// Running the platform loader initialization.
	InitializeLoader,
	/// Starting the default entry point.
	StartEntrypoint,
}

impl fmt::Display for BootstrapStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Allocate => write!(f, "allocate"),
			Self::InitializeLoader => write!(f, "loader initialization"),
			Self::StartEntrypoint => write!(f, "entry point start"),
		}
	}
}

/// Errors that can occur while brokering connections and the shared engine.
#[derive(Debug, Error)]
pub enum Error {
	/// Malformed resolver input or deep link.
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	/// The platform refused or could not establish a background connection.
	#[error("BindFail: could not bind {identifier}: {reason}")]
	BindFail {
		/// Connection identifier the bind was attempted for.
		identifier: String,
		/// Reason reported by the platform.
		reason: String,
	},

	/// Engine construction failed; no claim was recorded.
	#[error("Engine bootstrap failed during {stage}: {reason}")]
	Bootstrap { stage: BootstrapStage, reason: String },

	/// Foreground launch was rejected by the platform launcher.
	#[error("Failed to launch {target}: {source}")]
	Launch {
		target: String,
		#[source]
		source: anyhow::Error,
	},

	/// Configuration is present but unusable.
	#[error("Invalid configuration: {0}")]
	Config(String),

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns the wire error code reported to callers.
	pub fn code(&self) -> ErrorCode {
		match self {
			Error::InvalidArgument(_) => ErrorCode::InvalidArgument,
			Error::BindFail { .. } => ErrorCode::BindFail,
			Error::Bootstrap { .. } => ErrorCode::BootstrapError,
			Error::Launch { .. } => ErrorCode::LaunchFailed,
			Error::Config(_) | Error::Io(_) | Error::Json(_) => ErrorCode::InternalError,
		}
	}

	/// Returns the platform's reason if this is a bind failure.
	pub fn bind_reason(&self) -> Option<&str> {
		match self {
			Error::BindFail { reason, .. } => Some(reason),
			_ => None,
		}
	}

	/// Returns true if retrying the same call may succeed without changing input.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Error::BindFail { .. } | Error::Bootstrap { .. } | Error::Launch { .. })
	}
}
