//! Protocol types for the inbound command surface.
//!
//! The application UI layer drives the broker through a small set of named
//! methods. Each call is one [`Request`] and yields one [`Response`]:
//!
//! 1. UI sends [`Request::Open`] to launch or bind a component of another app
//! 2. URL handler sends [`Request::OpenUrl`] or [`Request::PublishRedirect`]
//!    when a deep link arrives
//! 3. Host sends [`Request::Shutdown`] when the hosting context is torn down
//!
//! Engine claim/release is not part of this surface because the engine
//! instance is an in-process object, not data.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a target component is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
	/// One-shot launch; nothing is tracked afterwards.
	Foreground,
	/// Long-lived connection to the owner's background service.
	Background,
}

impl LaunchMode {
	/// Maps the boolean `inBackground` flag used by method-call bridges.
	pub fn from_in_background(in_background: bool) -> Self {
		if in_background {
			Self::Background
		} else {
			Self::Foreground
		}
	}

	pub fn is_background(self) -> bool {
		matches!(self, Self::Background)
	}
}

impl fmt::Display for LaunchMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Foreground => write!(f, "foreground"),
			Self::Background => write!(f, "background"),
		}
	}
}

/// Message sent from the application layer to the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
	/// Invoke a component exposed by another locally installed application.
	Open {
		/// Owning application identifier (package name).
		package: String,
		/// Requested component; replaced by the background service in background mode.
		component: String,
		/// Whether to bind the owner's background service instead of launching.
		#[serde(rename = "inBackground", default)]
		in_background: bool,
	},
	/// Buffer a redirect payload for the next UI channel.
	PublishRedirect {
		payload: String,
	},
	/// Extract the `redirect` parameter from a deep link and buffer it.
	OpenUrl {
		url: String,
	},
	/// Release every background connection held for the hosting context.
	Shutdown,
}

impl Request {
	/// Returns the method name as seen on the wire.
	pub fn method(&self) -> &'static str {
		match self {
			Self::Open { .. } => "open",
			Self::PublishRedirect { .. } => "publish_redirect",
			Self::OpenUrl { .. } => "open_url",
			Self::Shutdown => "shutdown",
		}
	}
}

/// Message sent from the broker back to the application layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
	Ok,
	Error {
		code: ErrorCode,
		/// Human-readable detail.
		message: String,
	},
}

impl Response {
	pub fn is_ok(&self) -> bool {
		matches!(self, Self::Ok)
	}
}

/// Machine-readable failure kind reported to callers.
///
/// Names are serialized verbatim so existing callers matching on `"BindFail"`
/// keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
	InvalidArgument,
	BindFail,
	BootstrapError,
	LaunchFailed,
	InternalError,
}

impl ErrorCode {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::InvalidArgument => "InvalidArgument",
			Self::BindFail => "BindFail",
			Self::BootstrapError => "BootstrapError",
			Self::LaunchFailed => "LaunchFailed",
			Self::InternalError => "InternalError",
		}
	}
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
