//! Broker configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all) yields
//! a working configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Component that every background-mode request is redirected to.
pub const DEFAULT_BACKGROUND_COMPONENT: &str = "eu.cybergeiger.communication.GeigerService";

/// Entry point started once per engine bootstrap.
pub const DEFAULT_ENTRYPOINT: &str = "main";

/// What happens to the shared engine once the last claim is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineRetention {
	/// Destroy the engine when the claim count returns to zero.
	#[default]
	DestroyOnLastRelease,
	/// Keep the engine for the process lifetime; only `dispose` destroys it.
	KeepAlive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
	/// Well-known background-service component substituted in background mode.
	pub background_component: String,
	/// Default entry point started during engine bootstrap.
	pub entrypoint: String,
	pub engine_retention: EngineRetention,
}

impl Default for BrokerConfig {
	fn default() -> Self {
		Self {
			background_component: DEFAULT_BACKGROUND_COMPONENT.to_string(),
			entrypoint: DEFAULT_ENTRYPOINT.to_string(),
			engine_retention: EngineRetention::default(),
		}
	}
}

impl BrokerConfig {
	/// Parses and validates a JSON configuration document.
	pub fn from_json_str(json: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(json)?;
		config.validate()?;
		Ok(config)
	}

	/// Loads configuration from `path`, falling back to defaults if the file is missing.
	pub fn load(path: &Path) -> Result<Self> {
		if !path.exists() {
			debug!(target = "applink.config", path = %path.display(), "config file missing; using defaults");
			return Ok(Self::default());
		}
		let contents = fs::read_to_string(path)?;
		Self::from_json_str(&contents)
	}

	pub fn validate(&self) -> Result<()> {
		if self.background_component.trim().is_empty() {
			return Err(Error::Config("background_component must not be empty".into()));
		}
		if self.entrypoint.trim().is_empty() {
			return Err(Error::Config("entrypoint must not be empty".into()));
		}
		Ok(())
	}

	pub fn with_background_component(mut self, component: impl Into<String>) -> Self {
		self.background_component = component.into();
		self
	}

	pub fn with_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
		self.entrypoint = entrypoint.into();
		self
	}

	pub fn with_engine_retention(mut self, retention: EngineRetention) -> Self {
		self.engine_retention = retention;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_document_yields_defaults() {
		let config = BrokerConfig::from_json_str("{}").unwrap();
		assert_eq!(config, BrokerConfig::default());
		assert_eq!(config.background_component, DEFAULT_BACKGROUND_COMPONENT);
		assert_eq!(config.engine_retention, EngineRetention::DestroyOnLastRelease);
	}

	#[test]
	fn retention_policy_reads_snake_case() {
		let config = BrokerConfig::from_json_str(r#"{"engine_retention":"keep_alive","entrypoint":"boot"}"#).unwrap();
		assert_eq!(config.engine_retention, EngineRetention::KeepAlive);
		assert_eq!(config.entrypoint, "boot");
	}

	#[test]
	fn blank_background_component_is_rejected() {
		let err = BrokerConfig::from_json_str(r#"{"background_component":"  "}"#).unwrap_err();
		assert!(matches!(err, Error::Config(_)), "got {err:?}");
	}

	#[test]
	fn load_missing_file_uses_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let config = BrokerConfig::load(&dir.path().join("applink.json")).unwrap();
		assert_eq!(config, BrokerConfig::default());
	}

	#[test]
	fn load_reads_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("applink.json");
		fs::write(&path, r#"{"background_component":"com.acme.Sync"}"#).unwrap();

		let config = BrokerConfig::load(&path).unwrap();
		assert_eq!(config.background_component, "com.acme.Sync");
		assert_eq!(config.entrypoint, DEFAULT_ENTRYPOINT);
	}

	#[test]
	fn load_reports_malformed_json() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("applink.json");
		fs::write(&path, "{not json").unwrap();

		assert!(matches!(BrokerConfig::load(&path), Err(Error::Json(_))));
	}
}
