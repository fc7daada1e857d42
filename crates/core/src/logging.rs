//! Opt-in stderr logging for hosts without a subscriber of their own.

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Filter directives used when `RUST_LOG` is unset.
fn default_directives(verbosity: u8) -> &'static str {
	match verbosity {
		0 => "error",
		1 => "warn,applink=info",
		2 => "info,applink=debug",
		_ => "trace",
	}
}

/// Installs a compact stderr subscriber.
///
/// `RUST_LOG` takes precedence over `verbosity`. Calls after the first
/// subscriber is installed are no-ops.
pub fn init_logging(verbosity: u8) {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)));

	let installed = tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(std::io::stderr.with_max_level(Level::TRACE))
		.with_target(true)
		.compact()
		.try_init()
		.is_ok();

	if installed {
		tracing::debug!(target = "applink.logging", verbosity, "stderr logging installed");
	}
}
