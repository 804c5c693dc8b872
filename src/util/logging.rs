//! Logging setup
//!
//! This module wires the crate's `tracing` output to a subscriber.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// Initialize logging once
static INIT: Once = Once::new();

/// Initialize the tracing system
///
/// This function sets up tracing with an `EnvFilter` that:
/// - Honors the `RUST_LOG` environment variable if set
/// - Uses the `SYMHOOK_DEBUG` environment variable to switch on debug output
/// - Only logs warnings and errors by default
pub fn init_logging() {
	INIT.call_once(|| {
		let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
			if std::env::var("SYMHOOK_DEBUG").is_ok() {
				EnvFilter::new("symhook_rs=debug")
			} else {
				EnvFilter::new("symhook_rs=warn")
			}
		});

		tracing_subscriber::registry()
			.with(fmt::layer().with_target(true))
			.with(filter)
			.init();
	});
}
