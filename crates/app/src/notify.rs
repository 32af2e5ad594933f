//! User-facing messages on stdout.
//!
//! Diagnostics go through `tracing` to stderr; this channel carries only what
//! the person at the terminal should read.

use std::io::Write;

use aviary_store::{Level, Notifier};

#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
	fn prefix(level: Level) -> &'static str {
		match level {
			Level::Info => "..",
			Level::Success => "ok",
			Level::Warning => "!!",
			Level::Error => "error:",
		}
	}
}

impl Notifier for ConsoleNotifier {
	fn notify(&self, level: Level, message: &str) {
		let mut out = std::io::stdout().lock();
		if let Err(error) = writeln!(out, "{} {message}", Self::prefix(level)) {
			tracing::debug!(error = %error, level = level.as_str(), "notify.write_failed");
		}
	}
}
