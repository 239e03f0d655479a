//! Shared command-line plumbing for sift binaries.

use clap::builder::{
	Styles,
	styling::{AnsiColor, Effects, Style},
};
use tracing_subscriber::EnvFilter;

/// Reads as `0.1.0 (1a2b3c4 x86_64-unknown-linux-gnu)`.
pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	" (",
	env!("VERGEN_GIT_SHA"),
	" ",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
	")",
);

/// Filter used when the configured level is blank or does not parse.
pub const DEFAULT_LOG_FILTER: &str = "info";

pub fn styles() -> Styles {
	let accent = AnsiColor::Magenta.on_default() | Effects::BOLD;

	Styles::styled()
		.header(accent)
		.usage(accent)
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(Style::new().italic())
		.error(AnsiColor::Red.on_default() | Effects::BOLD)
		.valid(AnsiColor::Green.on_default())
		.invalid(AnsiColor::Yellow.on_default())
}

/// Parses a configured level or directive list such as `info,sift_service=debug`.
pub fn log_filter(level: &str) -> Result<EnvFilter, String> {
	let level = level.trim();

	if level.is_empty() {
		return Ok(EnvFilter::new(DEFAULT_LOG_FILTER));
	}

	EnvFilter::try_new(level).map_err(|err| format!("invalid log level {level:?}: {err}"))
}

/// Installs the global subscriber, falling back to [`DEFAULT_LOG_FILTER`] on a bad level.
pub fn init_tracing(level: &str) {
	let (filter, rejected) = match log_filter(level) {
		Ok(filter) => (filter, None),
		Err(err) => (EnvFilter::new(DEFAULT_LOG_FILTER), Some(err)),
	};

	tracing_subscriber::fmt().with_env_filter(filter).init();

	if let Some(err) = rejected {
		tracing::warn!(error = %err, fallback = DEFAULT_LOG_FILTER, "Log level rejected.");
	}
}
