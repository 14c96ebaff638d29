use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::{
	filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
	EnvFilter,
};

use crate::settings::Settings;

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
	pub level: String,
}

impl LogSettings {
	pub fn global() -> &'static Self {
		&Settings::global().log
	}
}

/// Builds the diagnostic filter. hyper is kept at `warn` so requests never
/// show up as an access log.
fn filter(level: &str) -> Result<EnvFilter> {
	let level = tracing::Level::from_str(level).context(format!("invalid log level {level:?}"))?;

	Ok(EnvFilter::default()
		.add_directive(LevelFilter::from_level(level).into())
		.add_directive("hyper=warn".parse()?))
}

/// Diagnostics go to stderr, stdout only carries the alert reports.
pub fn setup_logging() -> Result<()> {
	let fmt_layer = fmt::layer().with_writer(std::io::stderr);

	tracing_subscriber::registry()
		.with(filter(LogSettings::global().level.as_str())?)
		.with(fmt_layer)
		.init();

	Ok(())
}
