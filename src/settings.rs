use std::net::{IpAddr, Ipv4Addr};

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use config::Config;
use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::{alertmanager_webhook_receiver::AlertReceiverSettings, log::LogSettings};

static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// port used if neither the command line nor the config file name one
pub const DEFAULT_PORT: u16 = 5001;

/// listen on all interfaces by default
pub const DEFAULT_BIND_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// seconds open connections get to finish after Ctrl+C
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: f64 = 5.0;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	pub alert_webhook_receiver: AlertReceiverSettings,
	pub log: LogSettings,
}

impl Settings {
	/// Loads the settings from the command line and the optional config file.
	/// Has to be called before [Settings::global].
	pub fn init() -> Result<&'static Self> {
		SETTINGS
			.get_or_try_init(Self::load)
			.context("failed to load config and command line arguments")
	}

	pub fn global() -> &'static Self {
		#[allow(clippy::expect_used)]
		SETTINGS.get().expect("settings are loaded at startup")
	}

	fn load() -> Result<Self> {
		Self::from_matches(&command().get_matches())
	}

	/// Merges defaults, the optional config file and command line arguments,
	/// later sources taking precedence.
	fn from_matches(opts: &ArgMatches) -> Result<Self> {
		let mut conf = Config::builder()
			.set_default("alert_webhook_receiver.bind_address", DEFAULT_BIND_ADDRESS.to_string())?
			.set_default("alert_webhook_receiver.port", i64::from(DEFAULT_PORT))?
			.set_default("alert_webhook_receiver.shutdown_timeout", DEFAULT_SHUTDOWN_TIMEOUT_SECS)?
			.set_default("log.level", DEFAULT_LOG_LEVEL)?;

		if let Some(config_path) = opts.value_of("config") {
			conf = conf.add_source(config::File::with_name(config_path));
		}

		if let Some(port) = opts.value_of("port") {
			let port: u16 = port.parse().context(format!("invalid port {port:?}"))?;
			conf = conf.set_override("alert_webhook_receiver.port", i64::from(port))?;
		}

		if let Some(bind_address) = opts.value_of("bind") {
			conf = conf.set_override("alert_webhook_receiver.bind_address", bind_address)?;
		}

		if let Some(level) = opts.value_of("level") {
			conf = conf.set_override("log.level", level)?;
		}

		let settings: Settings = conf
			.build()
			.context("can't load config")?
			.try_deserialize()
			.context("can't load config")?;

		Ok(settings)
	}
}

/// command line interface
fn command() -> Command<'static> {
	Command::new(clap::crate_name!())
		.version(clap::crate_version!())
		.about(clap::crate_description!())
		.author(clap::crate_authors!())
		.args([
			Arg::new("port")
				.help("port to listen on for alertmanager webhooks [default: 5001]")
				.takes_value(true)
				.index(1),
			Arg::new("bind")
				.help("address to listen on [default: 0.0.0.0]")
				.takes_value(true)
				.short('b')
				.long("bind"),
			Arg::new("config")
				.help("path of an optional config file")
				.takes_value(true)
				.short('c')
				.long("config"),
			Arg::new("level")
				.help("log level")
				.possible_values(["error", "warn", "info", "debug", "trace"])
				.ignore_case(true)
				.takes_value(true)
				.long("log"),
		])
}

#[cfg(test)]
mod tests {
	use std::{fs, net::Ipv6Addr, path::PathBuf, time::Duration};

	use super::*;

	fn settings(args: &[&str]) -> Result<Settings> {
		let opts = command().try_get_matches_from(std::iter::once("alert-receiver").chain(args.iter().copied()))?;
		Settings::from_matches(&opts)
	}

	fn config_file(name: &str, content: &str) -> PathBuf {
		let path = std::env::temp_dir().join(format!("alert-receiver-{}-{name}", std::process::id()));
		fs::write(&path, content).unwrap();
		path
	}

	#[test]
	fn defaults() {
		let settings = settings(&[]).unwrap();

		assert_eq!(settings.alert_webhook_receiver.port, DEFAULT_PORT);
		assert_eq!(settings.alert_webhook_receiver.bind_address, DEFAULT_BIND_ADDRESS);
		assert_eq!(settings.log.level, "warn");
		assert_eq!(settings.alert_webhook_receiver.shutdown_timeout, Duration::from_secs(5));
	}

	#[test]
	fn positional_port() {
		let settings = settings(&["8080"]).unwrap();

		assert_eq!(settings.alert_webhook_receiver.port, 8080);
		assert_eq!(settings.alert_webhook_receiver.to_socket_addr().to_string(), "0.0.0.0:8080");
	}

	#[test]
	fn invalid_port_is_rejected() {
		let err = settings(&["webhook"]).unwrap_err();
		assert_eq!(err.to_string(), "invalid port \"webhook\"");

		assert!(settings(&["70000"]).is_err());
	}

	#[test]
	fn bind_address_and_log_level() {
		let settings = settings(&["--bind", "::1", "--log", "DEBUG", "9000"]).unwrap();

		assert_eq!(settings.alert_webhook_receiver.bind_address, IpAddr::V6(Ipv6Addr::LOCALHOST));
		assert_eq!(settings.alert_webhook_receiver.port, 9000);
		assert_eq!(settings.log.level, "DEBUG");
	}

	#[test]
	fn unknown_log_level_is_rejected() {
		assert!(settings(&["--log", "verbose"]).is_err());
	}

	#[test]
	fn config_file_is_overridden_by_arguments() {
		let path = config_file(
			"override.toml",
			"[alert_webhook_receiver]\nbind_address = \"127.0.0.1\"\nport = 6000\nshutdown_timeout = 1.5\n\n[log]\nlevel = \"info\"\n",
		);
		let path = path.to_str().unwrap();

		let from_file = settings(&["-c", path]).unwrap();
		assert_eq!(from_file.alert_webhook_receiver.bind_address, IpAddr::V4(Ipv4Addr::LOCALHOST));
		assert_eq!(from_file.alert_webhook_receiver.port, 6000);
		assert_eq!(from_file.log.level, "info");
		assert_eq!(from_file.alert_webhook_receiver.shutdown_timeout, Duration::from_millis(1500));

		let overridden = settings(&["-c", path, "7000"]).unwrap();
		assert_eq!(overridden.alert_webhook_receiver.port, 7000);
		assert_eq!(overridden.alert_webhook_receiver.bind_address, IpAddr::V4(Ipv4Addr::LOCALHOST));

		fs::remove_file(path).unwrap();
	}

	#[test]
	fn missing_config_file_is_an_error() {
		assert!(settings(&["-c", "/nonexistent/alert-receiver.toml"]).is_err());
	}
}
