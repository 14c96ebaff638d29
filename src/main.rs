//! prometheus alertmanager receiver that prints alerts to the console
//!
//! Features:
//! - accepts webhook pushes on any url path
//! - prints every alert group as one human readable report
//! - reports of concurrent requests never interleave

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};

use crate::{alert_renderer::AlertRenderer, settings::Settings};

mod alert;
mod alert_renderer;
mod alertmanager_webhook_receiver;
mod log;
mod rendered_alert;
mod settings;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// resolves on Ctrl+C
async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::error!("failed to listen for Ctrl+C: {}", err);
		std::future::pending::<()>().await;
	}
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	let settings = Settings::init()?;

	log::setup_logging().context("could not setup logging")?;

	let (tx_renderer, rx_renderer) = mpsc::channel(64);
	let (tx_close, rx_close) = oneshot::channel::<()>();

	let alert_renderer = tokio::spawn(AlertRenderer::new(std::io::stdout()).run(rx_renderer, async move {
		let _ = rx_close.await;
	}));

	let served = alertmanager_webhook_receiver::run_prometheus_receiver(
		&settings.alert_webhook_receiver,
		tx_renderer,
		shutdown_signal(),
	)
	.await;

	// abandoned connections may still hold senders, print what's queued and stop
	let _ = tx_close.send(());
	alert_renderer.await.context("alert renderer crashed")?;

	served?;

	println!("\n🛑 Server stopped by user");

	Ok(())
}
