//! HTTP endpoint receiving alertmanager webhook pushes.
//!
//! Every path is accepted and handled the same way. Decoded payloads are
//! forwarded to the [AlertRenderer](crate::alert_renderer::AlertRenderer).
use std::{
	future::Future,
	net::{IpAddr, SocketAddr},
	sync::Arc,
	time::Duration,
};

use anyhow::{Context, Result};
use axum::{
	extract::Extension,
	response::{IntoResponse, Response},
	routing::post,
	Router,
};
use bytes::Bytes;
use http::{header::CONTENT_TYPE, StatusCode};
use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use tokio::{
	sync::{mpsc::Sender, oneshot},
	time::Instant,
};

use crate::{
	alert,
	alert_renderer::AlertRendererChannelMessage,
	rendered_alert::BANNER_WIDTH,
};

/// body of every successful response
pub const SUCCESS_BODY: &str = r#"{"status": "success"}"#;

/// paths shown at startup, the receiver doesn't route on them
pub const ADVERTISED_PATHS: [&str; 3] = ["/webhook", "/critical", "/warning"];

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct AlertReceiverSettings {
	pub bind_address: IpAddr,
	pub port: u16,
	/// how long open connections may take to finish after shutdown was
	/// requested before they are cut off
	#[serde_as(as = "DurationSecondsWithFrac<f64>")]
	pub shutdown_timeout: Duration,
}

impl AlertReceiverSettings {
	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}
}

struct State {
	tx: Sender<AlertRendererChannelMessage>,
}

async fn prometheus_receiver(Extension(state): Extension<Arc<State>>, body: Bytes) -> Response {
	let arrival = Instant::now();

	let msg = match alert::decode(&body) {
		Ok(alert) => AlertRendererChannelMessage::RenderAlert { alert: Box::new(alert), arrival },
		Err(err) => {
			tracing::debug!("failed to deserialize alert: {:?}", err);

			if state.tx.send(AlertRendererChannelMessage::RejectPayload { error: err.to_string() }).await.is_err() {
				tracing::error!("alert renderer stopped, can't report rejected payload");
			}

			return StatusCode::BAD_REQUEST.into_response();
		}
	};

	if state.tx.send(msg).await.is_err() {
		tracing::error!("alert renderer stopped, dropping alert group");
	}

	(StatusCode::OK, [(CONTENT_TYPE, "application/json")], SUCCESS_BODY).into_response()
}

/// Builds the receiver's router. There's no request tracing layer, requests
/// are not logged.
///
/// # Arguments
///
/// * `tx` - channel to the alert renderer
pub fn router(tx: Sender<AlertRendererChannelMessage>) -> Router {
	let state = Arc::new(State { tx });

	Router::new().fallback(post(prometheus_receiver)).layer(Extension(state))
}

/// text printed once the receiver is listening
pub fn startup_banner(port: u16) -> String {
	let mut banner = format!(
		"🚀 Alert Webhook Receiver started on port {port}\n📡 Listening for alerts at:\n"
	);
	for path in ADVERTISED_PATHS {
		banner.push_str(&format!("   - http://localhost:{port}{path}\n"));
	}
	banner.push_str("\n💡 Press Ctrl+C to stop the server\n");
	banner.push_str(&"=".repeat(BANNER_WIDTH));

	banner
}

/// Runs the receiver until `shutdown` resolves. In-flight requests get
/// [AlertReceiverSettings::shutdown_timeout] to finish, connections still open
/// after that are abandoned. The listening socket is released on every return
/// path.
///
/// # Arguments
///
/// * `settings` - address to listen on
///
/// * `tx` - channel to the alert renderer
///
/// * `shutdown` - resolves when the receiver should stop
pub async fn run_prometheus_receiver(
	settings: &AlertReceiverSettings,
	tx: Sender<AlertRendererChannelMessage>,
	shutdown: impl Future<Output = ()>,
) -> Result<()> {
	let addr = settings.to_socket_addr();

	let server = axum::Server::try_bind(&addr)
		.with_context(|| format!("failed to bind alert webhook receiver to {addr}"))?
		.serve(router(tx).into_make_service());

	println!("{}", startup_banner(server.local_addr().port()));
	tracing::info!("alert webhook receiver listening on {}", server.local_addr());

	let (tx_signalled, rx_signalled) = oneshot::channel();
	let graceful = server.with_graceful_shutdown(async move {
		shutdown.await;
		let _ = tx_signalled.send(());
	});

	// starts counting once shutdown was requested
	let drain_deadline = async {
		match rx_signalled.await {
			Ok(()) => tokio::time::sleep(settings.shutdown_timeout).await,
			Err(_) => std::future::pending().await,
		}
	};

	tokio::select! {
		res = graceful => res.context("alert webhook receiver crashed")?,
		_ = drain_deadline => {
			tracing::warn!(
				"connections still open {:?} after shutdown was requested, closing them",
				settings.shutdown_timeout
			);
		}
	}

	Ok(())
}
