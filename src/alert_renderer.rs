//! Renders alert groups into console reports.
//!
//! Alerts are received from [alertmanager_webhook_receiver](crate::alertmanager_webhook_receiver).
//! A single [AlertRenderer] task owns the console, so every report is written
//! as one uninterrupted block in the order the receiver queued it.

use std::{future::Future, io::Write};

use chrono::{Local, NaiveDateTime};
use serde_json::Value;
use tokio::{sync::mpsc, time::Instant};

use crate::{
	alert::{AlertGroup, AlertRecord},
	rendered_alert::RenderedAlert,
};

/// format of the timestamp in the report header
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// labels already shown in the group summary and therefore left out of the
/// per alert label listing
const GROUP_LEVEL_LABELS: [&str; 4] = ["alertname", "severity", "category", "service"];

#[derive(Debug, Clone)]
pub enum AlertRendererChannelMessage {
	/// render a decoded alert group
	RenderAlert { alert: Box<Value>, arrival: Instant },
	/// a request body couldn't be decoded, print the reason instead of a
	/// report
	RejectPayload { error: String },
}

/// Alert renderer
pub struct AlertRenderer<W> {
	out: W,
}

impl<W: Write> AlertRenderer<W> {
	/// Return new renderer writing into `out`
	pub fn new(out: W) -> Self {
		Self { out }
	}

	/// main loop of [AlertRenderer]
	///
	/// runs until every sender of `rx` is dropped or `closed` resolves. Messages
	/// already queued are written either way, then the writer is handed back.
	///
	/// * `rx` - the channel where we receive alerts to render
	///
	/// * `closed` - stop accepting messages, senders held by abandoned
	///   connections can't keep the renderer alive then
	pub async fn run(
		mut self,
		mut rx: mpsc::Receiver<AlertRendererChannelMessage>,
		closed: impl Future<Output = ()>,
	) -> W {
		tokio::pin!(closed);
		let mut closing = false;

		loop {
			let msg = tokio::select! {
				msg = rx.recv() => msg,
				_ = &mut closed, if !closing => {
					closing = true;
					rx.close();
					continue;
				}
			};

			let msg = match msg {
				Some(msg) => msg,
				None => break,
			};

			match msg {
				AlertRendererChannelMessage::RenderAlert { alert, arrival } => {
					let report = render_alert(&alert, Local::now().naive_local(), arrival);
					self.write(report.as_str());

					tracing::debug!(
						status = %AlertGroup::new(&alert).status(),
						alerts = report.metadata.alert_count,
						queued = ?report.metadata.arrival.elapsed(),
						"printed alert group"
					);
				}
				AlertRendererChannelMessage::RejectPayload { error } => {
					self.write(&format!("❌ Error parsing JSON: {error}\n"));
				}
			}
		}

		self.out
	}

	fn write(&mut self, block: &str) {
		if let Err(err) = self.out.write_all(block.as_bytes()).and_then(|_| self.out.flush()) {
			tracing::error!("failed to write report to console: {}", err);
		}
	}
}

/// Renders an alert group into a report.
///
/// Every field is optional. Missing fields fall back to a default or their
/// line is skipped, so this never fails.
///
/// # Arguments
///
/// * `alert` - decoded webhook payload
///
/// * `received` - local time shown in the report header
///
/// * `arrival` - instant the payload was received
pub fn render_alert(alert: &Value, received: NaiveDateTime, arrival: Instant) -> RenderedAlert {
	let group = AlertGroup::new(alert);
	let alerts = group.alerts();

	let mut out = RenderedAlert::new(arrival);
	out.metadata.alert_count = alerts.len();

	out.blank();
	out.banner();
	out.line(format_args!("🚨 ALERT RECEIVED - {}", received.format(TIMESTAMP_FORMAT)));
	out.banner();

	if let Some(labels) = group.group_labels() {
		out.line(format_args!("📋 Group: {}", labels.get_or("alertname", "Unknown")));
		if let Some(cluster) = labels.get("cluster") {
			out.line(format_args!("🏢 Cluster: {cluster}"));
		}
		if let Some(service) = labels.get("service") {
			out.line(format_args!("🔧 Service: {service}"));
		}
	}

	if let Some(labels) = group.common_labels() {
		let severity = labels.get_or("severity", "unknown");
		out.line(format_args!("⚡ Severity: {}", severity.to_uppercase()));
		out.line(format_args!("📂 Category: {}", labels.get_or("category", "unknown")));
	}

	for (i, record) in alerts.iter().enumerate() {
		render_record(&mut out, i + 1, AlertRecord::new(record));
	}

	out.banner();
	out.line(format_args!("📊 Total alerts in group: {}", alerts.len()));
	out.banner();
	out.blank();

	out
}

/// renders the section of a single alert, `number` starts at 1
fn render_record(out: &mut RenderedAlert, number: usize, alert: AlertRecord<'_>) {
	out.blank();
	out.line(format_args!("🔔 Alert #{number}:"));

	let marker = if alert.is_firing() { "🚨" } else { "✅" };
	out.line(format_args!("   Status: {marker} {}", alert.status().to_uppercase()));

	if let Some(labels) = alert.labels() {
		out.line("   📍 Labels:");
		for (key, value) in labels.iter().filter(|(key, _)| !GROUP_LEVEL_LABELS.contains(key)) {
			out.line(format_args!("      {key}: {value}"));
		}
	}

	// only these four annotations are shown, always in this order
	if let Some(annotations) = alert.annotations() {
		out.line("   📝 Details:");
		if let Some(summary) = annotations.get("summary") {
			out.line(format_args!("      Summary: {summary}"));
		}
		if let Some(description) = annotations.get("description") {
			out.line("      Description:");
			for line in description.split('\n').map(str::trim).filter(|line| !line.is_empty()) {
				out.line(format_args!("        {line}"));
			}
		}
		if let Some(runbook) = annotations.get("runbook_url") {
			out.line(format_args!("      Runbook: {runbook}"));
		}
		if let Some(dashboard) = annotations.get("dashboard_url") {
			out.line(format_args!("      Dashboard: {dashboard}"));
		}
	}

	if let Some(starts_at) = alert.starts_at() {
		out.line(format_args!("   ⏰ Started: {starts_at}"));
	}
	if let Some(ends_at) = alert.ends_at() {
		out.line(format_args!("   ⏹️  Ended: {ends_at}"));
	}
}
