//! A rendered alert group is a block of console lines. The block is always
//! written in one piece so reports of concurrent requests never interleave.

use std::fmt::{self, Write};

use tokio::time::Instant;

/// width of the `=====` separators framing a report
pub const BANNER_WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
/// metadata of a rendered report
pub struct RenderedAlertMetadata {
	/// point in time the alert group was received by the webhook receiver
	pub arrival: Instant,
	/// number of alert records in the group
	pub alert_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// report text together with [RenderedAlertMetadata]
pub struct RenderedAlert {
	pub metadata: RenderedAlertMetadata,
	/// the finished lines, each terminated by `\n`
	content: String,
}

impl RenderedAlert {
	/// Constructs an empty report
	///
	/// # Arguments
	///
	/// * `arrival` - instant the alert group was received
	pub fn new(arrival: Instant) -> Self {
		Self { metadata: RenderedAlertMetadata { arrival, alert_count: 0 }, content: String::new() }
	}

	/// append a single line
	pub fn line(&mut self, text: impl fmt::Display) {
		// writing into a String can't fail
		let _ = writeln!(self.content, "{text}");
	}

	/// append an empty line
	pub fn blank(&mut self) {
		self.content.push('\n');
	}

	/// append a `=====` separator line
	pub fn banner(&mut self) {
		self.line("=".repeat(BANNER_WIDTH));
	}

	pub fn as_str(&self) -> &str {
		&self.content
	}

	/// the report's lines without their terminators
	#[cfg(test)]
	pub fn lines(&self) -> impl Iterator<Item = &str> {
		self.content.lines()
	}
}
