//! views into incoming alertmanager webhook payloads
//!
//! Payloads aren't validated against a schema. The body is decoded into a
//! generic [Value] tree and every field is looked up on demand, each call
//! site choosing its own fallback.
use std::borrow::Cow;

use serde_json::{Map, Value};
use thiserror::Error;

/// `endsAt` value alertmanager sends for alerts which haven't ended yet
pub const UNSET_TIMESTAMP: &str = "0001-01-01T00:00:00Z";

/// Error occuring when decoding a webhook request body
#[derive(Error, Debug)]
pub enum PayloadError {
	/// the body is not valid utf-8
	#[error("body is not valid utf-8: {0}")]
	Utf8(#[from] std::str::Utf8Error),
	/// the body is not valid json
	#[error("{0}")]
	Json(#[from] serde_json::Error),
	/// valid json, but the top level value is an array, string, number, ...
	#[error("payload is not a JSON object (found {0})")]
	NotAnObject(&'static str),
}

/// Decodes a request body into an alert group.
///
/// # Arguments
///
/// * `body` - raw request body
pub fn decode(body: &[u8]) -> Result<Value, PayloadError> {
	let text = std::str::from_utf8(body)?;
	let value: Value = serde_json::from_str(text)?;

	if !value.is_object() {
		return Err(PayloadError::NotAnObject(kind(&value)));
	}

	Ok(value)
}

/// name of the json type of `value`, used in error messages
fn kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}

/// Text of a scalar. Strings are shown without quotes, everything else as
/// compact json.
pub fn display(value: &Value) -> Cow<'_, str> {
	match value {
		Value::String(s) => Cow::Borrowed(s.as_str()),
		other => Cow::Owned(other.to_string()),
	}
}

/// a string to string mapping like `labels` or `annotations`
#[derive(Debug, Clone, Copy)]
pub struct Labels<'a>(&'a Map<String, Value>);

impl<'a> Labels<'a> {
	/// value of `key` if present
	pub fn get(&self, key: &str) -> Option<Cow<'a, str>> {
		self.0.get(key).map(display)
	}

	/// value of `key` or `default` if absent
	pub fn get_or(&self, key: &str, default: &'a str) -> Cow<'a, str> {
		self.get(key).unwrap_or(Cow::Borrowed(default))
	}

	/// all key value pairs in document order
	pub fn iter(&self) -> impl Iterator<Item = (&'a str, Cow<'a, str>)> + 'a {
		let map = self.0;
		map.iter().map(|(k, v)| (k.as_str(), display(v)))
	}
}

/// Looks up a mapping field. Missing, empty or non-object fields yield
/// [None] so callers can skip the whole section.
fn labels<'a>(object: Option<&'a Map<String, Value>>, key: &str) -> Option<Labels<'a>> {
	match object?.get(key)? {
		Value::Object(map) if !map.is_empty() => Some(Labels(map)),
		_ => None,
	}
}

/// a decoded alert group as sent by alertmanager
#[derive(Debug, Clone, Copy)]
pub struct AlertGroup<'a> {
	/// [None] if the payload isn't an object, all lookups fall back then
	object: Option<&'a Map<String, Value>>,
}

impl<'a> AlertGroup<'a> {
	pub fn new(value: &'a Value) -> Self {
		Self { object: value.as_object() }
	}

	/// overall status of the group
	pub fn status(&self) -> Cow<'a, str> {
		self.object
			.and_then(|o| o.get("status"))
			.map(display)
			.unwrap_or(Cow::Borrowed("unknown"))
	}

	pub fn group_labels(&self) -> Option<Labels<'a>> {
		labels(self.object, "groupLabels")
	}

	pub fn common_labels(&self) -> Option<Labels<'a>> {
		labels(self.object, "commonLabels")
	}

	/// alert records in document order, empty if `alerts` is missing or not
	/// an array
	pub fn alerts(&self) -> &'a [Value] {
		self.object
			.and_then(|o| o.get("alerts"))
			.and_then(Value::as_array)
			.map(Vec::as_slice)
			.unwrap_or(&[])
	}
}

/// a single alert of an [AlertGroup]
#[derive(Debug, Clone, Copy)]
pub struct AlertRecord<'a> {
	object: Option<&'a Map<String, Value>>,
}

impl<'a> AlertRecord<'a> {
	pub fn new(value: &'a Value) -> Self {
		Self { object: value.as_object() }
	}

	fn field(&self, key: &str) -> Option<&'a Value> {
		self.object.and_then(|o| o.get(key))
	}

	/// only the exact status `firing` counts as firing
	pub fn is_firing(&self) -> bool {
		matches!(self.field("status"), Some(Value::String(s)) if s == "firing")
	}

	pub fn status(&self) -> Cow<'a, str> {
		self.field("status")
			.map(display)
			.unwrap_or(Cow::Borrowed("unknown"))
	}

	pub fn labels(&self) -> Option<Labels<'a>> {
		labels(self.object, "labels")
	}

	pub fn annotations(&self) -> Option<Labels<'a>> {
		labels(self.object, "annotations")
	}

	pub fn starts_at(&self) -> Option<Cow<'a, str>> {
		self.field("startsAt").map(display)
	}

	/// `endsAt` unless it's the [UNSET_TIMESTAMP] sentinel
	pub fn ends_at(&self) -> Option<Cow<'a, str>> {
		match self.field("endsAt") {
			Some(Value::String(s)) if s == UNSET_TIMESTAMP => None,
			other => other.map(display),
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn decode_accepts_objects() {
		let value = decode(br#"{"status":"firing"}"#).unwrap();
		assert_eq!(AlertGroup::new(&value).status(), "firing");
	}

	#[test]
	fn decode_rejects_garbage() {
		assert!(matches!(decode(b"not-json"), Err(PayloadError::Json(_))));
		assert!(matches!(decode(b""), Err(PayloadError::Json(_))));
	}

	#[test]
	fn decode_rejects_invalid_utf8() {
		assert!(matches!(decode(&[b'{', 0xff, b'}']), Err(PayloadError::Utf8(_))));
	}

	#[test]
	fn decode_rejects_non_objects() {
		let err = decode(b"[1, 2]").unwrap_err();
		assert!(matches!(err, PayloadError::NotAnObject("an array")));
		assert_eq!(err.to_string(), "payload is not a JSON object (found an array)");

		assert!(matches!(decode(b"42"), Err(PayloadError::NotAnObject("a number"))));
	}

	#[test]
	fn empty_or_mistyped_mappings_are_absent() {
		let value = json!({
			"groupLabels": {},
			"commonLabels": "severity=critical",
		});
		let group = AlertGroup::new(&value);

		assert!(group.group_labels().is_none());
		assert!(group.common_labels().is_none());
	}

	#[test]
	fn alerts_default_to_empty() {
		let missing = json!({});
		let mistyped = json!({"alerts": {"status": "firing"}});

		assert!(AlertGroup::new(&missing).alerts().is_empty());
		assert!(AlertGroup::new(&mistyped).alerts().is_empty());
	}

	#[test]
	fn label_iteration_keeps_document_order() {
		let value: Value =
			serde_json::from_str(r#"{"labels": {"zone": "b", "instance": "a", "job": "c"}}"#)
				.unwrap();
		let labels = AlertRecord::new(&value).labels().unwrap();
		let keys: Vec<_> = labels.iter().map(|(k, _)| k).collect();

		assert_eq!(keys, ["zone", "instance", "job"]);
	}

	#[test]
	fn non_string_values_are_displayed_as_json() {
		let value = json!({"labels": {"port": 9090, "up": true, "none": null}});
		let labels = AlertRecord::new(&value).labels().unwrap();

		assert_eq!(labels.get("port").unwrap(), "9090");
		assert_eq!(labels.get("up").unwrap(), "true");
		assert_eq!(labels.get("none").unwrap(), "null");
		assert_eq!(labels.get_or("missing", "unknown"), "unknown");
	}

	#[test]
	fn firing_requires_exact_status() {
		assert!(AlertRecord::new(&json!({"status": "firing"})).is_firing());
		assert!(!AlertRecord::new(&json!({"status": "Firing"})).is_firing());
		assert!(!AlertRecord::new(&json!({})).is_firing());
		assert!(!AlertRecord::new(&json!("firing")).is_firing());
		assert_eq!(AlertRecord::new(&json!({})).status(), "unknown");
	}

	#[test]
	fn unset_end_is_suppressed() {
		let unset = json!({"endsAt": UNSET_TIMESTAMP});
		let ended = json!({"endsAt": "2024-05-01T10:00:00Z"});

		assert!(AlertRecord::new(&unset).ends_at().is_none());
		assert_eq!(AlertRecord::new(&ended).ends_at().unwrap(), "2024-05-01T10:00:00Z");
		assert!(AlertRecord::new(&json!({})).ends_at().is_none());
	}
}
