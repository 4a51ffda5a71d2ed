use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::path::Path;

use crate::error::{ChoreographyError, Result};
use crate::types::{deserialize_millis, TimeMs};

const ROOT: &str = "signal";

/// Inbound signal envelope produced by an agent-activity source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub payload: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub correlation_id: Option<String>,
	/// Fractional timestamps are rounded to whole milliseconds
	#[serde(default, deserialize_with = "deserialize_millis")]
	pub timestamp: TimeMs,
}

impl Signal {
	pub fn new(kind: impl Into<String>, payload: Value) -> Self {
		Self {
			kind: kind.into(),
			payload,
			correlation_id: None,
			timestamp: 0,
		}
	}

	pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
		self.correlation_id = Some(correlation_id.into());
		self
	}

	pub fn at(mut self, timestamp: TimeMs) -> Self {
		self.timestamp = timestamp;
		self
	}

	/// Look up a dotted path such as `signal.payload.from`
	pub fn field(&self, path: &FieldPath) -> Option<Cow<'_, Value>> {
		path.lookup(self)
	}

	/// Parse a recorded signal script, ordered by `timestamp` (stable for ties)
	pub fn parse_script(json: &str) -> Result<Vec<Self>> {
		let mut signals: Vec<Self> = serde_json::from_str(json).map_err(ChoreographyError::parse("signal script"))?;
		signals.sort_by_key(|signal| signal.timestamp);
		Ok(signals)
	}

	pub fn load_script(path: impl AsRef<Path>) -> Result<Vec<Self>> {
		let path = path.as_ref();
		let raw = std::fs::read_to_string(path).map_err(ChoreographyError::io(path))?;
		Self::parse_script(&raw)
	}
}

/// Pre-parsed dotted path into a signal envelope.
///
/// The first segment must be `signal`; the second selects `type`, `payload`,
/// `correlationId` or `timestamp`; remaining segments walk object keys or
/// array indices. Any miss resolves to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FieldPath {
	raw: String,
	segments: Vec<String>,
}

impl FieldPath {
	pub fn parse(raw: &str) -> Self {
		Self {
			raw: raw.to_string(),
			segments: raw.split('.').map(str::to_string).collect(),
		}
	}

	/// Parse `reference` only if it is a `signal.*` placeholder
	pub fn placeholder(reference: &str) -> Option<Self> {
		let is_placeholder = reference == ROOT || reference.strip_prefix(ROOT).is_some_and(|rest| rest.starts_with('.'));
		is_placeholder.then(|| Self::parse(reference))
	}

	pub fn as_str(&self) -> &str {
		&self.raw
	}

	pub fn lookup<'a>(&self, signal: &'a Signal) -> Option<Cow<'a, Value>> {
		let mut segments = self.segments.iter().map(String::as_str);

		if segments.next() != Some(ROOT) {
			return None;
		}

		let Some(field) = segments.next() else {
			return serde_json::to_value(signal).ok().map(Cow::Owned);
		};

		let base = match field {
			"type" => Cow::Owned(Value::String(signal.kind.clone())),
			"payload" => Cow::Borrowed(&signal.payload),
			"correlationId" => Cow::Owned(Value::String(signal.correlation_id.clone()?)),
			"timestamp" => Cow::Owned(Value::from(signal.timestamp)),
			_ => return None,
		};

		segments.try_fold(base, descend)
	}
}

fn descend<'a>(value: Cow<'a, Value>, segment: &str) -> Option<Cow<'a, Value>> {
	match value {
		Cow::Borrowed(value) => child(value, segment).map(Cow::Borrowed),
		Cow::Owned(value) => child(&value, segment).cloned().map(Cow::Owned),
	}
}

fn child<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
	match value {
		Value::Object(map) => map.get(segment),
		Value::Array(items) => segment.parse::<usize>().ok().and_then(|index| items.get(index)),
		_ => None,
	}
}

impl From<String> for FieldPath {
	fn from(raw: String) -> Self {
		Self::parse(&raw)
	}
}

impl From<&str> for FieldPath {
	fn from(raw: &str) -> Self {
		Self::parse(raw)
	}
}

impl From<FieldPath> for String {
	fn from(path: FieldPath) -> Self {
		path.raw
	}
}

impl fmt::Display for FieldPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.raw)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn script_is_sorted_by_offset() {
		let script = Signal::parse_script(
			r#"[
				{ "type": "tool_result", "timestamp": 900, "correlationId": "c1" },
				{ "type": "tool_call", "timestamp": 100, "payload": { "from": "agent-1" }, "correlationId": "c1" },
				{ "type": "agent_spawn" }
			]"#,
		)
		.unwrap();

		let kinds: Vec<&str> = script.iter().map(|signal| signal.kind.as_str()).collect();
		assert_eq!(kinds, vec!["agent_spawn", "tool_call", "tool_result"]);
		assert_eq!(script[0].payload, Value::Null);
	}

	#[test]
	fn fractional_timestamps_round_to_millis() {
		let script = Signal::parse_script(r#"[{ "type": "error", "payload": {}, "timestamp": 1234.5 }, { "type": "tool_call", "timestamp": 99.2 }]"#).unwrap();

		let stamps: Vec<TimeMs> = script.iter().map(|signal| signal.timestamp).collect();
		assert_eq!(stamps, vec![99, 1235]);
	}

	fn tool_call() -> Signal {
		Signal::new("tool_call", json!({ "toolName": "Read", "from": "agent-1", "files": ["a.rs", "b.rs"], "meta": { "depth": 2 } })).with_correlation("c1")
	}

	#[test]
	fn resolves_envelope_fields() {
		let signal = tool_call();
		assert_eq!(signal.field(&"signal.type".into()).as_deref(), Some(&json!("tool_call")));
		assert_eq!(signal.field(&"signal.correlationId".into()).as_deref(), Some(&json!("c1")));
		assert_eq!(signal.field(&"signal.timestamp".into()).as_deref(), Some(&json!(0)));
	}

	#[test]
	fn walks_nested_payload_and_arrays() {
		let signal = tool_call();
		assert_eq!(signal.field(&"signal.payload.meta.depth".into()).as_deref(), Some(&json!(2)));
		assert_eq!(signal.field(&"signal.payload.files.1".into()).as_deref(), Some(&json!("b.rs")));
	}

	#[test]
	fn missing_paths_resolve_to_none() {
		let signal = Signal::new("error", json!({ "from": "agent-1" }));
		assert!(signal.field(&"signal.payload.missing".into()).is_none());
		assert!(signal.field(&"signal.payload.from.deeper".into()).is_none());
		assert!(signal.field(&"signal.correlationId".into()).is_none());
		assert!(signal.field(&"payload.from".into()).is_none());
		assert!(signal.field(&"signal.nope".into()).is_none());
	}

	#[test]
	fn placeholder_requires_signal_root() {
		assert!(FieldPath::placeholder("signal.payload.from").is_some());
		assert!(FieldPath::placeholder("signals-tower").is_none());
		assert!(FieldPath::placeholder("workstation-1").is_none());
	}

	#[test]
	fn deserializes_envelope_with_defaults() {
		let signal: Signal = serde_json::from_value(json!({ "type": "error" })).unwrap();
		assert_eq!(signal.kind, "error");
		assert_eq!(signal.payload, Value::Null);
		assert_eq!(signal.correlation_id, None);
		assert_eq!(signal.timestamp, 0);
	}
}
