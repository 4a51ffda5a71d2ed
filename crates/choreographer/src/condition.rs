//! `when` clause evaluation.
//!
//! Evaluation never fails: invalid regexes, malformed operators, type mismatches
//! and missing fields all degrade to a non-match.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use tracing::warn;

use crate::definition::{WhenClause, WhenCondition, WhenOperator};
use crate::signal::Signal;

/// An absent clause always matches
pub fn evaluate(clause: Option<&WhenClause>, signal: &Signal) -> bool {
	clause.map_or(true, |clause| clause.matches(signal))
}

impl WhenClause {
	pub fn matches(&self, signal: &Signal) -> bool {
		match self {
			Self::Any(conditions) => conditions.iter().any(|condition| condition.matches(signal)),
			Self::All(condition) => condition.matches(signal),
			Self::Malformed(_) => false,
		}
	}
}

impl WhenCondition {
	pub fn matches(&self, signal: &Signal) -> bool {
		self.0.iter().all(|(path, operator)| {
			let resolved = path.lookup(signal);
			operator.test(resolved.as_deref())
		})
	}
}

impl WhenOperator {
	/// Test a resolved field value; `None` is a missing field
	pub fn test(&self, resolved: Option<&Value>) -> bool {
		if !self.is_well_formed() {
			return false;
		}

		if let Some(expected) = &self.equals {
			if !resolved.is_some_and(|value| strict_equals(value, expected)) {
				return false;
			}
		}

		if let Some(needle) = &self.contains {
			let Some(Value::String(haystack)) = resolved else {
				return false;
			};
			if !haystack.contains(&js_string(Some(needle))) {
				return false;
			}
		}

		if let Some(pattern) = &self.matches {
			if !pattern.is_match(&js_string(resolved)) {
				return false;
			}
		}

		if let Some(bound) = &self.gt {
			if !compare(resolved, bound, |value, bound| value > bound) {
				return false;
			}
		}

		if let Some(bound) = &self.lt {
			if !compare(resolved, bound, |value, bound| value < bound) {
				return false;
			}
		}

		if let Some(expected) = self.exists {
			let present = resolved.is_some_and(|value| !value.is_null());
			if present != expected {
				return false;
			}
		}

		if let Some(inner) = &self.not {
			if inner.test(resolved) {
				return false;
			}
		}

		true
	}
}

/// `matches` operand, compiled once when the operator is built.
///
/// A non-string operand or an invalid regex keeps `regex` empty and never
/// matches.
#[derive(Debug, Clone)]
pub struct Pattern {
	source: Value,
	regex: Option<Regex>,
}

impl Pattern {
	pub fn new(source: Value) -> Self {
		let regex = match source.as_str().map(Regex::new) {
			Some(Ok(regex)) => Some(regex),
			Some(Err(err)) => {
				warn!(pattern = %source, error = %err, "invalid regex in when clause");
				None
			}
			None => None,
		};
		Self { source, regex }
	}

	pub fn source(&self) -> &Value {
		&self.source
	}

	pub fn is_valid(&self) -> bool {
		self.regex.is_some()
	}

	pub fn is_match(&self, haystack: &str) -> bool {
		self.regex.as_ref().is_some_and(|regex| regex.is_match(haystack))
	}
}

impl PartialEq for Pattern {
	fn eq(&self, other: &Self) -> bool {
		self.source == other.source
	}
}

impl Serialize for Pattern {
	fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		self.source.serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for Pattern {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
		Value::deserialize(deserializer).map(Self::new)
	}
}

/// Numbers compare by value so `5` equals `5.0`
fn strict_equals(value: &Value, expected: &Value) -> bool {
	match (value, expected) {
		(Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
		_ => value == expected,
	}
}

fn compare(resolved: Option<&Value>, bound: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
	match (resolved.and_then(Value::as_f64), bound.as_f64()) {
		(Some(value), Some(bound)) => op(value, bound),
		_ => false,
	}
}

/// String coercion used by `matches` and `contains` operands
fn js_string(value: Option<&Value>) -> String {
	match value {
		None => "undefined".to_string(),
		Some(Value::Null) => "null".to_string(),
		Some(Value::Bool(flag)) => flag.to_string(),
		Some(Value::Number(number)) => number_string(number),
		Some(Value::String(text)) => text.clone(),
		Some(Value::Array(items)) => items
			.iter()
			.map(|item| match item {
				Value::Null => String::new(),
				other => js_string(Some(other)),
			})
			.collect::<Vec<_>>()
			.join(","),
		Some(Value::Object(_)) => "[object Object]".to_string(),
	}
}

fn number_string(number: &Number) -> String {
	match number.as_f64() {
		Some(float) if number.is_f64() && float.fract() == 0.0 && float.abs() < 1e15 => format!("{}", float as i64),
		_ => number.to_string(),
	}
}
