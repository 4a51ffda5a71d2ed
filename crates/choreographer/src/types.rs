use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Time in milliseconds
pub type TimeMs = i64;

/// Upper bound for an authored `delay` or `duration` (one day)
pub const MAX_STEP_MS: TimeMs = 86_400_000;

/// Round a JSON millisecond count, saturating at the `TimeMs` bounds
pub fn millis_from_f64(ms: f64) -> TimeMs {
	if ms.is_nan() {
		return 0;
	}
	ms.round().clamp(TimeMs::MIN as f64, TimeMs::MAX as f64) as TimeMs
}

/// Millisecond fields accept integers or floats
pub(crate) fn deserialize_millis<'de, D>(deserializer: D) -> std::result::Result<TimeMs, D::Error>
where
	D: Deserializer<'de>,
{
	f64::deserialize(deserializer).map(millis_from_f64)
}

pub(crate) fn deserialize_optional_millis<'de, D>(deserializer: D) -> std::result::Result<Option<TimeMs>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<f64>::deserialize(deserializer)?.map(millis_from_f64))
}

/// Unique identifier of a running performance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PerformanceId(pub String);

impl PerformanceId {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for PerformanceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Renderer-side handle of one placed entity instance.
///
/// Several handles may share one semantic name; the resolver fans a name out
/// to all of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityHandle(pub String);

impl EntityHandle {
	pub fn new(handle: impl Into<String>) -> Self {
		Self(handle.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<&str> for EntityHandle {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

impl From<String> for EntityHandle {
	fn from(value: String) -> Self {
		Self(value)
	}
}

impl fmt::Display for EntityHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Named point on the stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
	pub x: f64,
	pub y: f64,
}

impl Position {
	pub fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}
}

impl From<Position> for Value {
	fn from(position: Position) -> Self {
		json!({ "x": position.x, "y": position.y })
	}
}

/// Polyline geometry of a named route
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
	pub points: Vec<Position>,
}

impl Route {
	pub fn new(points: Vec<Position>) -> Self {
		Self { points }
	}
}

impl From<&Route> for Value {
	fn from(route: &Route) -> Self {
		Value::Array(route.points.iter().copied().map(Value::from).collect())
	}
}

/// Progress through an animated action (0.0 to 1.0)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Progress(f64);

impl Progress {
	/// A non-positive duration is already complete
	pub fn new(elapsed: TimeMs, duration: TimeMs) -> Self {
		if duration <= 0 {
			return Self(1.0);
		}
		Self((elapsed as f64 / duration as f64).clamp(0.0, 1.0))
	}

	pub fn value(&self) -> f64 {
		self.0
	}

	pub fn is_complete(&self) -> bool {
		self.0 >= 1.0
	}
}

impl From<f64> for Progress {
	fn from(value: f64) -> Self {
		Self(value.clamp(0.0, 1.0))
	}
}

impl Default for Progress {
	fn default() -> Self {
		Self(0.0)
	}
}
