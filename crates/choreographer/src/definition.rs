//! Authored choreography documents.
//!
//! Definitions are plain serde data in the editor's JSON shape:
//!
//! ```json
//! { "on": "tool_call",
//!   "when": { "signal.payload.toolName": { "equals": "Read" } },
//!   "steps": [
//!     { "action": "move", "entity": "signal.payload.from", "target": "workstation-1", "duration": 800, "easing": "easeOut" },
//!     { "action": "flash", "entity": "signal.payload.from", "params": { "color": "#ff0" } }
//!   ] }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

use crate::condition::Pattern;
use crate::error::{ChoreographyError, Result};
use crate::signal::FieldPath;
use crate::types::{deserialize_optional_millis, TimeMs, MAX_STEP_MS};

/// Immutable description of a trigger and the steps it performs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoreographyDefinition {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	pub on: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub when: Option<WhenClause>,
	#[serde(default)]
	pub interrupts: bool,
	#[serde(default)]
	pub steps: Vec<ChoreographyStep>,
}

impl ChoreographyDefinition {
	pub fn new(on: impl Into<String>) -> Self {
		Self {
			name: None,
			on: on.into(),
			when: None,
			interrupts: false,
			steps: Vec::new(),
		}
	}

	pub fn named(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn when(mut self, clause: WhenClause) -> Self {
		self.when = Some(clause);
		self
	}

	pub fn interrupting(mut self) -> Self {
		self.interrupts = true;
		self
	}

	pub fn step(mut self, step: impl Into<ChoreographyStep>) -> Self {
		self.steps.push(step.into());
		self
	}

	/// Display label: the authored name, falling back to the trigger type
	pub fn label(&self) -> &str {
		self.name.as_deref().unwrap_or(&self.on)
	}

	pub fn validate(&self) -> Result<()> {
		if self.on.trim().is_empty() {
			return Err(self.invalid("trigger signal type 'on' is empty"));
		}
		validate_steps(&self.steps).map_err(|reason| self.invalid(reason))
	}

	/// Parse a definitions document: either a bare array or `{ "choreographies": [...] }`
	pub fn parse_many(json: &str) -> Result<Vec<Self>> {
		let document: DefinitionsDocument = serde_json::from_str(json).map_err(ChoreographyError::parse("choreography definitions"))?;
		Ok(document.into_definitions())
	}

	pub fn load_many(path: impl AsRef<Path>) -> Result<Vec<Self>> {
		let path = path.as_ref();
		let raw = std::fs::read_to_string(path).map_err(ChoreographyError::io(path))?;
		Self::parse_many(&raw)
	}

	fn invalid(&self, reason: impl Into<String>) -> ChoreographyError {
		ChoreographyError::InvalidDefinition {
			name: self.label().to_string(),
			reason: reason.into(),
		}
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DefinitionsDocument {
	List(Vec<ChoreographyDefinition>),
	Wrapped { choreographies: Vec<ChoreographyDefinition> },
}

impl DefinitionsDocument {
	fn into_definitions(self) -> Vec<ChoreographyDefinition> {
		match self {
			Self::List(definitions) | Self::Wrapped { choreographies: definitions } => definitions,
		}
	}
}

fn validate_steps(steps: &[ChoreographyStep]) -> std::result::Result<(), String> {
	for step in steps {
		match step {
			ChoreographyStep::Action(action) => action.validate()?,
			ChoreographyStep::Parallel { parallel: children } | ChoreographyStep::OnArrive { on_arrive: children } | ChoreographyStep::OnInterrupt { on_interrupt: children } => validate_steps(children)?,
		}
	}
	Ok(())
}

/// One entry of a step list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoreographyStep {
	Action(ActionStep),
	Parallel {
		parallel: Vec<ChoreographyStep>,
	},
	OnArrive {
		#[serde(rename = "onArrive")]
		on_arrive: Vec<ChoreographyStep>,
	},
	OnInterrupt {
		#[serde(rename = "onInterrupt")]
		on_interrupt: Vec<ChoreographyStep>,
	},
}

impl ChoreographyStep {
	pub fn parallel(children: Vec<ChoreographyStep>) -> Self {
		Self::Parallel { parallel: children }
	}

	pub fn on_arrive(children: Vec<ChoreographyStep>) -> Self {
		Self::OnArrive { on_arrive: children }
	}

	pub fn on_interrupt(children: Vec<ChoreographyStep>) -> Self {
		Self::OnInterrupt { on_interrupt: children }
	}
}

impl From<ActionStep> for ChoreographyStep {
	fn from(step: ActionStep) -> Self {
		Self::Action(step)
	}
}

/// A named operation for the sink, optionally delayed and animated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStep {
	pub action: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub entity: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub target: Option<String>,
	#[serde(default, deserialize_with = "deserialize_optional_millis", skip_serializing_if = "Option::is_none")]
	pub delay: Option<TimeMs>,
	/// Absent means the action is instantaneous
	#[serde(default, deserialize_with = "deserialize_optional_millis", skip_serializing_if = "Option::is_none")]
	pub duration: Option<TimeMs>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub easing: Option<String>,
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub params: Map<String, Value>,
}

impl ActionStep {
	pub fn new(action: impl Into<String>) -> Self {
		Self {
			action: action.into(),
			entity: None,
			target: None,
			delay: None,
			duration: None,
			easing: None,
			params: Map::new(),
		}
	}

	pub fn on_entity(mut self, entity: impl Into<String>) -> Self {
		self.entity = Some(entity.into());
		self
	}

	pub fn toward(mut self, target: impl Into<String>) -> Self {
		self.target = Some(target.into());
		self
	}

	pub fn with_delay(mut self, delay: TimeMs) -> Self {
		self.delay = Some(delay);
		self
	}

	pub fn with_duration(mut self, duration: TimeMs) -> Self {
		self.duration = Some(duration);
		self
	}

	pub fn with_easing(mut self, easing: impl Into<String>) -> Self {
		self.easing = Some(easing.into());
		self
	}

	pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.params.insert(key.into(), value.into());
		self
	}

	fn validate(&self) -> std::result::Result<(), String> {
		if self.action.trim().is_empty() {
			return Err("action step has an empty action name".to_string());
		}
		if self.delay.is_some_and(|delay| delay < 0) {
			return Err(format!("action '{}' has a negative delay", self.action));
		}
		if self.duration.is_some_and(|duration| duration < 0) {
			return Err(format!("action '{}' has a negative duration", self.action));
		}
		if self.delay.is_some_and(|delay| delay > MAX_STEP_MS) {
			return Err(format!("action '{}' has a delay longer than {MAX_STEP_MS} ms", self.action));
		}
		if self.duration.is_some_and(|duration| duration > MAX_STEP_MS) {
			return Err(format!("action '{}' has a duration longer than {MAX_STEP_MS} ms", self.action));
		}
		Ok(())
	}
}

/// Filter gating whether a definition triggers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WhenClause {
	/// OR over conditions
	Any(Vec<WhenCondition>),
	/// AND over field paths
	All(WhenCondition),
	/// Any other shape; never matches
	Malformed(Value),
}

/// Field path → operator, all entries AND-combined
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WhenCondition(pub BTreeMap<FieldPath, WhenOperator>);

impl WhenCondition {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn field(mut self, path: &str, operator: WhenOperator) -> Self {
		self.0.insert(FieldPath::parse(path), operator);
		self
	}
}

/// Operator object; every key present must hold.
///
/// Deserialization never fails: unknown keys, non-object operators and
/// operands of the wrong type are kept in `rejected` and make the operator
/// a non-match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct WhenOperator {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub equals: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub contains: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub matches: Option<Pattern>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub gt: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub lt: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub exists: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub not: Option<Box<WhenOperator>>,
	#[serde(flatten, skip_serializing_if = "Map::is_empty")]
	pub rejected: Map<String, Value>,
}

impl WhenOperator {
	pub fn equals(value: impl Into<Value>) -> Self {
		Self {
			equals: Some(value.into()),
			..Self::default()
		}
	}

	pub fn contains(needle: impl Into<String>) -> Self {
		Self {
			contains: Some(Value::String(needle.into())),
			..Self::default()
		}
	}

	pub fn matches(pattern: impl Into<String>) -> Self {
		Self {
			matches: Some(Pattern::new(Value::String(pattern.into()))),
			..Self::default()
		}
	}

	pub fn exists(expected: bool) -> Self {
		Self {
			exists: Some(expected),
			..Self::default()
		}
	}

	pub fn not(inner: WhenOperator) -> Self {
		Self {
			not: Some(Box::new(inner)),
			..Self::default()
		}
	}

	pub fn and_gt(mut self, bound: impl Into<Value>) -> Self {
		self.gt = Some(bound.into());
		self
	}

	pub fn and_lt(mut self, bound: impl Into<Value>) -> Self {
		self.lt = Some(bound.into());
		self
	}

	/// False when any key, operand or pattern was unusable, at any depth
	pub fn is_well_formed(&self) -> bool {
		self.rejected.is_empty() && self.matches.as_ref().map_or(true, Pattern::is_valid) && self.not.as_deref().map_or(true, Self::is_well_formed)
	}
}

impl From<Value> for WhenOperator {
	fn from(value: Value) -> Self {
		let mut operator = Self::default();
		let Value::Object(entries) = value else {
			operator.rejected.insert("operator".to_string(), value);
			return operator;
		};

		for (key, operand) in entries {
			match key.as_str() {
				"equals" => operator.equals = Some(operand),
				"contains" => operator.contains = Some(operand),
				"matches" => operator.matches = Some(Pattern::new(operand)),
				"gt" => operator.gt = Some(operand),
				"lt" => operator.lt = Some(operand),
				"exists" => match operand {
					Value::Bool(expected) => operator.exists = Some(expected),
					other => {
						operator.rejected.insert(key, other);
					}
				},
				"not" => match operand {
					inner @ Value::Object(_) => operator.not = Some(Box::new(Self::from(inner))),
					other => {
						operator.rejected.insert(key, other);
					}
				},
				_ => {
					operator.rejected.insert(key, operand);
				}
			}
		}

		if !operator.rejected.is_empty() {
			let keys: Vec<&str> = operator.rejected.keys().map(String::as_str).collect();
			warn!(?keys, "when operator has unusable entries and will never match");
		}
		operator
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use serde_json::json;

	#[test]
	fn parses_editor_document() {
		let definition: ChoreographyDefinition = serde_json::from_value(json!({
			"on": "tool_call",
			"when": { "signal.payload.toolName": { "equals": "Read" } },
			"interrupts": false,
			"steps": [
				{ "action": "move", "entity": "signal.payload.from", "target": "workstation-1", "duration": 800, "easing": "easeOut" },
				{ "action": "flash", "entity": "signal.payload.from", "params": { "color": "#ff0" } }
			]
		}))
		.unwrap();

		let expected = ChoreographyDefinition::new("tool_call")
			.when(WhenClause::All(WhenCondition::new().field("signal.payload.toolName", WhenOperator::equals("Read"))))
			.step(ActionStep::new("move").on_entity("signal.payload.from").toward("workstation-1").with_duration(800).with_easing("easeOut"))
			.step(ActionStep::new("flash").on_entity("signal.payload.from").with_param("color", "#ff0"));

		assert_eq!(definition, expected);
	}

	#[test]
	fn parses_structural_steps() {
		let definition: ChoreographyDefinition = serde_json::from_value(json!({
			"on": "handoff",
			"steps": [
				{ "parallel": [{ "action": "pulse", "duration": 200 }, { "action": "playSound", "params": { "clip": "ding" } }] },
				{ "action": "move", "duration": 500 },
				{ "onArrive": [{ "action": "emote" }] },
				{ "onInterrupt": [{ "action": "fade", "duration": 100 }] }
			]
		}))
		.unwrap();

		assert!(matches!(&definition.steps[0], ChoreographyStep::Parallel { parallel } if parallel.len() == 2));
		assert!(matches!(&definition.steps[1], ChoreographyStep::Action(step) if step.action == "move"));
		assert!(matches!(&definition.steps[2], ChoreographyStep::OnArrive { on_arrive } if on_arrive.len() == 1));
		assert!(matches!(&definition.steps[3], ChoreographyStep::OnInterrupt { on_interrupt } if on_interrupt.len() == 1));
	}

	#[test]
	fn millis_accept_floats() {
		let step: ActionStep = serde_json::from_value(json!({ "action": "move", "delay": 12.6, "duration": 800.0 })).unwrap();
		assert_eq!(step.delay, Some(13));
		assert_eq!(step.duration, Some(800));
	}

	#[test]
	fn equals_null_is_kept_as_operand() {
		let operator: WhenOperator = serde_json::from_value(json!({ "equals": null })).unwrap();
		assert_eq!(operator.equals, Some(Value::Null));

		let operator: WhenOperator = serde_json::from_value(json!({ "exists": true })).unwrap();
		assert_eq!(operator.equals, None);
	}

	#[test]
	fn when_array_form_is_any() {
		let clause: WhenClause = serde_json::from_value(json!([{ "signal.payload.a": { "exists": true } }, { "signal.payload.b": { "exists": true } }])).unwrap();
		assert!(matches!(clause, WhenClause::Any(conditions) if conditions.len() == 2));
	}

	#[test]
	fn validation_rejects_empty_trigger_and_negative_timing() {
		assert!(ChoreographyDefinition::new("  ").validate().is_err());

		let negative = ChoreographyDefinition::new("error").step(ChoreographyStep::parallel(vec![ActionStep::new("flash").with_delay(-5).into()]));
		let err = negative.validate().unwrap_err();
		assert!(err.to_string().contains("negative delay"), "{err}");

		let ok = ChoreographyDefinition::new("error").step(ActionStep::new("flash").with_duration(300));
		assert!(ok.validate().is_ok());
	}

	#[test]
	fn validation_caps_step_timing() {
		let definitions = ChoreographyDefinition::parse_many(r#"[{ "on": "error", "steps": [{ "action": "flash", "delay": 1e19 }] }]"#).unwrap();
		assert_eq!(definitions[0].steps[0], ChoreographyStep::Action(ActionStep::new("flash").with_delay(TimeMs::MAX)));

		let err = definitions[0].validate().unwrap_err();
		assert!(err.to_string().contains("delay longer than"), "{err}");

		let long = ChoreographyDefinition::new("error").step(ActionStep::new("move").with_duration(MAX_STEP_MS + 1));
		assert!(long.validate().is_err());
		assert!(ChoreographyDefinition::new("error").step(ActionStep::new("move").with_duration(MAX_STEP_MS)).validate().is_ok());
	}

	#[test]
	fn parses_wrapped_and_bare_documents() {
		let bare = ChoreographyDefinition::parse_many(r#"[{ "on": "a" }, { "on": "b" }]"#).unwrap();
		let wrapped = ChoreographyDefinition::parse_many(r#"{ "choreographies": [{ "on": "a" }, { "on": "b" }] }"#).unwrap();
		assert_eq!(bare, wrapped);
		assert!(ChoreographyDefinition::parse_many("{ nope").is_err());
	}
}
