use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, trace};

use crate::types::{EntityHandle, PerformanceId};

/// Resolved parameters handed to the sink
pub type Params = Map<String, Value>;

/// Output boundary of the scheduler.
///
/// Called synchronously from inside a tick, once per resolved entity instance
/// (`entity` is `None` when the step names no entity). Implementations must
/// not block; asynchronous work is fire-and-forget on their side.
pub trait CommandSink {
	fn on_action_start(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str, params: &Params);

	fn on_action_update(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str, progress: f64);

	fn on_action_complete(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str);

	fn on_action_execute(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str, params: &Params);

	fn on_interrupt(&mut self, performance: &PerformanceId);
}

impl<S: CommandSink + ?Sized> CommandSink for &mut S {
	fn on_action_start(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str, params: &Params) {
		(**self).on_action_start(performance, entity, action, params);
	}

	fn on_action_update(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str, progress: f64) {
		(**self).on_action_update(performance, entity, action, progress);
	}

	fn on_action_complete(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str) {
		(**self).on_action_complete(performance, entity, action);
	}

	fn on_action_execute(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str, params: &Params) {
		(**self).on_action_execute(performance, entity, action, params);
	}

	fn on_interrupt(&mut self, performance: &PerformanceId) {
		(**self).on_interrupt(performance);
	}
}

impl<S: CommandSink + ?Sized> CommandSink for Box<S> {
	fn on_action_start(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str, params: &Params) {
		(**self).on_action_start(performance, entity, action, params);
	}

	fn on_action_update(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str, progress: f64) {
		(**self).on_action_update(performance, entity, action, progress);
	}

	fn on_action_complete(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str) {
		(**self).on_action_complete(performance, entity, action);
	}

	fn on_action_execute(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str, params: &Params) {
		(**self).on_action_execute(performance, entity, action, params);
	}

	fn on_interrupt(&mut self, performance: &PerformanceId) {
		(**self).on_interrupt(performance);
	}
}

/// One sink call as data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Command {
	ActionStart {
		performance: PerformanceId,
		entity: Option<EntityHandle>,
		action: String,
		params: Params,
	},
	ActionUpdate {
		performance: PerformanceId,
		entity: Option<EntityHandle>,
		action: String,
		progress: f64,
	},
	ActionComplete {
		performance: PerformanceId,
		entity: Option<EntityHandle>,
		action: String,
	},
	ActionExecute {
		performance: PerformanceId,
		entity: Option<EntityHandle>,
		action: String,
		params: Params,
	},
	Interrupt {
		performance: PerformanceId,
	},
}

impl Command {
	pub fn performance(&self) -> &PerformanceId {
		match self {
			Self::ActionStart { performance, .. }
			| Self::ActionUpdate { performance, .. }
			| Self::ActionComplete { performance, .. }
			| Self::ActionExecute { performance, .. }
			| Self::Interrupt { performance } => performance,
		}
	}

	pub fn entity(&self) -> Option<&EntityHandle> {
		match self {
			Self::ActionStart { entity, .. } | Self::ActionUpdate { entity, .. } | Self::ActionComplete { entity, .. } | Self::ActionExecute { entity, .. } => entity.as_ref(),
			Self::Interrupt { .. } => None,
		}
	}

	pub fn action(&self) -> Option<&str> {
		match self {
			Self::ActionStart { action, .. } | Self::ActionUpdate { action, .. } | Self::ActionComplete { action, .. } | Self::ActionExecute { action, .. } => Some(action.as_str()),
			Self::Interrupt { .. } => None,
		}
	}

	pub fn is_update(&self) -> bool {
		matches!(self, Self::ActionUpdate { .. })
	}
}

/// Sink that keeps every command, used by tests and the deterministic player
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
	commands: Vec<Command>,
}

impl RecordingSink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn commands(&self) -> &[Command] {
		&self.commands
	}

	/// Drain everything recorded so far
	pub fn take(&mut self) -> Vec<Command> {
		std::mem::take(&mut self.commands)
	}

	/// Commands with per-tick updates filtered out
	pub fn milestones(&self) -> Vec<&Command> {
		self.commands.iter().filter(|command| !command.is_update()).collect()
	}

	pub fn for_performance<'a>(&'a self, performance: &'a PerformanceId) -> impl Iterator<Item = &'a Command> + 'a {
		self.commands.iter().filter(move |command| command.performance() == performance)
	}

	pub fn len(&self) -> usize {
		self.commands.len()
	}

	pub fn is_empty(&self) -> bool {
		self.commands.is_empty()
	}
}

impl CommandSink for RecordingSink {
	fn on_action_start(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str, params: &Params) {
		self.commands.push(Command::ActionStart {
			performance: performance.clone(),
			entity: entity.cloned(),
			action: action.to_string(),
			params: params.clone(),
		});
	}

	fn on_action_update(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str, progress: f64) {
		self.commands.push(Command::ActionUpdate {
			performance: performance.clone(),
			entity: entity.cloned(),
			action: action.to_string(),
			progress,
		});
	}

	fn on_action_complete(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str) {
		self.commands.push(Command::ActionComplete {
			performance: performance.clone(),
			entity: entity.cloned(),
			action: action.to_string(),
		});
	}

	fn on_action_execute(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str, params: &Params) {
		self.commands.push(Command::ActionExecute {
			performance: performance.clone(),
			entity: entity.cloned(),
			action: action.to_string(),
			params: params.clone(),
		});
	}

	fn on_interrupt(&mut self, performance: &PerformanceId) {
		self.commands.push(Command::Interrupt { performance: performance.clone() });
	}
}

/// Sink that renders commands as structured log events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl CommandSink for TracingSink {
	fn on_action_start(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str, params: &Params) {
		let params = Value::Object(params.clone());
		info!(%performance, entity = entity.map(EntityHandle::as_str), action, %params, "▶ action start");
	}

	fn on_action_update(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str, progress: f64) {
		trace!(%performance, entity = entity.map(EntityHandle::as_str), action, progress, "action update");
	}

	fn on_action_complete(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str) {
		info!(%performance, entity = entity.map(EntityHandle::as_str), action, "✔ action complete");
	}

	fn on_action_execute(&mut self, performance: &PerformanceId, entity: Option<&EntityHandle>, action: &str, params: &Params) {
		let params = Value::Object(params.clone());
		info!(%performance, entity = entity.map(EntityHandle::as_str), action, %params, "⚡ action execute");
	}

	fn on_interrupt(&mut self, performance: &PerformanceId) {
		info!(%performance, "🛑 performance interrupted");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn recording_sink_drains() {
		let mut sink = RecordingSink::new();
		let perf = PerformanceId("perf-1".into());
		sink.on_action_update(&perf, None, "move", 0.5);
		sink.on_interrupt(&perf);

		assert_eq!(sink.milestones().len(), 1);
		assert_eq!(sink.take().len(), 2);
		assert!(sink.is_empty());
	}

	#[test]
	fn tracing_sink_logs_params_as_json() {
		let subscriber = tracing_subscriber::fmt().with_max_level(tracing::Level::TRACE).with_test_writer().finish();
		tracing::subscriber::with_default(subscriber, || {
			let mut sink = TracingSink;
			let perf = PerformanceId("perf-1".into());
			let entity = EntityHandle::from("sprite-1");
			let mut params = Params::new();
			params.insert("color".into(), json!("#ff0"));

			sink.on_action_start(&perf, Some(&entity), "flash", &params);
			sink.on_action_update(&perf, Some(&entity), "flash", 0.5);
			sink.on_action_complete(&perf, Some(&entity), "flash");
			sink.on_action_execute(&perf, None, "playSound", &params);
			sink.on_interrupt(&perf);
		});
	}

	#[test]
	fn commands_serialize_with_tag() {
		let command = Command::ActionComplete {
			performance: PerformanceId("perf-3".into()),
			entity: Some(EntityHandle::from("peon#1")),
			action: "move".into(),
		};
		assert_eq!(
			serde_json::to_value(&command).unwrap(),
			json!({ "command": "actionComplete", "performance": "perf-3", "entity": "peon#1", "action": "move" })
		);
	}
}
