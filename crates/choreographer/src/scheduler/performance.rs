use serde_json::Value;
use smallvec::smallvec;
use std::sync::Arc;
use tracing::{debug, warn};

use super::choreography::{Choreography, NodeId, StepNode};
use super::cursor::{ActiveAction, CursorArena, CursorId, Targets};
use super::TickContext;
use crate::definition::ActionStep;
use crate::easing::Easing;
use crate::resolver::ReferenceResolver;
use crate::signal::{FieldPath, Signal};
use crate::sink::{CommandSink, Params};
use crate::types::{PerformanceId, Progress, TimeMs};

/// One running instance of a choreography
#[derive(Debug)]
pub struct Performance {
	id: PerformanceId,
	choreography: Arc<Choreography>,
	signal: Signal,
	/// Dispatch sequence number of the spawning signal
	origin: u64,
	spawned_at: TimeMs,
	state: PerformanceState,
}

#[derive(Debug)]
struct PerformanceState {
	cursors: CursorArena,
	interrupted: bool,
	on_interrupt_track: bool,
	done: bool,
}

impl Performance {
	pub(crate) fn new(id: PerformanceId, choreography: Arc<Choreography>, signal: Signal, origin: u64, spawned_at: TimeMs) -> Self {
		let cursors = CursorArena::new(choreography.main_sequence());
		Self {
			id,
			choreography,
			signal,
			origin,
			spawned_at,
			state: PerformanceState {
				cursors,
				interrupted: false,
				on_interrupt_track: false,
				done: false,
			},
		}
	}

	pub fn id(&self) -> &PerformanceId {
		&self.id
	}

	pub fn choreography(&self) -> &Choreography {
		&self.choreography
	}

	pub fn signal(&self) -> &Signal {
		&self.signal
	}

	pub fn correlation_id(&self) -> Option<&str> {
		self.signal.correlation_id.as_deref()
	}

	pub fn spawned_at(&self) -> TimeMs {
		self.spawned_at
	}

	pub fn is_interrupted(&self) -> bool {
		self.state.interrupted
	}

	pub fn is_done(&self) -> bool {
		self.state.done
	}

	pub fn active_actions(&self) -> usize {
		self.state.cursors.active_count()
	}

	pub(crate) fn origin(&self) -> u64 {
		self.origin
	}

	/// Flag for interruption; the switch to the interrupt track happens on the next tick
	pub(crate) fn interrupt(&mut self) -> bool {
		if self.state.done || self.state.interrupted {
			return false;
		}
		self.state.interrupted = true;
		true
	}

	pub(crate) fn advance<S, R>(&mut self, cx: &mut TickContext<'_, S, R>)
	where
		S: CommandSink + ?Sized,
		R: ReferenceResolver + ?Sized,
	{
		if self.state.done {
			return;
		}

		if self.state.interrupted && !self.state.on_interrupt_track {
			self.state.on_interrupt_track = true;
			cx.sink.on_interrupt(&self.id);

			match self.choreography.interrupt_sequence() {
				Some(track) => {
					debug!(performance = %self.id, choreography = self.choreography.label(), "switching to interrupt track");
					self.state.cursors.reset(track);
				}
				None => {
					self.state.done = true;
					return;
				}
			}
		}

		if self.step_cursor(CursorArena::ROOT, cx) {
			self.state.done = true;
		}
	}

	/// Perform at most one transition on `id`; returns whether its sequence is exhausted
	fn step_cursor<S, R>(&mut self, id: CursorId, cx: &mut TickContext<'_, S, R>) -> bool
	where
		S: CommandSink + ?Sized,
		R: ReferenceResolver + ?Sized,
	{
		let choreography = Arc::clone(&self.choreography);
		let cursor = self.state.cursors.get_mut(id);
		let sequence = choreography.sequence(cursor.sequence);
		let len = sequence.len();

		let Some(&node) = sequence.get(cursor.index) else {
			return true;
		};

		if let Some(until) = cursor.delay_until {
			if cx.now < until {
				return false;
			}
			cursor.delay_until = None;
		}

		if cursor.active.is_some() {
			return self.animate(id, len, cx);
		}

		if !cursor.children.is_empty() {
			return self.step_children(id, len, cx);
		}

		match choreography.node(node) {
			StepNode::Parallel(lanes) if lanes.is_empty() => cursor.advance(len),
			StepNode::Parallel(lanes) => {
				let children = lanes.iter().map(|&lane| self.state.cursors.alloc(lane)).collect();
				self.state.cursors.get_mut(id).children = children;
				self.step_children(id, len, cx)
			}
			StepNode::Action(step) => self.begin_action(id, node, step, len, cx),
		}
	}

	fn step_children<S, R>(&mut self, id: CursorId, len: usize, cx: &mut TickContext<'_, S, R>) -> bool
	where
		S: CommandSink + ?Sized,
		R: ReferenceResolver + ?Sized,
	{
		let children = std::mem::take(&mut self.state.cursors.get_mut(id).children);

		let mut all_done = true;
		for &child in &children {
			if !self.step_cursor(child, cx) {
				all_done = false;
			}
		}

		let cursor = self.state.cursors.get_mut(id);
		if all_done {
			cursor.advance(len)
		} else {
			cursor.children = children;
			false
		}
	}

	fn begin_action<S, R>(&mut self, id: CursorId, node: NodeId, step: &ActionStep, len: usize, cx: &mut TickContext<'_, S, R>) -> bool
	where
		S: CommandSink + ?Sized,
		R: ReferenceResolver + ?Sized,
	{
		let cursor = self.state.cursors.get_mut(id);

		if let Some(delay) = step.delay.filter(|delay| *delay > 0) {
			if !cursor.delay_honored {
				cursor.delay_honored = true;
				cursor.delay_until = Some(cx.now.saturating_add(delay));
				return false;
			}
		}

		let Some(ResolvedStep { targets, params }) = resolve_step(step, &self.signal, cx.resolver, &self.id) else {
			return cursor.advance(len);
		};

		let reaches_sink = cx.actions.reaches_sink(&step.action);
		if !reaches_sink {
			debug!(performance = %self.id, action = %step.action, "action has no sink counterpart, running timing only");
		}

		match step.duration.filter(|duration| *duration > 0) {
			Some(duration) => {
				if reaches_sink {
					for target in &targets {
						cx.sink.on_action_start(&self.id, target.as_ref(), &step.action, &params);
					}
				}
				cursor.active = Some(ActiveAction {
					node,
					targets,
					params,
					start_time: cx.now,
					duration,
					easing: easing_for(step, &self.id),
					started: reaches_sink,
				});
				false
			}
			None => {
				if reaches_sink {
					for target in &targets {
						cx.sink.on_action_execute(&self.id, target.as_ref(), &step.action, &params);
					}
				}
				cursor.advance(len)
			}
		}
	}

	fn animate<S, R>(&mut self, id: CursorId, len: usize, cx: &mut TickContext<'_, S, R>) -> bool
	where
		S: CommandSink + ?Sized,
		R: ReferenceResolver + ?Sized,
	{
		let choreography = Arc::clone(&self.choreography);
		let cursor = self.state.cursors.get_mut(id);
		let Some(active) = cursor.active.as_ref() else {
			return false;
		};
		let StepNode::Action(step) = choreography.node(active.node) else {
			return false;
		};

		let progress = Progress::new(cx.now - active.start_time, active.duration);

		if active.started {
			let eased = active.easing.apply(progress.value());
			for target in &active.targets {
				cx.sink.on_action_update(&self.id, target.as_ref(), &step.action, eased);
			}
		}

		if !progress.is_complete() {
			return false;
		}

		if active.started {
			for target in &active.targets {
				cx.sink.on_action_complete(&self.id, target.as_ref(), &step.action);
			}
		}

		cursor.active = None;
		cursor.advance(len)
	}
}

fn easing_for(step: &ActionStep, performance: &PerformanceId) -> Easing {
	match step.easing.as_deref() {
		None => Easing::default(),
		Some(name) => Easing::from_name(name).unwrap_or_else(|| {
			warn!(%performance, action = %step.action, easing = name, "unknown easing, falling back to linear");
			Easing::Linear
		}),
	}
}

struct ResolvedStep {
	targets: Targets,
	params: Params,
}

/// Resolve entity, target and placeholder params; `None` skips the step
fn resolve_step<R>(step: &ActionStep, signal: &Signal, resolver: &R, performance: &PerformanceId) -> Option<ResolvedStep>
where
	R: ReferenceResolver + ?Sized,
{
	let targets: Targets = match &step.entity {
		None => smallvec![None],
		Some(reference) => {
			let Some(names) = substitute_names(reference, signal) else {
				warn!(%performance, action = %step.action, entity = %reference, "entity placeholder not present on signal, skipping step");
				return None;
			};
			let handles: Targets = names.iter().flat_map(|name| resolver.resolve_entity(name)).map(Some).collect();
			if handles.is_empty() {
				warn!(%performance, action = %step.action, entity = %reference, ?names, "unresolved entity reference, skipping step");
				return None;
			}
			handles
		}
	};

	let mut params = Params::new();
	for (key, value) in &step.params {
		match substitute_value(value, signal) {
			Some(value) => {
				params.insert(key.clone(), value);
			}
			None => warn!(%performance, action = %step.action, param = %key, "param placeholder not present on signal, dropping it"),
		}
	}

	if let Some(reference) = &step.target {
		let Some(name) = substitute_names(reference, signal).and_then(|names| names.into_iter().next()) else {
			warn!(%performance, action = %step.action, target = %reference, "target placeholder not present on signal, skipping step");
			return None;
		};

		if let Some(position) = resolver.resolve_position(&name) {
			params.insert("to".to_string(), position.into());
		} else if let Some(route) = resolver.resolve_route(&name) {
			params.insert("route".to_string(), Value::from(&route));
		} else {
			let handles = resolver.resolve_entity(&name);
			if handles.is_empty() {
				warn!(%performance, action = %step.action, target = %name, "unresolved target reference, skipping step");
				return None;
			}
			params.insert("targetEntities".to_string(), Value::Array(handles.into_iter().map(|handle| Value::String(handle.0)).collect()));
		}
		params.insert("target".to_string(), Value::String(name));
	}

	Some(ResolvedStep { targets, params })
}

/// Literal names pass through; placeholders yield one name or an array of names
fn substitute_names(reference: &str, signal: &Signal) -> Option<Vec<String>> {
	let Some(path) = FieldPath::placeholder(reference) else {
		return Some(vec![reference.to_string()]);
	};

	match path.lookup(signal).as_deref() {
		Some(Value::String(name)) => Some(vec![name.clone()]),
		Some(Value::Number(number)) => Some(vec![number.to_string()]),
		Some(Value::Array(items)) => Some(items.iter().filter_map(Value::as_str).map(str::to_string).collect()),
		_ => None,
	}
}

fn substitute_value(value: &Value, signal: &Signal) -> Option<Value> {
	match value.as_str().and_then(FieldPath::placeholder) {
		Some(path) => path.lookup(signal).map(std::borrow::Cow::into_owned),
		None => Some(value.clone()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::resolver::SceneDirectory;
	use crate::types::{EntityHandle, Position};
	use serde_json::json;

	fn scene() -> SceneDirectory {
		SceneDirectory::new()
			.with_instance("agent-1", "sprite-1")
			.with_instance("peon", "peon#1")
			.with_instance("peon", "peon#2")
			.with_position("workstation-1", Position::new(4.0, 2.0))
	}

	fn perf() -> PerformanceId {
		PerformanceId("perf-1".into())
	}

	#[test]
	fn resolves_entity_placeholder_and_position_target() {
		let step = ActionStep::new("move").on_entity("signal.payload.from").toward("workstation-1").with_param("speed", "signal.payload.speed");
		let signal = Signal::new("tool_call", json!({ "from": "agent-1", "speed": 3 }));

		let resolved = resolve_step(&step, &signal, &scene(), &perf()).unwrap();
		assert_eq!(resolved.targets.as_slice(), &[Some(EntityHandle::from("sprite-1"))]);
		assert_eq!(resolved.params.get("to"), Some(&json!({ "x": 4.0, "y": 2.0 })));
		assert_eq!(resolved.params.get("target"), Some(&json!("workstation-1")));
		assert_eq!(resolved.params.get("speed"), Some(&json!(3)));
	}

	#[test]
	fn entity_target_falls_back_to_handles() {
		let step = ActionStep::new("fly").on_entity("agent-1").toward("peon");
		let resolved = resolve_step(&step, &Signal::new("x", json!({})), &scene(), &perf()).unwrap();
		assert_eq!(resolved.params.get("targetEntities"), Some(&json!(["peon#1", "peon#2"])));
	}

	#[test]
	fn unresolved_references_skip_the_step() {
		let signal = Signal::new("x", json!({ "from": "ghost" }));
		assert!(resolve_step(&ActionStep::new("flash").on_entity("signal.payload.from"), &signal, &scene(), &perf()).is_none());
		assert!(resolve_step(&ActionStep::new("flash").on_entity("signal.payload.missing"), &signal, &scene(), &perf()).is_none());
		assert!(resolve_step(&ActionStep::new("move").on_entity("peon").toward("nowhere"), &signal, &scene(), &perf()).is_none());
	}

	#[test]
	fn missing_param_placeholder_is_dropped() {
		let step = ActionStep::new("say").with_param("text", "signal.payload.text").with_param("color", "#fff");
		let resolved = resolve_step(&step, &Signal::new("x", json!({})), &scene(), &perf()).unwrap();
		assert_eq!(resolved.targets.as_slice(), &[None]);
		assert!(!resolved.params.contains_key("text"));
		assert_eq!(resolved.params.get("color"), Some(&json!("#fff")));
	}

	#[test]
	fn array_placeholder_fans_out_over_names() {
		let step = ActionStep::new("flash").on_entity("signal.payload.who");
		let signal = Signal::new("x", json!({ "who": ["agent-1", "peon"] }));
		let resolved = resolve_step(&step, &signal, &scene(), &perf()).unwrap();
		assert_eq!(resolved.targets.len(), 3);
	}
}
