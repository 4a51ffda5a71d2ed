use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actions::ActionCatalog;
use crate::clock::{Clock, ManualClock};
use crate::config::ChoreographerConfig;
use crate::definition::ChoreographyDefinition;
use crate::dispatcher::TriggerDispatcher;
use crate::error::Result;
use crate::ids::{IdGenerator, SequentialIds};
use crate::resolver::ReferenceResolver;
use crate::scheduler::{Performance, PerformanceScheduler};
use crate::signal::Signal;
use crate::sink::CommandSink;
use crate::types::{PerformanceId, TimeMs};

/// Snapshot of the engine, published by the live driver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoreographyState {
	pub now: TimeMs,
	pub live: Vec<PerformanceSummary>,
	pub spawned_total: u64,
	pub completed_total: u64,
}

impl ChoreographyState {
	pub fn is_idle(&self) -> bool {
		self.live.is_empty()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
	pub id: PerformanceId,
	pub choreography: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub correlation_id: Option<String>,
	pub interrupted: bool,
	pub spawned_at: TimeMs,
	pub active_actions: usize,
}

impl From<&Performance> for PerformanceSummary {
	fn from(performance: &Performance) -> Self {
		Self {
			id: performance.id().clone(),
			choreography: performance.choreography().label().to_string(),
			correlation_id: performance.correlation_id().map(str::to_string),
			interrupted: performance.is_interrupted(),
			spawned_at: performance.spawned_at(),
			active_actions: performance.active_actions(),
		}
	}
}

/// Single entry point wiring clock, dispatcher, scheduler, sink and resolver.
///
/// `signal` only dispatches; nothing reaches the sink until the next `tick`.
pub struct Choreographer<C, S, R> {
	clock: C,
	dispatcher: TriggerDispatcher,
	scheduler: PerformanceScheduler,
	sink: S,
	resolver: R,
}

impl<C, S, R> Choreographer<C, S, R>
where
	C: Clock,
	S: CommandSink,
	R: ReferenceResolver,
{
	pub fn new(clock: C, sink: S, resolver: R) -> Self {
		Self {
			clock,
			dispatcher: TriggerDispatcher::default(),
			scheduler: PerformanceScheduler::new(Box::new(SequentialIds::new()), ActionCatalog::standard()),
			sink,
			resolver,
		}
	}

	/// Build from validated settings, registering every configured definition
	pub fn from_config(config: &ChoreographerConfig, clock: C, sink: S, resolver: R) -> Result<Self> {
		config.validate()?;

		let mut choreographer = Self {
			clock,
			dispatcher: TriggerDispatcher::default(),
			scheduler: PerformanceScheduler::new(config.id_strategy.generator(), config.action_catalog()),
			sink,
			resolver,
		};
		for definition in &config.choreographies {
			choreographer.dispatcher.register(definition.clone());
		}
		Ok(choreographer)
	}

	pub fn with_ids(mut self, ids: impl IdGenerator + 'static) -> Self {
		self.scheduler.set_ids(Box::new(ids));
		self
	}

	pub fn register(&mut self, definition: ChoreographyDefinition) -> Result<()> {
		definition.validate()?;
		self.dispatcher.register(definition);
		Ok(())
	}

	pub fn definitions(&self) -> impl Iterator<Item = &ChoreographyDefinition> {
		self.dispatcher.definitions()
	}

	/// Match and spawn; returns the new performance ids in order
	pub fn signal(&mut self, signal: Signal) -> Vec<PerformanceId> {
		let now = self.clock.now();
		self.dispatcher.dispatch(&signal, &mut self.scheduler, now)
	}

	/// Advance every live performance to the clock's current time
	pub fn tick(&mut self) -> TimeMs {
		let now = self.clock.now();
		self.scheduler.tick(now, &mut self.sink, &self.resolver);
		now
	}

	pub fn now(&self) -> TimeMs {
		self.clock.now()
	}

	pub fn clock(&self) -> &C {
		&self.clock
	}

	pub fn sink(&self) -> &S {
		&self.sink
	}

	pub fn sink_mut(&mut self) -> &mut S {
		&mut self.sink
	}

	pub fn resolver(&self) -> &R {
		&self.resolver
	}

	pub fn resolver_mut(&mut self) -> &mut R {
		&mut self.resolver
	}

	pub fn live(&self) -> &[Performance] {
		self.scheduler.live()
	}

	pub fn live_count(&self) -> usize {
		self.scheduler.len()
	}

	pub fn is_idle(&self) -> bool {
		self.scheduler.is_empty()
	}

	/// Interrupt and drop every live performance; no interrupt tracks run
	pub fn clear(&mut self) -> usize {
		self.scheduler.clear(&mut self.sink)
	}

	pub fn state(&self) -> ChoreographyState {
		ChoreographyState {
			now: self.clock.now(),
			live: self.scheduler.live().iter().map(PerformanceSummary::from).collect(),
			spawned_total: self.scheduler.spawned_total(),
			completed_total: self.scheduler.completed_total(),
		}
	}
}

impl<S, R> Choreographer<ManualClock, S, R>
where
	S: CommandSink,
	R: ReferenceResolver,
{
	/// Move the clock forward and run one tick
	pub fn advance(&mut self, delta: TimeMs) -> TimeMs {
		self.clock.advance(delta);
		self.tick()
	}

	/// Cover `total` ms in ticks of at most `step` ms
	pub fn advance_in_steps(&mut self, total: TimeMs, step: TimeMs) -> TimeMs {
		let step = step.max(1);
		let target = self.clock.now().saturating_add(total.max(0));
		while self.clock.now() < target {
			let delta = step.min(target - self.clock.now());
			self.advance(delta);
		}
		debug!(now = target, "advanced manual clock");
		self.clock.now()
	}

	/// Jump to an absolute time and tick
	pub fn advance_to(&mut self, at: TimeMs) -> TimeMs {
		self.clock.set(at);
		self.tick()
	}
}

impl<C, S, R> std::fmt::Debug for Choreographer<C, S, R> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Choreographer")
			.field("definitions", &self.dispatcher.len())
			.field("scheduler", &self.scheduler)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::definition::ActionStep;
	use crate::resolver::SceneDirectory;
	use crate::sink::RecordingSink;
	use serde_json::json;

	fn stage() -> Choreographer<ManualClock, RecordingSink, SceneDirectory> {
		Choreographer::new(ManualClock::new(), RecordingSink::new(), SceneDirectory::new().with_instance("agent-1", "sprite-1"))
	}

	#[test]
	fn signal_waits_for_tick() {
		let mut stage = stage();
		stage.register(ChoreographyDefinition::new("error").step(ActionStep::new("flash").on_entity("signal.payload.from"))).unwrap();

		let spawned = stage.signal(Signal::new("error", json!({ "from": "agent-1" })));
		assert_eq!(spawned.len(), 1);
		assert!(stage.sink().is_empty());

		stage.tick();
		assert_eq!(stage.sink().len(), 1);
		assert!(stage.is_idle());
	}

	#[test]
	fn register_rejects_invalid_definition() {
		let mut stage = stage();
		let err = stage.register(ChoreographyDefinition::new("  ")).unwrap_err();
		assert!(err.is_recoverable());
		assert_eq!(stage.definitions().count(), 0);
	}

	#[test]
	fn state_reports_live_performances() {
		let mut stage = stage();
		stage.register(ChoreographyDefinition::new("go").named("walk").step(ActionStep::new("move").with_duration(100))).unwrap();
		stage.signal(Signal::new("go", json!({})).with_correlation("c9"));
		stage.tick();

		let state = stage.state();
		assert_eq!(state.live.len(), 1);
		assert_eq!(state.live[0].choreography, "walk");
		assert_eq!(state.live[0].correlation_id.as_deref(), Some("c9"));
		assert_eq!(state.live[0].active_actions, 1);

		stage.advance_in_steps(100, 30);
		let state = stage.state();
		assert!(state.is_idle());
		assert_eq!((state.now, state.spawned_total, state.completed_total), (100, 1, 1));
	}
}
