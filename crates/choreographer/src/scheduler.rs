mod choreography;
mod cursor;
mod performance;

pub use choreography::Choreography;
pub use performance::Performance;

use std::sync::Arc;
use tracing::{debug, info};

use crate::actions::ActionCatalog;
use crate::ids::IdGenerator;
use crate::resolver::ReferenceResolver;
use crate::signal::Signal;
use crate::sink::CommandSink;
use crate::types::{PerformanceId, TimeMs};

/// Borrowed collaborators for one tick
pub(crate) struct TickContext<'a, S: ?Sized, R: ?Sized> {
	pub now: TimeMs,
	pub sink: &'a mut S,
	pub resolver: &'a R,
	pub actions: &'a ActionCatalog,
}

/// Owns every live performance and advances them in spawn order
pub struct PerformanceScheduler {
	performances: Vec<Performance>,
	ids: Box<dyn IdGenerator>,
	actions: ActionCatalog,
	spawned_total: u64,
	completed_total: u64,
}

impl std::fmt::Debug for PerformanceScheduler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PerformanceScheduler")
			.field("performances", &self.performances.len())
			.field("actions", &self.actions)
			.field("spawned_total", &self.spawned_total)
			.field("completed_total", &self.completed_total)
			.finish_non_exhaustive()
	}
}

impl PerformanceScheduler {
	pub fn new(ids: Box<dyn IdGenerator>, actions: ActionCatalog) -> Self {
		Self {
			performances: Vec::new(),
			ids,
			actions,
			spawned_total: 0,
			completed_total: 0,
		}
	}

	pub(crate) fn set_ids(&mut self, ids: Box<dyn IdGenerator>) {
		self.ids = ids;
	}

	pub fn actions(&self) -> &ActionCatalog {
		&self.actions
	}

	/// Start a performance; it does nothing until the next tick
	pub(crate) fn spawn(&mut self, choreography: Arc<Choreography>, signal: &Signal, origin: u64, now: TimeMs) -> PerformanceId {
		let id = self.ids.next_id();
		debug!(performance = %id, choreography = choreography.label(), signal = %signal.kind, "spawning performance");

		self.performances.push(Performance::new(id.clone(), choreography, signal.clone(), origin, now));
		self.spawned_total += 1;
		id
	}

	/// Flag every live performance sharing `correlation_id`, except those spawned by `origin`
	pub(crate) fn interrupt_correlated(&mut self, correlation_id: &str, origin: u64) -> usize {
		let mut interrupted = 0;
		for performance in &mut self.performances {
			if performance.origin() == origin || performance.correlation_id() != Some(correlation_id) {
				continue;
			}
			if performance.interrupt() {
				debug!(performance = %performance.id(), correlation_id, "performance interrupted");
				interrupted += 1;
			}
		}
		interrupted
	}

	/// Advance every performance once, then drop the finished ones
	pub fn tick<S, R>(&mut self, now: TimeMs, sink: &mut S, resolver: &R)
	where
		S: CommandSink + ?Sized,
		R: ReferenceResolver + ?Sized,
	{
		let mut cx = TickContext {
			now,
			sink,
			resolver,
			actions: &self.actions,
		};

		for performance in &mut self.performances {
			performance.advance(&mut cx);
		}

		let before = self.performances.len();
		self.performances.retain(|performance| {
			if performance.is_done() {
				debug!(performance = %performance.id(), choreography = performance.choreography().label(), interrupted = performance.is_interrupted(), "performance finished");
			}
			!performance.is_done()
		});
		self.completed_total += (before - self.performances.len()) as u64;
	}

	/// Interrupt and drop every performance; interrupt tracks do not run
	pub fn clear<S>(&mut self, sink: &mut S) -> usize
	where
		S: CommandSink + ?Sized,
	{
		let dropped = self.performances.len();
		for performance in self.performances.drain(..) {
			sink.on_interrupt(performance.id());
		}
		if dropped > 0 {
			info!(dropped, "🧹 cleared live performances");
		}
		dropped
	}

	pub fn live(&self) -> &[Performance] {
		&self.performances
	}

	pub fn get(&self, id: &PerformanceId) -> Option<&Performance> {
		self.performances.iter().find(|performance| performance.id() == id)
	}

	pub fn len(&self) -> usize {
		self.performances.len()
	}

	pub fn is_empty(&self) -> bool {
		self.performances.is_empty()
	}

	pub fn spawned_total(&self) -> u64 {
		self.spawned_total
	}

	pub fn completed_total(&self) -> u64 {
		self.completed_total
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::definition::{ActionStep, ChoreographyDefinition, ChoreographyStep};
	use crate::ids::SequentialIds;
	use crate::resolver::SceneDirectory;
	use crate::sink::{Command, RecordingSink};
	use pretty_assertions::assert_eq;
	use serde_json::json;

	fn scheduler() -> PerformanceScheduler {
		PerformanceScheduler::new(Box::new(SequentialIds::new()), ActionCatalog::standard())
	}

	fn compile(definition: ChoreographyDefinition) -> Arc<Choreography> {
		Arc::new(Choreography::compile(definition))
	}

	fn milestone_names(sink: &RecordingSink) -> Vec<String> {
		sink.milestones()
			.into_iter()
			.map(|command| match command {
				Command::ActionStart { action, .. } => format!("start:{action}"),
				Command::ActionComplete { action, .. } => format!("complete:{action}"),
				Command::ActionExecute { action, .. } => format!("execute:{action}"),
				Command::Interrupt { .. } => "interrupt".to_string(),
				Command::ActionUpdate { .. } => unreachable!(),
			})
			.collect()
	}

	// ============================================================================
	// Sequencing
	// ============================================================================

	#[test]
	fn sequential_steps_start_on_following_ticks() {
		let mut scheduler = scheduler();
		let mut sink = RecordingSink::new();
		let scene = SceneDirectory::new();
		let choreography = compile(ChoreographyDefinition::new("go").step(ActionStep::new("move").with_duration(100)).step(ActionStep::new("flash")));

		scheduler.spawn(choreography, &Signal::new("go", json!({})), 1, 0);
		for now in [0, 50, 100, 116] {
			scheduler.tick(now, &mut sink, &scene);
		}

		assert_eq!(milestone_names(&sink), vec!["start:move", "complete:move", "execute:flash"]);
		assert!(scheduler.is_empty());
		assert_eq!(scheduler.completed_total(), 1);
	}

	#[test]
	fn delay_is_honoured_once_per_step() {
		let mut scheduler = scheduler();
		let mut sink = RecordingSink::new();
		let scene = SceneDirectory::new();
		let choreography = compile(ChoreographyDefinition::new("go").step(ActionStep::new("flash").with_delay(200)));

		scheduler.spawn(choreography, &Signal::new("go", json!({})), 1, 0);
		scheduler.tick(0, &mut sink, &scene);
		scheduler.tick(199, &mut sink, &scene);
		assert!(sink.is_empty());

		scheduler.tick(200, &mut sink, &scene);
		assert_eq!(milestone_names(&sink), vec!["execute:flash"]);
	}

	#[test]
	fn unbounded_delay_saturates_instead_of_overflowing() {
		let mut scheduler = scheduler();
		let mut sink = RecordingSink::new();
		let scene = SceneDirectory::new();
		let choreography = compile(ChoreographyDefinition::new("go").step(ActionStep::new("flash").with_delay(TimeMs::MAX)));

		scheduler.spawn(choreography, &Signal::new("go", json!({})), 1, 0);
		scheduler.tick(16, &mut sink, &scene);
		scheduler.tick(TimeMs::MAX - 1, &mut sink, &scene);
		assert!(sink.is_empty());
		assert_eq!(scheduler.len(), 1);

		scheduler.tick(TimeMs::MAX, &mut sink, &scene);
		assert_eq!(milestone_names(&sink), vec!["execute:flash"]);
	}

	#[test]
	fn empty_parallel_completes_immediately() {
		let mut scheduler = scheduler();
		let mut sink = RecordingSink::new();
		let scene = SceneDirectory::new();
		let choreography = compile(ChoreographyDefinition::new("go").step(ChoreographyStep::parallel(Vec::new())));

		scheduler.spawn(choreography, &Signal::new("go", json!({})), 1, 0);
		scheduler.tick(0, &mut sink, &scene);

		assert!(sink.is_empty());
		assert!(scheduler.is_empty());
	}

	// ============================================================================
	// Interruption
	// ============================================================================

	#[test]
	fn interrupt_skips_same_origin_and_other_correlations() {
		let mut scheduler = scheduler();
		let choreography = compile(ChoreographyDefinition::new("go").step(ActionStep::new("move").with_duration(1_000)));

		scheduler.spawn(Arc::clone(&choreography), &Signal::new("go", json!({})).with_correlation("c1"), 1, 0);
		scheduler.spawn(Arc::clone(&choreography), &Signal::new("go", json!({})).with_correlation("c2"), 1, 0);
		scheduler.spawn(Arc::clone(&choreography), &Signal::new("go", json!({})).with_correlation("c1"), 2, 0);

		assert_eq!(scheduler.interrupt_correlated("c1", 2), 1);
		assert_eq!(scheduler.interrupt_correlated("c1", 3), 1);
		assert_eq!(scheduler.interrupt_correlated("c1", 3), 0);
	}

	#[test]
	fn interrupt_without_track_finishes_after_notice() {
		let mut scheduler = scheduler();
		let mut sink = RecordingSink::new();
		let scene = SceneDirectory::new();
		let choreography = compile(ChoreographyDefinition::new("go").step(ActionStep::new("move").with_duration(1_000)));

		scheduler.spawn(choreography, &Signal::new("go", json!({})).with_correlation("c1"), 1, 0);
		scheduler.tick(0, &mut sink, &scene);
		scheduler.interrupt_correlated("c1", 2);
		scheduler.tick(16, &mut sink, &scene);

		assert_eq!(milestone_names(&sink), vec!["start:move", "interrupt"]);
		assert!(scheduler.is_empty());
	}

	#[test]
	fn clear_interrupts_without_running_tracks() {
		let mut scheduler = scheduler();
		let mut sink = RecordingSink::new();
		let choreography = compile(
			ChoreographyDefinition::new("go")
				.step(ActionStep::new("move").with_duration(1_000))
				.step(ChoreographyStep::on_interrupt(vec![ActionStep::new("fade").into()])),
		);
		scheduler.spawn(choreography, &Signal::new("go", json!({})), 1, 0);

		assert_eq!(scheduler.clear(&mut sink), 1);
		scheduler.tick(16, &mut sink, &SceneDirectory::new());
		assert_eq!(milestone_names(&sink), vec!["interrupt"]);
		assert_eq!(scheduler.spawned_total(), 1);
		assert_eq!(scheduler.completed_total(), 0);
	}
}
