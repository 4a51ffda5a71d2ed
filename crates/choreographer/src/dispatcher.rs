use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::condition;
use crate::definition::ChoreographyDefinition;
use crate::scheduler::{Choreography, PerformanceScheduler};
use crate::signal::Signal;
use crate::types::{PerformanceId, TimeMs};

/// Routes signals to the definitions whose trigger and `when` clause match
#[derive(Debug, Default)]
pub struct TriggerDispatcher {
	choreographies: Vec<Arc<Choreography>>,
	by_trigger: HashMap<String, Vec<usize>>,
	signals_seen: u64,
}

impl TriggerDispatcher {
	pub fn new(definitions: impl IntoIterator<Item = ChoreographyDefinition>) -> Self {
		let mut dispatcher = Self::default();
		for definition in definitions {
			dispatcher.register(definition);
		}
		dispatcher
	}

	/// Definitions registered later match after earlier ones
	pub fn register(&mut self, definition: ChoreographyDefinition) {
		let index = self.choreographies.len();
		self.by_trigger.entry(definition.on.clone()).or_default().push(index);
		debug!(choreography = definition.label(), trigger = %definition.on, "registered choreography");
		self.choreographies.push(Arc::new(Choreography::compile(definition)));
	}

	pub fn len(&self) -> usize {
		self.choreographies.len()
	}

	pub fn is_empty(&self) -> bool {
		self.choreographies.is_empty()
	}

	pub fn signals_seen(&self) -> u64 {
		self.signals_seen
	}

	pub fn definitions(&self) -> impl Iterator<Item = &ChoreographyDefinition> {
		self.choreographies.iter().map(|choreography| choreography.definition())
	}

	/// Matching choreographies in declaration order
	pub fn matching<'a>(&'a self, signal: &'a Signal) -> impl Iterator<Item = &'a Arc<Choreography>> + 'a {
		self.by_trigger
			.get(&signal.kind)
			.into_iter()
			.flatten()
			.map(|&index| &self.choreographies[index])
			.filter(move |choreography| condition::evaluate(choreography.definition().when.as_ref(), signal))
	}

	/// Spawn one performance per match, interrupting correlated ones first where asked
	pub fn dispatch(&mut self, signal: &Signal, scheduler: &mut PerformanceScheduler, now: TimeMs) -> Vec<PerformanceId> {
		self.signals_seen += 1;
		let origin = self.signals_seen;

		let matched: Vec<Arc<Choreography>> = self.matching(signal).cloned().collect();
		if matched.is_empty() {
			debug!(signal = %signal.kind, "no choreography matched");
			return Vec::new();
		}

		let mut spawned = Vec::with_capacity(matched.len());
		for choreography in matched {
			if choreography.definition().interrupts {
				if let Some(correlation_id) = signal.correlation_id.as_deref() {
					let interrupted = scheduler.interrupt_correlated(correlation_id, origin);
					if interrupted > 0 {
						info!(choreography = choreography.label(), correlation_id, interrupted, "⏹ interrupting correlated performances");
					}
				}
			}
			spawned.push(scheduler.spawn(choreography, signal, origin, now));
		}
		spawned
	}
}
