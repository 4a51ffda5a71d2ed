use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::PerformanceId;

/// Source of performance ids, injected so tests stay deterministic
pub trait IdGenerator: Send {
	fn next_id(&mut self) -> PerformanceId;
}

/// `perf-1`, `perf-2`, ...
#[derive(Debug, Default, Clone)]
pub struct SequentialIds {
	issued: u64,
}

impl SequentialIds {
	pub fn new() -> Self {
		Self::default()
	}
}

impl IdGenerator for SequentialIds {
	fn next_id(&mut self) -> PerformanceId {
		self.issued += 1;
		PerformanceId(format!("perf-{}", self.issued))
	}
}

/// Random v4 UUIDs
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
	fn next_id(&mut self) -> PerformanceId {
		PerformanceId(Uuid::new_v4().to_string())
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
	#[default]
	Sequential,
	Uuid,
}

impl IdStrategy {
	pub fn generator(self) -> Box<dyn IdGenerator> {
		match self {
			Self::Sequential => Box::new(SequentialIds::new()),
			Self::Uuid => Box::new(UuidIds),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sequential_ids_count_up() {
		let mut ids = SequentialIds::new();
		assert_eq!(ids.next_id().as_str(), "perf-1");
		assert_eq!(ids.next_id().as_str(), "perf-2");
	}

	#[test]
	fn uuid_ids_are_unique() {
		let mut ids = IdStrategy::Uuid.generator();
		assert_ne!(ids.next_id(), ids.next_id());
	}
}
