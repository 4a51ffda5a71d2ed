//! Time sources for the scheduler.
//!
//! The scheduler reads time only through [`Clock::now`]. Frames are requested
//! explicitly: tests call `advance` on a [`ManualClock`]; production runs the
//! live driver, whose cancellation token stops any further frame.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::types::TimeMs;

pub trait Clock: Send {
	/// Monotonically non-decreasing milliseconds
	fn now(&self) -> TimeMs;
}

/// Wall clock measured from its creation
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
	origin: Instant,
}

impl SystemClock {
	pub fn new() -> Self {
		Self { origin: Instant::now() }
	}
}

impl Default for SystemClock {
	fn default() -> Self {
		Self::new()
	}
}

impl Clock for SystemClock {
	fn now(&self) -> TimeMs {
		TimeMs::try_from(self.origin.elapsed().as_millis()).unwrap_or(TimeMs::MAX)
	}
}

/// Deterministic clock that only moves when told to.
///
/// Clones share the same time, so a test can keep a handle while the
/// choreographer owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
	now: Arc<AtomicI64>,
}

impl ManualClock {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn starting_at(now: TimeMs) -> Self {
		Self {
			now: Arc::new(AtomicI64::new(now)),
		}
	}

	/// Negative deltas are ignored; saturates at `TimeMs::MAX`
	pub fn advance(&self, delta: TimeMs) -> TimeMs {
		let delta = delta.max(0);
		let previous = self.now.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| Some(now.saturating_add(delta)));
		previous.unwrap_or_else(|now| now).saturating_add(delta)
	}

	/// Jump forward to `at`; never moves backwards
	pub fn set(&self, at: TimeMs) -> TimeMs {
		self.now.fetch_max(at, Ordering::SeqCst).max(at)
	}
}

impl Clock for ManualClock {
	fn now(&self) -> TimeMs {
		self.now.load(Ordering::SeqCst)
	}
}

impl<C: Clock + Sync> Clock for Arc<C> {
	fn now(&self) -> TimeMs {
		self.as_ref().now()
	}
}
