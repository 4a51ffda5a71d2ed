use smallvec::SmallVec;

use super::choreography::{NodeId, SequenceId};
use crate::easing::Easing;
use crate::sink::Params;
use crate::types::{EntityHandle, TimeMs};

/// Index of a cursor in a performance's [`CursorArena`]
pub(crate) type CursorId = usize;

/// Resolved targets of one step. `None` stands for "no entity named".
pub(crate) type Targets = SmallVec<[Option<EntityHandle>; 4]>;

/// Progress marker through one sequence.
///
/// Leaf states: idle (nothing pending), delaying (`delay_until` set),
/// animating (`active` set), waiting on a parallel (`children` non-empty),
/// done (`index` past the end).
#[derive(Debug, Clone)]
pub(crate) struct StepCursor {
	pub sequence: SequenceId,
	pub index: usize,
	pub active: Option<ActiveAction>,
	pub children: Vec<CursorId>,
	pub delay_until: Option<TimeMs>,
	/// The step at `index` already waited out its delay
	pub delay_honored: bool,
}

impl StepCursor {
	fn new(sequence: SequenceId) -> Self {
		Self {
			sequence,
			index: 0,
			active: None,
			children: Vec::new(),
			delay_until: None,
			delay_honored: false,
		}
	}

	/// Move past the current step, returning whether the sequence is exhausted
	pub fn advance(&mut self, len: usize) -> bool {
		self.index += 1;
		self.delay_honored = false;
		self.index >= len
	}
}

/// An action in flight
#[derive(Debug, Clone)]
pub(crate) struct ActiveAction {
	pub node: NodeId,
	pub targets: Targets,
	pub params: Params,
	pub start_time: TimeMs,
	pub duration: TimeMs,
	pub easing: Easing,
	/// The start command reached the sink; updates and completion follow it
	pub started: bool,
}

/// Flat storage for a performance's cursor tree; the root is always index 0
#[derive(Debug, Clone)]
pub(crate) struct CursorArena {
	cursors: Vec<StepCursor>,
}

impl CursorArena {
	pub fn new(root: SequenceId) -> Self {
		Self {
			cursors: vec![StepCursor::new(root)],
		}
	}

	pub const ROOT: CursorId = 0;

	/// Drop every cursor and start over on `root`
	pub fn reset(&mut self, root: SequenceId) {
		self.cursors.clear();
		self.cursors.push(StepCursor::new(root));
	}

	pub fn alloc(&mut self, sequence: SequenceId) -> CursorId {
		self.cursors.push(StepCursor::new(sequence));
		self.cursors.len() - 1
	}

	pub fn get(&self, id: CursorId) -> &StepCursor {
		&self.cursors[id]
	}

	pub fn get_mut(&mut self, id: CursorId) -> &mut StepCursor {
		&mut self.cursors[id]
	}

	/// Number of actions currently animating anywhere in the tree
	pub fn active_count(&self) -> usize {
		self.cursors.iter().filter(|cursor| cursor.active.is_some()).count()
	}
}
