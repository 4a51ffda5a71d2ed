use crate::definition::{ActionStep, ChoreographyDefinition, ChoreographyStep};

/// Index of a node in [`Choreography::nodes`]
pub(crate) type NodeId = usize;

/// Index of a step list in [`Choreography::sequences`]
pub(crate) type SequenceId = usize;

#[derive(Debug, Clone)]
pub(crate) enum StepNode {
	Action(ActionStep),
	/// One lane per child, all started together
	Parallel(Vec<SequenceId>),
}

/// A definition compiled into immutable arenas.
///
/// Step lists become sequences of node indices. `onArrive` children are
/// appended to the enclosing sequence right after the step they follow, and
/// every `onInterrupt` child lands in a single interrupt sequence owned by the
/// whole performance.
#[derive(Debug)]
pub struct Choreography {
	definition: ChoreographyDefinition,
	nodes: Vec<StepNode>,
	sequences: Vec<Vec<NodeId>>,
	main: SequenceId,
	interrupt: Option<SequenceId>,
}

impl Choreography {
	pub fn compile(definition: ChoreographyDefinition) -> Self {
		let mut builder = Builder::default();

		let mut main = Vec::new();
		builder.flatten_into(&definition.steps, &mut main);
		let main = builder.push_sequence(main);

		let interrupt_track = std::mem::take(&mut builder.interrupt_track);
		let interrupt = (!interrupt_track.is_empty()).then(|| builder.push_sequence(interrupt_track));

		Self {
			definition,
			nodes: builder.nodes,
			sequences: builder.sequences,
			main,
			interrupt,
		}
	}

	pub fn definition(&self) -> &ChoreographyDefinition {
		&self.definition
	}

	pub fn label(&self) -> &str {
		self.definition.label()
	}

	pub fn has_interrupt_track(&self) -> bool {
		self.interrupt.is_some()
	}

	pub(crate) fn main_sequence(&self) -> SequenceId {
		self.main
	}

	pub(crate) fn interrupt_sequence(&self) -> Option<SequenceId> {
		self.interrupt
	}

	pub(crate) fn sequence(&self, id: SequenceId) -> &[NodeId] {
		&self.sequences[id]
	}

	pub(crate) fn node(&self, id: NodeId) -> &StepNode {
		&self.nodes[id]
	}
}

#[derive(Default)]
struct Builder {
	nodes: Vec<StepNode>,
	sequences: Vec<Vec<NodeId>>,
	interrupt_track: Vec<NodeId>,
}

impl Builder {
	fn push_node(&mut self, node: StepNode) -> NodeId {
		self.nodes.push(node);
		self.nodes.len() - 1
	}

	fn push_sequence(&mut self, sequence: Vec<NodeId>) -> SequenceId {
		self.sequences.push(sequence);
		self.sequences.len() - 1
	}

	fn flatten_into(&mut self, steps: &[ChoreographyStep], sequence: &mut Vec<NodeId>) {
		for step in steps {
			match step {
				ChoreographyStep::Action(action) => {
					let id = self.push_node(StepNode::Action(action.clone()));
					sequence.push(id);
				}
				ChoreographyStep::Parallel { parallel } => {
					let lanes = self.lanes(parallel);
					let id = self.push_node(StepNode::Parallel(lanes));
					sequence.push(id);
				}
				ChoreographyStep::OnArrive { on_arrive } => self.flatten_into(on_arrive, sequence),
				ChoreographyStep::OnInterrupt { on_interrupt } => {
					let mut track = Vec::new();
					self.flatten_into(on_interrupt, &mut track);
					self.interrupt_track.extend(track);
				}
			}
		}
	}

	/// An `onArrive` child of a parallel extends the lane before it
	fn lanes(&mut self, children: &[ChoreographyStep]) -> Vec<SequenceId> {
		let mut lanes: Vec<Vec<NodeId>> = Vec::new();

		for child in children {
			if let ChoreographyStep::OnArrive { on_arrive } = child {
				if let Some(lane) = lanes.last_mut() {
					self.flatten_into(on_arrive, lane);
					continue;
				}
			}

			let mut lane = Vec::new();
			self.flatten_into(std::slice::from_ref(child), &mut lane);
			if !lane.is_empty() {
				lanes.push(lane);
			}
		}

		lanes.into_iter().map(|lane| self.push_sequence(lane)).collect()
	}
}
