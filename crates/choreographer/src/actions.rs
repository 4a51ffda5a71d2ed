use std::collections::BTreeSet;

/// Actions understood by the stock renderers
pub const STANDARD_ACTIONS: &[&str] = &[
	"move",
	"fly",
	"flash",
	"spawn",
	"destroy",
	"wait",
	"playSound",
	"setAnimation",
	"pulse",
	"shake",
	"fade",
	"emote",
	"say",
	"highlight",
];

/// Known but purely temporal; never reaches the sink
pub const WAIT_ACTION: &str = "wait";

/// Set of action names the sink is told about.
///
/// Unknown actions still consume their delay and duration, the sink just never
/// hears of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCatalog {
	known: BTreeSet<String>,
}

impl ActionCatalog {
	pub fn new<I, S>(actions: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			known: actions.into_iter().map(Into::into).collect(),
		}
	}

	pub fn standard() -> Self {
		Self::new(STANDARD_ACTIONS.iter().copied())
	}

	pub fn with_action(mut self, action: impl Into<String>) -> Self {
		self.known.insert(action.into());
		self
	}

	pub fn is_known(&self, action: &str) -> bool {
		self.known.contains(action)
	}

	/// Whether start / update / complete / execute calls are emitted for `action`
	pub fn reaches_sink(&self, action: &str) -> bool {
		action != WAIT_ACTION && self.is_known(action)
	}

	pub fn len(&self) -> usize {
		self.known.len()
	}

	pub fn is_empty(&self) -> bool {
		self.known.is_empty()
	}
}

impl Default for ActionCatalog {
	fn default() -> Self {
		Self::standard()
	}
}
