use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::actions::{ActionCatalog, STANDARD_ACTIONS};
use crate::definition::ChoreographyDefinition;
use crate::error::{ChoreographyError, Result};
use crate::ids::IdStrategy;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 16;

/// Engine settings, loadable from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChoreographerConfig {
	pub tick_interval_ms: u64,
	/// Action names forwarded to the sink
	pub actions: Vec<String>,
	pub id_strategy: IdStrategy,
	pub choreographies: Vec<ChoreographyDefinition>,
}

impl ChoreographerConfig {
	pub fn new(choreographies: Vec<ChoreographyDefinition>) -> Self {
		Self { choreographies, ..Self::default() }
	}

	pub fn with_tick_interval(mut self, ms: u64) -> Self {
		self.tick_interval_ms = ms;
		self
	}

	pub fn with_actions<I, S>(mut self, actions: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.actions = actions.into_iter().map(Into::into).collect();
		self
	}

	pub fn with_id_strategy(mut self, strategy: IdStrategy) -> Self {
		self.id_strategy = strategy;
		self
	}

	pub fn with_choreography(mut self, definition: ChoreographyDefinition) -> Self {
		self.choreographies.push(definition);
		self
	}

	pub fn tick_interval(&self) -> Duration {
		Duration::from_millis(self.tick_interval_ms)
	}

	pub fn action_catalog(&self) -> ActionCatalog {
		ActionCatalog::new(&self.actions)
	}

	pub fn validate(&self) -> Result<()> {
		if self.tick_interval_ms == 0 {
			return Err(ChoreographyError::InvalidConfig("tick interval must be at least 1ms".to_string()));
		}
		if let Some(action) = self.actions.iter().find(|action| action.trim().is_empty()) {
			return Err(ChoreographyError::InvalidConfig(format!("blank action name {action:?} in known actions")));
		}
		for definition in &self.choreographies {
			definition.validate()?;
		}
		Ok(())
	}

	pub fn from_json(json: &str) -> Result<Self> {
		serde_json::from_str(json).map_err(ChoreographyError::parse("choreographer config"))
	}

	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let raw = std::fs::read_to_string(path).map_err(ChoreographyError::io(path))?;
		Self::from_json(&raw)
	}
}

impl Default for ChoreographerConfig {
	fn default() -> Self {
		Self {
			tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
			actions: STANDARD_ACTIONS.iter().map(|action| (*action).to_string()).collect(),
			id_strategy: IdStrategy::default(),
			choreographies: Vec::new(),
		}
	}
}
