use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{ChoreographyError, Result};
use crate::types::{EntityHandle, Position, Route};

/// Scene-state collaborator mapping semantic names to renderer handles
pub trait ReferenceResolver {
	/// Every placed instance sharing `name`; empty when unknown
	fn resolve_entity(&self, name: &str) -> Vec<EntityHandle>;

	fn resolve_position(&self, name: &str) -> Option<Position>;

	fn resolve_route(&self, name: &str) -> Option<Route>;
}

impl<R: ReferenceResolver + ?Sized> ReferenceResolver for &R {
	fn resolve_entity(&self, name: &str) -> Vec<EntityHandle> {
		(**self).resolve_entity(name)
	}

	fn resolve_position(&self, name: &str) -> Option<Position> {
		(**self).resolve_position(name)
	}

	fn resolve_route(&self, name: &str) -> Option<Route> {
		(**self).resolve_route(name)
	}
}

impl<R: ReferenceResolver + ?Sized> ReferenceResolver for Box<R> {
	fn resolve_entity(&self, name: &str) -> Vec<EntityHandle> {
		(**self).resolve_entity(name)
	}

	fn resolve_position(&self, name: &str) -> Option<Position> {
		(**self).resolve_position(name)
	}

	fn resolve_route(&self, name: &str) -> Option<Route> {
		(**self).resolve_route(name)
	}
}

impl<R: ReferenceResolver + ?Sized> ReferenceResolver for Arc<R> {
	fn resolve_entity(&self, name: &str) -> Vec<EntityHandle> {
		(**self).resolve_entity(name)
	}

	fn resolve_position(&self, name: &str) -> Option<Position> {
		(**self).resolve_position(name)
	}

	fn resolve_route(&self, name: &str) -> Option<Route> {
		(**self).resolve_route(name)
	}
}

/// In-memory scene index, loadable from the editor's scene JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDirectory {
	entities: BTreeMap<String, Vec<EntityHandle>>,
	positions: BTreeMap<String, Position>,
	routes: BTreeMap<String, Route>,
}

impl SceneDirectory {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_json(json: &str) -> Result<Self> {
		serde_json::from_str(json).map_err(ChoreographyError::parse("scene directory"))
	}

	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let raw = std::fs::read_to_string(path).map_err(ChoreographyError::io(path))?;
		Self::from_json(&raw)
	}

	/// Place one more instance under `name`; duplicates are ignored
	pub fn place(&mut self, name: impl Into<String>, handle: impl Into<EntityHandle>) -> &mut Self {
		let handle = handle.into();
		let instances = self.entities.entry(name.into()).or_default();
		if !instances.contains(&handle) {
			instances.push(handle);
		}
		self
	}

	/// Remove an instance wherever it is placed; returns whether it was found
	pub fn remove_instance(&mut self, handle: &EntityHandle) -> bool {
		let mut removed = false;
		for instances in self.entities.values_mut() {
			let before = instances.len();
			instances.retain(|placed| placed != handle);
			removed |= instances.len() != before;
		}
		self.entities.retain(|_, instances| !instances.is_empty());
		removed
	}

	pub fn set_position(&mut self, name: impl Into<String>, position: Position) -> &mut Self {
		self.positions.insert(name.into(), position);
		self
	}

	pub fn set_route(&mut self, name: impl Into<String>, route: Route) -> &mut Self {
		self.routes.insert(name.into(), route);
		self
	}

	pub fn with_instance(mut self, name: impl Into<String>, handle: impl Into<EntityHandle>) -> Self {
		self.place(name, handle);
		self
	}

	pub fn with_position(mut self, name: impl Into<String>, position: Position) -> Self {
		self.set_position(name, position);
		self
	}

	pub fn with_route(mut self, name: impl Into<String>, route: Route) -> Self {
		self.set_route(name, route);
		self
	}

	pub fn instance_count(&self) -> usize {
		self.entities.values().map(Vec::len).sum()
	}
}

impl ReferenceResolver for SceneDirectory {
	fn resolve_entity(&self, name: &str) -> Vec<EntityHandle> {
		self.entities.get(name).cloned().unwrap_or_default()
	}

	fn resolve_position(&self, name: &str) -> Option<Position> {
		self.positions.get(name).copied()
	}

	fn resolve_route(&self, name: &str) -> Option<Route> {
		self.routes.get(name).cloned()
	}
}
