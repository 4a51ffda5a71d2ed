use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChoreographyError>;

#[derive(Debug, Error)]
pub enum ChoreographyError {
	#[error("Invalid choreography '{name}': {reason}")]
	InvalidDefinition { name: String, reason: String },

	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),

	#[error("Failed to parse {what}: {source}")]
	Parse {
		what: &'static str,
		#[source]
		source: serde_json::Error,
	},

	#[error("Failed to read {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Choreographer not running")]
	NotRunning,

	#[error("Internal error: {0}")]
	Internal(String),
}

impl ChoreographyError {
	pub fn is_recoverable(&self) -> bool {
		matches!(self, Self::NotRunning | Self::InvalidDefinition { .. })
	}

	pub(crate) fn parse(what: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
		move |source| Self::Parse { what, source }
	}

	pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
		let path = path.into();
		move |source| Self::Io { path, source }
	}
}
