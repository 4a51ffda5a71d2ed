use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
	/// Manual clock, every command printed as a JSON line
	Deterministic,
	/// Wall clock through the live driver, commands logged
	Realtime,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "choreo-player")]
#[command(about = "Replay a signal script through choreography definitions", long_about = None)]
pub struct Config {
	/// Choreography definitions (array or { "choreographies": [...] })
	#[arg(long, env = "CHOREO_DEFINITIONS")]
	pub definitions: PathBuf,

	/// Scene directory with entities, positions and routes
	#[arg(long, env = "CHOREO_SCENE")]
	pub scene: Option<PathBuf>,

	/// Signal script; timestamps are offsets from playback start
	#[arg(long, env = "CHOREO_SIGNALS")]
	pub signals: PathBuf,

	/// Engine settings file (tick interval, known actions, id strategy)
	#[arg(long, env = "CHOREO_SETTINGS")]
	pub settings: Option<PathBuf>,

	/// Tick interval in milliseconds, overrides the settings file
	#[arg(long, env = "CHOREO_TICK_MS")]
	pub tick_ms: Option<u64>,

	#[arg(long, env = "CHOREO_MODE", value_enum, default_value = "deterministic")]
	pub mode: Mode,

	/// Extra time to keep ticking after the last signal
	#[arg(long, env = "CHOREO_SETTLE_MS", default_value = "2000")]
	pub settle_ms: i64,
}

impl Config {
	pub fn validate(&self) -> Result<(), String> {
		if self.tick_ms == Some(0) {
			return Err("tick_ms must be greater than 0".to_string());
		}

		if self.settle_ms < 0 {
			return Err("settle_ms must not be negative".to_string());
		}

		Ok(())
	}
}
