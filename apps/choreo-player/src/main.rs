mod config;
mod playback;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Config, Mode};
use playback::Inputs;

#[tokio::main]
async fn main() -> Result<()> {
	// Load environment variables
	dotenvy::dotenv().ok();

	let config = Config::parse();
	config.validate().map_err(anyhow::Error::msg)?;

	// Logs go to stderr so stdout stays a clean JSON-lines stream
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with_writer(std::io::stderr)
		.with_target(false)
		.init();

	info!(mode = ?config.mode, definitions = %config.definitions.display(), signals = %config.signals.display(), "🎬 Starting choreo-player");

	let inputs = Inputs::load(&config)?;

	let summary = match config.mode {
		Mode::Deterministic => playback::play_deterministic(inputs, std::io::stdout().lock())?,
		Mode::Realtime => playback::play_realtime(inputs).await?,
	};

	info!(
		commands = summary.commands,
		spawned = summary.spawned,
		completed = summary.completed,
		left_running = summary.left_running,
		"🏁 Playback finished"
	);
	Ok(())
}
