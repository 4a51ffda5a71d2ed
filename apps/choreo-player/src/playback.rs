use anyhow::{Context, Result};
use choreographer::{ChoreographerConfig, Choreographer, ChoreographyDefinition, Command, LiveChoreographer, ManualClock, RecordingSink, SceneDirectory, Signal, SystemClock, TimeMs, TracingSink};
use serde::Serialize;
use std::collections::VecDeque;
use std::io::Write;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;

/// Everything a playback needs, loaded and validated up front
pub struct Inputs {
	pub engine: ChoreographerConfig,
	pub scene: SceneDirectory,
	pub signals: Vec<Signal>,
	pub settle_ms: TimeMs,
}

impl Inputs {
	pub fn load(config: &Config) -> Result<Self> {
		let mut engine = match &config.settings {
			Some(path) => ChoreographerConfig::load(path).with_context(|| format!("loading engine settings {}", path.display()))?,
			None => ChoreographerConfig::default(),
		};
		if let Some(tick_ms) = config.tick_ms {
			engine = engine.with_tick_interval(tick_ms);
		}

		let definitions = ChoreographyDefinition::load_many(&config.definitions).with_context(|| format!("loading definitions {}", config.definitions.display()))?;
		engine.choreographies.extend(definitions);
		engine.validate().context("validating choreographies")?;

		let scene = match &config.scene {
			Some(path) => SceneDirectory::load(path).with_context(|| format!("loading scene {}", path.display()))?,
			None => SceneDirectory::new(),
		};
		let signals = Signal::load_script(&config.signals).with_context(|| format!("loading signal script {}", config.signals.display()))?;

		info!(
			choreographies = engine.choreographies.len(),
			instances = scene.instance_count(),
			signals = signals.len(),
			tick_interval_ms = engine.tick_interval_ms,
			"📂 Inputs loaded"
		);

		Ok(Self {
			engine,
			scene,
			signals,
			settle_ms: config.settle_ms,
		})
	}

	fn end_time(&self) -> TimeMs {
		self.signals.last().map_or(0, |signal| signal.timestamp) + self.settle_ms
	}
}

#[derive(Debug, Serialize)]
struct TimedCommand<'a> {
	at: TimeMs,
	#[serde(flatten)]
	command: &'a Command,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PlaybackSummary {
	pub commands: usize,
	pub spawned: u64,
	pub completed: u64,
	pub left_running: usize,
}

/// Replay on a manual clock, writing one JSON line per command
pub fn play_deterministic(inputs: Inputs, mut out: impl Write) -> Result<PlaybackSummary> {
	let end = inputs.end_time();
	let step = TimeMs::try_from(inputs.engine.tick_interval_ms).context("tick interval out of range")?;
	let mut stage = Choreographer::from_config(&inputs.engine, ManualClock::new(), RecordingSink::new(), inputs.scene)?;
	let mut pending: VecDeque<Signal> = inputs.signals.into();
	let mut summary = PlaybackSummary::default();

	loop {
		let now = stage.now();
		while pending.front().is_some_and(|signal| signal.timestamp <= now) {
			if let Some(signal) = pending.pop_front() {
				let spawned = stage.signal(signal);
				debug!(at = now, spawned = spawned.len(), "signal delivered");
			}
		}

		stage.tick();
		for command in stage.sink_mut().take() {
			serde_json::to_writer(&mut out, &TimedCommand { at: now, command: &command })?;
			writeln!(out)?;
			summary.commands += 1;
		}

		if now >= end && pending.is_empty() {
			break;
		}

		// Land a tick on the next scripted signal so it spawns at its own timestamp
		let next_signal = pending.front().map_or(TimeMs::MAX, |signal| signal.timestamp);
		let delta = step.min(end - now).min(next_signal - now).max(1);
		stage.clock().advance(delta);
	}

	let state = stage.state();
	summary.spawned = state.spawned_total;
	summary.completed = state.completed_total;
	summary.left_running = state.live.len();
	if summary.left_running > 0 {
		warn!(left_running = summary.left_running, "performances still running when playback ended; raise --settle-ms");
	}
	Ok(summary)
}

/// Replay on the wall clock through the live driver until settled or Ctrl-C
pub async fn play_realtime(inputs: Inputs) -> Result<PlaybackSummary> {
	let settle = Duration::from_millis(u64::try_from(inputs.settle_ms).context("settle time out of range")?);
	let stage = Choreographer::from_config(&inputs.engine, SystemClock::new(), TracingSink, inputs.scene)?;
	let live = LiveChoreographer::spawn(stage, &inputs.engine)?;

	let started = Instant::now();
	let feed = async {
		for signal in inputs.signals {
			let offset = Duration::from_millis(u64::try_from(signal.timestamp).unwrap_or_default());
			sleep_until(started + offset).await;
			live.send_signal(signal)?;
		}
		tokio::time::sleep(settle).await;

		let mut state = live.subscribe();
		state.wait_for(|state| state.is_idle()).await.context("live driver stopped before settling")?;
		anyhow::Ok(())
	};

	tokio::select! {
		result = feed => {
			result?;
			info!("✅ Playback settled");
		}
		_ = tokio::signal::ctrl_c() => {
			info!("🛑 Ctrl-C received, clearing stage");
			live.clear()?;
		}
	}

	let state = live.current_state();
	live.shutdown().await;

	Ok(PlaybackSummary {
		commands: 0,
		spawned: state.spawned_total,
		completed: state.completed_total,
		left_running: state.live.len(),
	})
}
