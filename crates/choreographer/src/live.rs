//! Actor wrapper running a [`Choreographer`] on a real frame interval.
//!
//! One tokio task owns the choreographer and `select!`s over the frame
//! ticker, the command channel and a cancellation token. Cancelling the token
//! stops any further frame from firing. Snapshots are published on a `watch`
//! channel after every frame and command.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::ChoreographerConfig;
use crate::definition::ChoreographyDefinition;
use crate::error::{ChoreographyError, Result};
use crate::resolver::ReferenceResolver;
use crate::signal::Signal;
use crate::sink::CommandSink;
use crate::stage::{ChoreographyState, Choreographer};

enum LiveCommand {
	Signal(Signal),
	Register {
		definition: ChoreographyDefinition,
		response: oneshot::Sender<Result<()>>,
	},
	Clear,
}

/// Handle to a choreographer driven by its own task
pub struct LiveChoreographer {
	command_tx: mpsc::UnboundedSender<LiveCommand>,
	state_rx: watch::Receiver<ChoreographyState>,
	task_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
	cancel_token: CancellationToken,
}

impl LiveChoreographer {
	/// Move `choreographer` onto a new task ticking at the configured interval.
	///
	/// Must be called from within a tokio runtime.
	pub fn spawn<C, S, R>(choreographer: Choreographer<C, S, R>, config: &ChoreographerConfig) -> Result<Self>
	where
		C: Clock + 'static,
		S: CommandSink + Send + 'static,
		R: ReferenceResolver + Send + 'static,
	{
		if config.tick_interval_ms == 0 {
			return Err(ChoreographyError::InvalidConfig("tick interval must be at least 1ms".to_string()));
		}

		let cancel_token = CancellationToken::new();
		let (command_tx, command_rx) = mpsc::unbounded_channel();
		let (state_tx, state_rx) = watch::channel(choreographer.state());

		let task_handle = tokio::spawn(drive_loop(choreographer, config.tick_interval(), command_rx, state_tx, cancel_token.clone()));

		info!(tick_interval_ms = config.tick_interval_ms, "🎬 LiveChoreographer started");

		Ok(Self {
			command_tx,
			state_rx,
			task_handle: Arc::new(Mutex::new(Some(task_handle))),
			cancel_token,
		})
	}

	fn send(&self, command: LiveCommand) -> Result<()> {
		self.command_tx.send(command).map_err(|_| ChoreographyError::NotRunning)
	}

	/// Queue a signal; it is dispatched before the next frame
	pub fn send_signal(&self, signal: Signal) -> Result<()> {
		self.send(LiveCommand::Signal(signal))
	}

	pub async fn register(&self, definition: ChoreographyDefinition) -> Result<()> {
		let (response, rx) = oneshot::channel();
		self.send(LiveCommand::Register { definition, response })?;
		rx.await.map_err(|_| ChoreographyError::Internal("drive loop dropped the register response".into()))?
	}

	/// Interrupt and drop every live performance
	pub fn clear(&self) -> Result<()> {
		self.send(LiveCommand::Clear)
	}

	pub fn subscribe(&self) -> watch::Receiver<ChoreographyState> {
		self.state_rx.clone()
	}

	pub fn current_state(&self) -> ChoreographyState {
		self.state_rx.borrow().clone()
	}

	pub fn is_running(&self) -> bool {
		!self.cancel_token.is_cancelled() && !self.command_tx.is_closed()
	}

	/// Stop the drive loop and wait for it to exit
	pub async fn shutdown(&self) {
		self.cancel_token.cancel();
		if let Some(handle) = self.task_handle.lock().await.take() {
			if let Err(e) = handle.await {
				warn!(error = %e, "drive loop ended abnormally");
			}
		}
	}
}

impl Drop for LiveChoreographer {
	fn drop(&mut self) {
		self.cancel_token.cancel();
	}
}

async fn drive_loop<C, S, R>(
	mut choreographer: Choreographer<C, S, R>,
	tick_interval: Duration,
	mut command_rx: mpsc::UnboundedReceiver<LiveCommand>,
	state_tx: watch::Sender<ChoreographyState>,
	cancel: CancellationToken,
) where
	C: Clock,
	S: CommandSink,
	R: ReferenceResolver,
{
	let mut ticker = interval(tick_interval);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

	loop {
		tokio::select! {
			biased;

			() = cancel.cancelled() => {
				info!("Drive loop cancelled");
				break;
			}

			Some(command) = command_rx.recv() => {
				match command {
					LiveCommand::Signal(signal) => {
						let spawned = choreographer.signal(signal);
						debug!(spawned = spawned.len(), "signal dispatched");
					}
					LiveCommand::Register { definition, response } => {
						let _ = response.send(choreographer.register(definition));
					}
					LiveCommand::Clear => {
						choreographer.clear();
					}
				}
				state_tx.send_replace(choreographer.state());
			}

			_ = ticker.tick() => {
				choreographer.tick();
				state_tx.send_replace(choreographer.state());
			}
		}
	}

	info!(definitions = choreographer.definitions().count(), "Drive loop exited");
}
