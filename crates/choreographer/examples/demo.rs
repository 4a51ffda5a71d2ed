use choreographer::{
	ActionStep, ChoreographerConfig, Choreographer, ChoreographyDefinition, ChoreographyStep, LiveChoreographer, ManualClock, Position, RecordingSink, SceneDirectory, Signal, SystemClock, TracingSink,
	WhenClause, WhenCondition, WhenOperator,
};
use serde_json::json;
use tokio::time::{sleep, Duration};
use tracing::Level;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt().with_max_level(Level::INFO).with_target(false).init();

	println!("\n🎬 Choreographer Demo\n");

	demo_manual_clock()?;
	demo_interruption()?;
	demo_live_driver().await?;

	println!("\n✅ All demos completed!\n");
	Ok(())
}

fn office() -> SceneDirectory {
	SceneDirectory::new()
		.with_instance("agent-1", "sprite-1")
		.with_instance("peon", "peon#1")
		.with_instance("peon", "peon#2")
		.with_position("workstation-1", Position::new(120.0, 48.0))
}

fn read_tool() -> ChoreographyDefinition {
	ChoreographyDefinition::new("tool_call")
		.named("read-file")
		.when(WhenClause::All(WhenCondition::new().field("signal.payload.toolName", WhenOperator::equals("Read"))))
		.step(ActionStep::new("move").on_entity("signal.payload.from").toward("workstation-1").with_duration(400).with_easing("easeOut"))
		.step(ChoreographyStep::on_arrive(vec![ActionStep::new("emote").on_entity("signal.payload.from").with_param("emoji", "📖").into()]))
		.step(ChoreographyStep::on_interrupt(vec![ActionStep::new("shake").on_entity("signal.payload.from").with_duration(150).into()]))
}

/// Demo 1: deterministic replay on a manual clock
fn demo_manual_clock() -> Result<(), Box<dyn std::error::Error>> {
	println!("📍 Demo 1: Manual clock\n");

	let mut stage = Choreographer::new(ManualClock::new(), RecordingSink::new(), office());
	stage.register(read_tool())?;
	stage.register(ChoreographyDefinition::new("agent_spawn").step(ChoreographyStep::parallel(vec![
		ActionStep::new("spawn").on_entity("peon").into(),
		ActionStep::new("pulse").on_entity("agent-1").with_duration(200).into(),
	])))?;

	stage.signal(Signal::new("agent_spawn", json!({})));
	stage.signal(Signal::new("tool_call", json!({ "toolName": "Read", "from": "agent-1" })).with_correlation("c1"));
	stage.tick();
	stage.advance_in_steps(800, 16);

	for command in stage.sink().milestones() {
		println!("   {}", serde_json::to_string(command)?);
	}
	println!("\n   {} commands, {} live\n", stage.sink().len(), stage.live_count());
	Ok(())
}

/// Demo 2: a correlated interrupt switches to the onInterrupt track
fn demo_interruption() -> Result<(), Box<dyn std::error::Error>> {
	println!("📍 Demo 2: Interruption\n");

	let mut stage = Choreographer::new(ManualClock::new(), RecordingSink::new(), office());
	stage.register(read_tool())?;
	stage.register(ChoreographyDefinition::new("tool_cancelled").interrupting().step(ActionStep::new("say").on_entity("agent-1").with_param("text", "never mind")))?;

	stage.signal(Signal::new("tool_call", json!({ "toolName": "Read", "from": "agent-1" })).with_correlation("c7"));
	stage.advance_in_steps(200, 16);
	stage.signal(Signal::new("tool_cancelled", json!({})).with_correlation("c7"));
	stage.advance_in_steps(400, 16);

	for command in stage.sink().milestones() {
		println!("   {}", serde_json::to_string(command)?);
	}
	println!();
	Ok(())
}

/// Demo 3: the live driver on the wall clock
async fn demo_live_driver() -> Result<(), Box<dyn std::error::Error>> {
	println!("📍 Demo 3: Live driver\n");

	let config = ChoreographerConfig::new(vec![read_tool()]).with_tick_interval(16);
	let stage = Choreographer::from_config(&config, SystemClock::new(), TracingSink, office())?;
	let live = LiveChoreographer::spawn(stage, &config)?;

	live.send_signal(Signal::new("tool_call", json!({ "toolName": "Read", "from": "agent-1" })))?;
	sleep(Duration::from_millis(100)).await;
	live.send_signal(Signal::new("tool_call", json!({ "toolName": "Read", "from": "peon" })))?;

	let mut state = live.subscribe();
	tokio::time::timeout(Duration::from_secs(3), state.wait_for(|state| state.completed_total == 2)).await??;

	let state = live.current_state();
	println!("\n   spawned {} / completed {}", state.spawned_total, state.completed_total);
	live.shutdown().await;
	Ok(())
}
